use fleet_control::{ensure_backend_config, reset_session_db, BackendPaths};
use std::path::Path;

use crate::messaging::LocalMessagingBackend;

pub(crate) const HOST: &str = "127.0.0.1";

pub(crate) fn backend_paths(dir: &Path) -> BackendPaths {
    let paths = BackendPaths::in_dir(dir);
    ensure_backend_config(&paths, HOST).unwrap();
    reset_session_db(&paths.session_db, HOST).unwrap();
    paths
}

pub(crate) fn start_backend(dir: &Path) -> LocalMessagingBackend {
    LocalMessagingBackend::start(&backend_paths(dir), false).unwrap()
}
