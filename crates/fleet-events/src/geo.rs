//! Planar positions.
//!
//! Agents live on a flat map measured in abstract distance units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the simulation map.
///
/// Serializes as a two-element array `[x, y]`, the same shape scenario files use.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Moves up to `max_step` units towards `target`, never overshooting it.
    pub fn step_towards(&self, target: &Position, max_step: f64) -> Position {
        let distance = self.distance_to(target);
        if distance <= max_step || distance == 0.0 {
            return *target;
        }
        let ratio = max_step / distance;
        Position {
            x: self.x + (target.x - self.x) * ratio,
            y: self.y + (target.y - self.y) * ratio,
        }
    }
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_step_towards_partial() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(10.0, 0.0);
        let moved = a.step_towards(&b, 4.0);
        assert_eq!(moved, Position::new(4.0, 0.0));
    }

    #[test]
    fn test_step_towards_does_not_overshoot() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(1.0, 1.0);
        assert_eq!(a.step_towards(&b, 100.0), b);
    }

    #[test]
    fn test_serializes_as_pair() {
        let p = Position::new(1.5, -2.0);
        assert_eq!(serde_json::to_string(&p).unwrap(), "[1.5,-2.0]");
        let parsed: Position = serde_json::from_str("[3.0, 4.0]").unwrap();
        assert_eq!(parsed, Position::new(3.0, 4.0));
    }
}
