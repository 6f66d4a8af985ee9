//! RNG seam for the randomness the room lifecycle needs: initial side
//! assignment, serve direction, and serve angle. Production code draws from
//! the thread RNG; tests inject a fixed sequence to pin down scenarios.

use protocol::Side;
use rand::Rng;

/// Everything a Room needs to draw from randomness.
pub trait RoomRng: Send {
    /// Picks `top` or `bottom` with equal probability.
    fn random_side(&mut self) -> Side;
    /// Samples a serve angle uniformly in `[-0.4, 0.4]` radians from vertical.
    fn serve_angle(&mut self) -> f64;
}

/// The production RNG, backed by the thread-local generator.
#[derive(Default)]
pub struct ThreadRoomRng;

impl RoomRng for ThreadRoomRng {
    fn random_side(&mut self) -> Side {
        if rand::thread_rng().gen_bool(0.5) {
            Side::Top
        } else {
            Side::Bottom
        }
    }

    fn serve_angle(&mut self) -> f64 {
        rand::thread_rng().gen_range(-0.4..=0.4)
    }
}

/// A deterministic RNG for tests: replays a fixed queue of outcomes, then
/// falls back to a constant once exhausted so a long-running test doesn't panic.
#[cfg(test)]
pub struct FixedRng {
    pub sides: std::collections::VecDeque<Side>,
    pub angles: std::collections::VecDeque<f64>,
}

#[cfg(test)]
impl FixedRng {
    pub fn new(sides: Vec<Side>, angles: Vec<f64>) -> Self {
        FixedRng {
            sides: sides.into(),
            angles: angles.into(),
        }
    }
}

#[cfg(test)]
impl RoomRng for FixedRng {
    fn random_side(&mut self) -> Side {
        self.sides.pop_front().unwrap_or(Side::Top)
    }

    fn serve_angle(&mut self) -> f64 {
        self.angles.pop_front().unwrap_or(0.0)
    }
}
