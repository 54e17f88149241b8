use std::rc::Rc;
use std::time::Instant;

/// Status reported by a door block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorStatus {
    Opening,
    Open,
    Closing,
    Closed,
}

/// Status reported by a piston block. `Stopped` means no velocity is applied;
/// `Extended`/`Retracted` mean the piston sits at its current travel limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PistonStatus {
    Stopped,
    Extending,
    Extended,
    Retracting,
    Retracted,
}

/// A door at one elevator stop.
pub trait Door {
    /// Block name, used for log messages only.
    fn name(&self) -> String;

    /// Free-text configuration blob attached to the block.
    fn custom_data(&self) -> String;

    fn is_functional(&self) -> bool;

    fn status(&self) -> DoorStatus;

    /// Powers the door on or off. A powered-down door holds its position.
    fn set_enabled(&self, enabled: bool);

    fn open(&self);

    fn close(&self);
}

/// A linear actuator contributing to the combined lift axis.
pub trait Piston {
    /// Block name, used for log messages only.
    fn name(&self) -> String;

    /// Free-text configuration blob attached to the block.
    fn custom_data(&self) -> String;

    fn is_working(&self) -> bool;

    fn status(&self) -> PistonStatus;

    fn current_position(&self) -> f32;

    /// Physical lower bound of the piston's travel.
    fn lowest_position(&self) -> f32;

    /// Physical upper bound of the piston's travel.
    fn highest_position(&self) -> f32;

    fn min_limit(&self) -> f32;

    fn max_limit(&self) -> f32;

    fn set_min_limit(&self, limit: f32);

    fn set_max_limit(&self, limit: f32);

    /// Positive velocity extends, negative retracts, zero stops.
    fn set_velocity(&self, velocity: f32);
}

/// The controller's view of the world: its own configuration text plus every
/// door and piston block it can reach.
pub trait Grid {
    fn custom_data(&self) -> String;

    fn doors(&self) -> Vec<Rc<dyn Door>>;

    fn pistons(&self) -> Vec<Rc<dyn Piston>>;
}

/// Time source for the door-close wait. Swapped out for a manual clock in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
