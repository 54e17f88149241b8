use crate::config::Scenario;
use crate::elevator::hardware::{Door, DoorStatus, Grid, Piston, PistonStatus};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/**
 * Software simulation of the door and piston blocks.
 *
 * Doors take a fixed number of ticks to open or close and only move while
 * enabled and functional. Pistons integrate their velocity over the tick
 * interval, clamped to the intersection of the physical bounds and the
 * min/max limits, and derive their status from velocity and position. The
 * same types serve as the fixtures for the state machine tests.
 */

pub struct SimDoor {
    name: String,
    custom_data: String,
    travel_ticks: u32,
    functional: Cell<bool>,
    enabled: Cell<bool>,
    status: Cell<DoorStatus>,
    ticks_left: Cell<u32>,
}

impl SimDoor {
    pub fn new(name: &str, custom_data: &str, travel_ticks: u32) -> SimDoor {
        SimDoor {
            name: name.to_string(),
            custom_data: custom_data.to_string(),
            travel_ticks,
            functional: Cell::new(true),
            enabled: Cell::new(true),
            status: Cell::new(DoorStatus::Closed),
            ticks_left: Cell::new(0),
        }
    }

    /// Advances an in-progress open/close by one tick.
    pub fn advance(&self) {
        if !self.enabled.get() || !self.functional.get() {
            return;
        }
        match self.status.get() {
            DoorStatus::Opening => {
                if self.ticks_left.get() <= 1 {
                    self.ticks_left.set(0);
                    self.status.set(DoorStatus::Open);
                } else {
                    self.ticks_left.set(self.ticks_left.get() - 1);
                }
            }
            DoorStatus::Closing => {
                if self.ticks_left.get() <= 1 {
                    self.ticks_left.set(0);
                    self.status.set(DoorStatus::Closed);
                } else {
                    self.ticks_left.set(self.ticks_left.get() - 1);
                }
            }
            DoorStatus::Open | DoorStatus::Closed => {}
        }
    }
}

impl Door for SimDoor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn custom_data(&self) -> String {
        self.custom_data.clone()
    }

    fn is_functional(&self) -> bool {
        self.functional.get()
    }

    fn status(&self) -> DoorStatus {
        self.status.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn open(&self) {
        if !self.enabled.get() || !self.functional.get() {
            return;
        }
        if self.status.get() != DoorStatus::Open {
            self.status.set(DoorStatus::Opening);
            self.ticks_left.set(self.travel_ticks.max(1));
        }
    }

    fn close(&self) {
        if !self.enabled.get() || !self.functional.get() {
            return;
        }
        if self.status.get() != DoorStatus::Closed {
            self.status.set(DoorStatus::Closing);
            self.ticks_left.set(self.travel_ticks.max(1));
        }
    }
}

pub struct SimPiston {
    name: String,
    custom_data: String,
    lowest_position: f32,
    highest_position: f32,
    working: Cell<bool>,
    min_limit: Cell<f32>,
    max_limit: Cell<f32>,
    position: Cell<f32>,
    velocity: Cell<f32>,
}

impl SimPiston {
    pub fn new(
        name: &str,
        custom_data: &str,
        lowest_position: f32,
        highest_position: f32,
        initial_position: f32,
    ) -> SimPiston {
        SimPiston {
            name: name.to_string(),
            custom_data: custom_data.to_string(),
            lowest_position,
            highest_position,
            working: Cell::new(true),
            min_limit: Cell::new(lowest_position),
            max_limit: Cell::new(highest_position),
            position: Cell::new(initial_position),
            velocity: Cell::new(0.0),
        }
    }

    fn lower_stop(&self) -> f32 {
        self.min_limit.get().max(self.lowest_position)
    }

    fn upper_stop(&self) -> f32 {
        self.max_limit.get().min(self.highest_position)
    }

    /// Integrates the velocity over one tick of `dt` seconds.
    pub fn advance(&self, dt: f32) {
        if !self.working.get() {
            return;
        }
        let new_position = (self.position.get() + self.velocity.get() * dt)
            .clamp(self.lower_stop(), self.upper_stop());
        self.position.set(new_position);
    }
}

impl Piston for SimPiston {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn custom_data(&self) -> String {
        self.custom_data.clone()
    }

    fn is_working(&self) -> bool {
        self.working.get()
    }

    fn status(&self) -> PistonStatus {
        let velocity = self.velocity.get();
        if velocity.abs() <= f32::EPSILON {
            PistonStatus::Stopped
        } else if velocity > 0.0 {
            if self.position.get() >= self.upper_stop() - f32::EPSILON {
                PistonStatus::Extended
            } else {
                PistonStatus::Extending
            }
        } else if self.position.get() <= self.lower_stop() + f32::EPSILON {
            PistonStatus::Retracted
        } else {
            PistonStatus::Retracting
        }
    }

    fn current_position(&self) -> f32 {
        self.position.get()
    }

    fn lowest_position(&self) -> f32 {
        self.lowest_position
    }

    fn highest_position(&self) -> f32 {
        self.highest_position
    }

    fn min_limit(&self) -> f32 {
        self.min_limit.get()
    }

    fn max_limit(&self) -> f32 {
        self.max_limit.get()
    }

    fn set_min_limit(&self, limit: f32) {
        self.min_limit.set(limit);
    }

    fn set_max_limit(&self, limit: f32) {
        self.max_limit.set(limit);
    }

    fn set_velocity(&self, velocity: f32) {
        self.velocity.set(velocity);
    }
}

pub struct SimGrid {
    custom_data: RefCell<String>,
    doors: RefCell<Vec<Rc<SimDoor>>>,
    pistons: RefCell<Vec<Rc<SimPiston>>>,
}

impl SimGrid {
    pub fn new(custom_data: &str) -> SimGrid {
        SimGrid {
            custom_data: RefCell::new(custom_data.to_string()),
            doors: RefCell::new(Vec::new()),
            pistons: RefCell::new(Vec::new()),
        }
    }

    pub fn from_scenario(scenario: &Scenario) -> SimGrid {
        let grid = SimGrid::new(&scenario.controller.custom_data);
        for door in &scenario.doors {
            grid.add_door(SimDoor::new(
                &door.name,
                &door.custom_data,
                scenario.simulation.door_travel_ticks,
            ));
        }
        for piston in &scenario.pistons {
            grid.add_piston(SimPiston::new(
                &piston.name,
                &piston.custom_data,
                piston.lowest_position,
                piston.highest_position,
                piston.initial_position,
            ));
        }
        grid
    }

    pub fn add_door(&self, door: SimDoor) -> Rc<SimDoor> {
        let door = Rc::new(door);
        self.doors.borrow_mut().push(Rc::clone(&door));
        door
    }

    pub fn add_piston(&self, piston: SimPiston) -> Rc<SimPiston> {
        let piston = Rc::new(piston);
        self.pistons.borrow_mut().push(Rc::clone(&piston));
        piston
    }

    /// Advances the whole simulated world by one tick of `dt` seconds.
    pub fn advance(&self, dt: f32) {
        for door in self.doors.borrow().iter() {
            door.advance();
        }
        for piston in self.pistons.borrow().iter() {
            piston.advance(dt);
        }
    }
}

impl Grid for SimGrid {
    fn custom_data(&self) -> String {
        self.custom_data.borrow().clone()
    }

    fn doors(&self) -> Vec<Rc<dyn Door>> {
        self.doors
            .borrow()
            .iter()
            .map(|door| Rc::clone(door) as Rc<dyn Door>)
            .collect()
    }

    fn pistons(&self) -> Vec<Rc<dyn Piston>> {
        self.pistons
            .borrow()
            .iter()
            .map(|piston| Rc::clone(piston) as Rc<dyn Piston>)
            .collect()
    }
}

#[cfg(test)]
impl SimDoor {
    pub fn set_functional(&self, functional: bool) {
        self.functional.set(functional);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

#[cfg(test)]
impl SimPiston {
    pub fn set_working(&self, working: bool) {
        self.working.set(working);
    }

    pub fn velocity(&self) -> f32 {
        self.velocity.get()
    }
}

#[cfg(test)]
impl SimGrid {
    pub fn set_custom_data(&self, custom_data: &str) {
        *self.custom_data.borrow_mut() = custom_data.to_string();
    }
}
