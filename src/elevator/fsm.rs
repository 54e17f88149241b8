use crate::config::ElevatorConfig;
use crate::elevator::hardware::{Clock, DoorStatus, Grid, PistonStatus};
use crate::elevator::queue::{StopQueue, StopRequest};
use crate::elevator::topology::Topology;
use log::{error, warn};
use std::rc::Rc;
use std::time::Instant;

/// Maximum number of state machine evaluations within one external tick.
/// Several transitions are instantaneous and should not each cost a full
/// tick, but the re-entry has to stay bounded.
const MAX_STEPS_PER_TICK: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElevatorState {
    WaitingForInput,
    WaitingToCloseDoors,
    ClosingDoors,
    MovingElevator,
    OpeningDoors,
}

/**
 * Controls an elevator built from pistons and doors.
 *
 * The pistons are treated as a single virtual lift axis: every door is
 * configured with the summed piston travel needed to reach it, and movement
 * distributes that distance evenly across the currently working pistons.
 * Stops are requested with the `call` command and serviced one at a time
 * from the head of the stop queue.
 *
 * The machine is driven by an external periodic tick. Per tick it takes the
 * most recent command line, then evaluates the state machine until no state
 * transition occurs or the sub-step budget runs out.
 *
 * Command surface (case-insensitive, whitespace-delimited):
 * - `reload`            Rebuilds the door/piston topology from scratch.
 * - `call <doorName>`   Requests a stop at the named door.
 *
 * Configuration text formats are documented in `ElevatorConfig` (controller
 * block), and in `Topology` for door blocks (`ElevatorName`,
 * `ElevatorDoorName`, `PistonsDistance`) and piston blocks (`ElevatorName`).
 */
pub struct ElevatorFSM {
    grid: Rc<dyn Grid>,
    clock: Rc<dyn Clock>,
    config: ElevatorConfig,
    last_custom_data: String,
    topology: Topology,
    registered: bool,
    queue: StopQueue,
    state: ElevatorState,
    close_doors_wait_start: Instant,
}

impl ElevatorFSM {
    pub fn new(grid: Rc<dyn Grid>, clock: Rc<dyn Clock>) -> ElevatorFSM {
        let close_doors_wait_start = clock.now();
        ElevatorFSM {
            grid,
            clock,
            config: ElevatorConfig::default(),
            last_custom_data: String::new(),
            topology: Topology::default(),
            registered: false,
            queue: StopQueue::default(),
            state: ElevatorState::WaitingForInput,
            close_doors_wait_start,
        }
    }

    /// One external tick: refresh the configuration if its text changed,
    /// handle the command argument, then evaluate the state machine. Returns
    /// the number of sub-steps taken.
    pub fn tick(&mut self, argument: &str) -> u32 {
        let custom_data = self.grid.custom_data();
        if custom_data != self.last_custom_data {
            self.config = ElevatorConfig::parse(&custom_data);
            self.last_custom_data = custom_data;
        }
        if self.config.elevator_name.is_empty() {
            error!("Please specify an elevator name in the controller configuration.");
            return 0;
        }
        if !self.registered {
            self.reload();
            self.registered = true;
        }
        self.handle_command(argument);
        self.evaluate()
    }

    /// Rebuilds the topology from the grid. Pending stops keep their captured
    /// door references and distances.
    pub fn reload(&mut self) {
        self.topology = Topology::register(self.grid.as_ref(), &self.config.elevator_name);
    }

    fn handle_command(&mut self, argument: &str) {
        let mut parts = argument.split_whitespace();
        let Some(command) = parts.next() else { return };
        match command.to_lowercase().as_str() {
            "reload" => self.reload(),
            "call" => {
                if let Some(door_name) = parts.next() {
                    self.call(&door_name.to_lowercase());
                }
            }
            _ => {}
        }
    }

    /// Enqueues a stop for the named door. A door with a stop already pending
    /// is a no-op and does not interrupt the current movement. A fresh stop
    /// zeroes the velocity of every working piston that is mid-travel, so the
    /// next `MovingElevator` pass re-evaluates the target position instead of
    /// coasting toward a stale one.
    fn call(&mut self, door_name: &str) {
        let request = match self.topology.doors.get(door_name) {
            Some(elevator_door) => StopRequest {
                door: Rc::clone(&elevator_door.door),
                pistons_distance: elevator_door.pistons_distance,
            },
            None => {
                error!("Invalid elevator door \"{}\".", door_name);
                return;
            }
        };
        if self.queue.insert(request) {
            for piston in &self.topology.pistons {
                if piston.is_working()
                    && matches!(
                        piston.status(),
                        PistonStatus::Extending | PistonStatus::Retracting
                    )
                {
                    piston.set_velocity(0.0);
                }
            }
        }
    }

    /// Evaluates the state machine until a step reports no further transition
    /// or the sub-step budget is exhausted. Returns the sub-steps taken.
    pub fn evaluate(&mut self) -> u32 {
        let (steps, exhausted) = run_until_stable(|| self.step(), MAX_STEPS_PER_TICK);
        if exhausted {
            warn!(
                "Too many evaluation steps were performed. Current elevator state: {:?}",
                self.state
            );
        }
        steps
    }

    /// One state machine evaluation. Returns true when a state transition
    /// occurred and the machine should be evaluated again within this tick.
    fn step(&mut self) -> bool {
        // The queue can drain behind the machine's back (door failure while
        // in service); any non-idle state with an empty queue is illegal.
        if self.state != ElevatorState::WaitingForInput && self.queue.is_empty() {
            self.state = ElevatorState::WaitingForInput;
        }
        match self.state {
            ElevatorState::WaitingForInput => {
                if !self.queue.is_empty() {
                    self.close_doors_wait_start = self.clock.now();
                    self.state = ElevatorState::WaitingToCloseDoors;
                    return true;
                }
            }
            ElevatorState::WaitingToCloseDoors => {
                let elapsed = self
                    .clock
                    .now()
                    .duration_since(self.close_doors_wait_start);
                if elapsed.as_secs_f64() > self.config.wait_for_closing_doors_time {
                    self.state = ElevatorState::ClosingDoors;
                    return true;
                }
            }
            ElevatorState::ClosingDoors => {
                let mut all_doors_closed = true;
                for elevator_door in self.topology.doors.values() {
                    let door = &elevator_door.door;
                    if !door.is_functional() {
                        continue;
                    }
                    match door.status() {
                        DoorStatus::Opening | DoorStatus::Closing => all_doors_closed = false,
                        DoorStatus::Open => {
                            all_doors_closed = false;
                            door.set_enabled(true);
                            door.close();
                        }
                        // Power down once closed
                        DoorStatus::Closed => door.set_enabled(false),
                    }
                }
                if all_doors_closed {
                    self.state = ElevatorState::MovingElevator;
                    return true;
                }
            }
            ElevatorState::MovingElevator => return self.move_elevator(),
            ElevatorState::OpeningDoors => self.open_head_door(),
        }
        false
    }

    fn move_elevator(&mut self) -> bool {
        let mut pistons_unoccupied = true;
        let mut minimal_pistons_distance = 0.0f32;
        let mut maximal_pistons_distance = 0.0f32;
        let mut working_piston_count = 0u32;
        for piston in &self.topology.pistons {
            if piston.is_working() {
                if matches!(
                    piston.status(),
                    PistonStatus::Extending | PistonStatus::Retracting
                ) {
                    pistons_unoccupied = false;
                    break;
                }
                minimal_pistons_distance += piston.lowest_position();
                maximal_pistons_distance += piston.highest_position();
                working_piston_count += 1;
            }
        }
        if !pistons_unoccupied {
            return false;
        }
        if working_piston_count == 0 {
            error!("Not a single piston is working right now.");
            self.queue.clear();
            self.state = ElevatorState::WaitingForInput;
            return false;
        }
        let (head_door_name, head_distance) = match self.queue.head() {
            Some(head) => (head.door.name(), head.pistons_distance),
            None => return false,
        };
        if head_distance > maximal_pistons_distance {
            error!(
                "Impossible to reach elevator door \"{}\" of pistons distance \"{}\". Possible pistons distance: \"{}\" to \"{}\"",
                head_door_name, head_distance, minimal_pistons_distance, maximal_pistons_distance
            );
            // Drop only this stop and retry with the new head on the next pass
            self.queue.pop_head();
            return false;
        }
        let mut movements_finished = true;
        let new_piston_position = head_distance / working_piston_count as f32;
        let piston_speed = self.config.pistons_speed / working_piston_count as f32;
        let mut leftover_piston_distance = 0.0f32;
        for piston in &self.topology.pistons {
            if !piston.is_working() {
                continue;
            }
            match piston.status() {
                PistonStatus::Stopped | PistonStatus::Extended | PistonStatus::Retracted => {
                    let mut actual_new_position = new_piston_position + leftover_piston_distance;
                    leftover_piston_distance = 0.0;
                    if piston.current_position() > actual_new_position + f32::EPSILON {
                        if piston.lowest_position() > actual_new_position {
                            // The excess travel is carried over to the next piston
                            leftover_piston_distance =
                                actual_new_position - piston.lowest_position();
                            actual_new_position = piston.lowest_position();
                        }
                        if piston.max_limit() < actual_new_position {
                            piston.set_max_limit(actual_new_position);
                        }
                        piston.set_min_limit(actual_new_position);
                        piston.set_velocity(-piston_speed);
                        movements_finished = false;
                    } else if piston.current_position() < actual_new_position - f32::EPSILON {
                        if piston.highest_position() < actual_new_position {
                            leftover_piston_distance =
                                actual_new_position - piston.highest_position();
                            actual_new_position = piston.highest_position();
                        }
                        if piston.min_limit() > actual_new_position {
                            piston.set_min_limit(actual_new_position);
                        }
                        piston.set_max_limit(actual_new_position);
                        piston.set_velocity(piston_speed);
                        movements_finished = false;
                    }
                }
                PistonStatus::Extending | PistonStatus::Retracting => movements_finished = false,
            }
        }
        if movements_finished {
            self.state = ElevatorState::OpeningDoors;
            return true;
        }
        false
    }

    fn open_head_door(&mut self) {
        let Some(head) = self.queue.head() else { return };
        let door = Rc::clone(&head.door);
        if !door.is_functional() {
            self.queue.pop_head();
            self.state = ElevatorState::WaitingForInput;
            return;
        }
        match door.status() {
            DoorStatus::Closed => {
                door.set_enabled(true);
                door.open();
            }
            DoorStatus::Open => {
                // Power down once open, drop the serviced stop
                door.set_enabled(false);
                self.queue.pop_head();
                self.state = ElevatorState::WaitingForInput;
            }
            DoorStatus::Opening | DoorStatus::Closing => {}
        }
    }
}

/// Runs `step` until it reports no further transition or `max_steps` steps
/// ran. Returns the number of steps taken and whether the budget was
/// exhausted.
fn run_until_stable(mut step: impl FnMut() -> bool, max_steps: u32) -> (u32, bool) {
    let mut steps = 0;
    loop {
        let transitioned = step();
        steps += 1;
        if steps >= max_steps {
            return (steps, true);
        }
        if !transitioned {
            return (steps, false);
        }
    }
}

#[cfg(test)]
impl ElevatorFSM {
    pub fn test_state(&self) -> ElevatorState {
        self.state
    }

    pub fn test_set_state(&mut self, state: ElevatorState) {
        self.state = state;
    }

    pub fn test_queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn test_queue_distances(&self) -> Vec<f32> {
        self.queue.distances()
    }
}

#[cfg(test)]
pub fn test_run_until_stable(step: impl FnMut() -> bool, max_steps: u32) -> (u32, bool) {
    run_until_stable(step, max_steps)
}
