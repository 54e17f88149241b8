/*
 * Unit tests for the elevator state machine.
 *
 * The unit tests follow the Arrange, Act, Assert pattern. The simulated grid
 * plays the role of the hardware; a manual clock drives the door-close wait.
 */

/***************************************/
/*             Unit tests              */
/***************************************/
#[cfg(test)]
mod fsm_tests {
    use crate::elevator::fsm::{test_run_until_stable, ElevatorFSM, ElevatorState};
    use crate::elevator::hardware::{Clock, Door, DoorStatus, Piston, PistonStatus};
    use crate::simulator::{SimDoor, SimGrid, SimPiston};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    const CONTROLLER_DATA: &str = "ElevatorName=Test\nWaitForClosingDoorsTime=0\nPistonsSpeed=2";

    struct ManualClock {
        base: Instant,
        offset: Cell<Duration>,
    }

    impl ManualClock {
        fn new() -> ManualClock {
            ManualClock {
                base: Instant::now(),
                offset: Cell::new(Duration::ZERO),
            }
        }

        fn advance(&self, duration: Duration) {
            self.offset.set(self.offset.get() + duration);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + self.offset.get()
        }
    }

    fn setup(controller_data: &str) -> (ElevatorFSM, Rc<SimGrid>, Rc<ManualClock>) {
        let grid = Rc::new(SimGrid::new(controller_data));
        let clock = Rc::new(ManualClock::new());
        let fsm = ElevatorFSM::new(grid.clone(), clock.clone());
        (fsm, grid, clock)
    }

    fn add_door(grid: &SimGrid, door_name: &str, distance: f32) -> Rc<SimDoor> {
        grid.add_door(SimDoor::new(
            &format!("Door {}", door_name),
            &format!(
                "ElevatorName=Test\nElevatorDoorName={}\nPistonsDistance={}",
                door_name, distance
            ),
            1,
        ))
    }

    fn add_piston(
        grid: &SimGrid,
        name: &str,
        lowest: f32,
        highest: f32,
        initial: f32,
    ) -> Rc<SimPiston> {
        grid.add_piston(SimPiston::new(
            name,
            "ElevatorName=Test",
            lowest,
            highest,
            initial,
        ))
    }

    /// Advances the simulated world and the clock by one 100 ms tick, then
    /// runs the controller tick.
    fn tick_world(fsm: &mut ElevatorFSM, grid: &SimGrid, clock: &ManualClock, argument: &str) {
        grid.advance(0.1);
        clock.advance(Duration::from_millis(100));
        fsm.tick(argument);
    }

    #[test]
    fn test_missing_elevator_name_disables_controller() {
        // Arrange
        let (mut fsm, grid, _clock) = setup("");
        add_door(&grid, "Roof", 10.0);

        // Act
        let steps = fsm.tick("call Roof");

        // Assert
        assert_eq!(steps, 0);
        assert_eq!(fsm.test_state(), ElevatorState::WaitingForInput);
        assert_eq!(fsm.test_queue_len(), 0);
    }

    #[test]
    fn test_call_is_idempotent_while_pending() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Roof", 10.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act
        fsm.tick("call Roof");
        tick_world(&mut fsm, &grid, &clock, "call Roof");

        // Assert
        assert_eq!(fsm.test_queue_len(), 1);
    }

    #[test]
    fn test_unknown_door_is_a_no_op() {
        // Arrange
        let (mut fsm, grid, _clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Roof", 10.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act
        fsm.tick("call Basement");

        // Assert
        assert_eq!(fsm.test_queue_len(), 0);
        assert_eq!(fsm.test_state(), ElevatorState::WaitingForInput);
    }

    #[test]
    fn test_empty_queue_resets_to_waiting_for_input() {
        // Arrange
        let (mut fsm, grid, _clock) = setup(CONTROLLER_DATA);
        let door = add_door(&grid, "Roof", 10.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        fsm.tick("");
        fsm.test_set_state(ElevatorState::ClosingDoors);

        // Act
        fsm.evaluate();

        // Assert: state is corrected and the doors are untouched
        assert_eq!(fsm.test_state(), ElevatorState::WaitingForInput);
        assert_eq!(door.status(), DoorStatus::Closed);
        assert!(door.is_enabled());
    }

    #[test]
    fn test_unreachable_head_drops_exactly_one_request() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Roof", 10.0);
        add_door(&grid, "Tower", 50.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act: Tower is queued ahead of Roof and cannot be reached
        fsm.tick("call Roof");
        tick_world(&mut fsm, &grid, &clock, "call Tower");

        // Assert: only the head was dropped, the machine retries with Roof
        assert_eq!(fsm.test_queue_distances(), vec![10.0]);
        assert_eq!(fsm.test_state(), ElevatorState::MovingElevator);
    }

    #[test]
    fn test_zero_working_pistons_clears_queue() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Lobby", 0.0);
        add_door(&grid, "Roof", 10.0);
        let piston = add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        piston.set_working(false);

        // Act
        fsm.tick("call Roof");
        tick_world(&mut fsm, &grid, &clock, "call Lobby");

        // Assert
        assert_eq!(fsm.test_queue_len(), 0);
        assert_eq!(fsm.test_state(), ElevatorState::WaitingForInput);
    }

    #[test]
    fn test_call_zeroes_velocity_of_pistons_mid_travel() {
        // Arrange
        let (mut fsm, grid, _clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Roof", 10.0);
        let piston = add_piston(&grid, "Piston A", 0.0, 10.0, 5.0);
        piston.set_velocity(2.0);
        assert_eq!(piston.status(), PistonStatus::Extending);

        // Act: the machine is still waiting, so nothing overwrites the zero
        fsm.tick("call Roof");

        // Assert
        assert_eq!(piston.velocity(), 0.0);
        assert_eq!(fsm.test_queue_distances(), vec![10.0]);
    }

    #[test]
    fn test_new_call_redirects_movement() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Lobby", 0.0);
        add_door(&grid, "Roof", 10.0);
        let piston = add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        fsm.tick("call Roof");
        while piston.status() != PistonStatus::Extending {
            tick_world(&mut fsm, &grid, &clock, "");
        }

        // Act: Lobby is inserted at the head, movement reverses
        tick_world(&mut fsm, &grid, &clock, "call Lobby");

        // Assert
        assert_eq!(fsm.test_queue_distances(), vec![0.0, 10.0]);
        assert!(piston.velocity() < 0.0);
    }

    #[test]
    fn test_wait_for_closing_doors_time_is_respected() {
        // Arrange
        let (mut fsm, grid, clock) = setup(
            "ElevatorName=Test\nWaitForClosingDoorsTime=2\nPistonsSpeed=2",
        );
        add_door(&grid, "Roof", 10.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act & Assert: still waiting after one tick
        fsm.tick("call Roof");
        tick_world(&mut fsm, &grid, &clock, "");
        assert_eq!(fsm.test_state(), ElevatorState::WaitingToCloseDoors);

        // After the wait has elapsed the machine moves on
        clock.advance(Duration::from_secs(3));
        fsm.tick("");
        assert_eq!(fsm.test_state(), ElevatorState::MovingElevator);
    }

    #[test]
    fn test_closing_doors_closes_and_powers_down() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        let lobby = add_door(&grid, "Lobby", 0.0);
        let roof = add_door(&grid, "Roof", 10.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        roof.open();
        grid.advance(0.1);
        assert_eq!(roof.status(), DoorStatus::Open);

        // Act
        fsm.tick("call Lobby");
        tick_world(&mut fsm, &grid, &clock, "");

        // Assert: the open door is being closed, the closed one is powered down
        assert_eq!(fsm.test_state(), ElevatorState::ClosingDoors);
        assert_eq!(roof.status(), DoorStatus::Closing);
        assert!(!lobby.is_enabled());

        // Once every functional door is closed the machine moves on
        tick_world(&mut fsm, &grid, &clock, "");
        assert_eq!(roof.status(), DoorStatus::Closed);
        tick_world(&mut fsm, &grid, &clock, "");
        assert!(!roof.is_enabled());
        assert_ne!(fsm.test_state(), ElevatorState::ClosingDoors);
    }

    #[test]
    fn test_non_functional_head_door_is_dropped() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Lobby", 0.0);
        let roof = add_door(&grid, "Roof", 0.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        fsm.tick("call Roof");
        roof.set_functional(false);

        // Act: the piston is already at the target, service goes straight to
        // the door and finds it broken
        tick_world(&mut fsm, &grid, &clock, "");

        // Assert
        assert_eq!(fsm.test_queue_len(), 0);
        assert_eq!(fsm.test_state(), ElevatorState::WaitingForInput);
        assert_eq!(roof.status(), DoorStatus::Closed);
    }

    #[test]
    fn test_leftover_distance_is_carried_to_next_piston() {
        // Arrange: an even split would send the short piston beyond its range
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Top", 10.0);
        let short = add_piston(&grid, "Piston Short", 0.0, 2.0, 0.0);
        let long = add_piston(&grid, "Piston Long", 0.0, 10.0, 0.0);

        // Act
        fsm.tick("call Top");
        tick_world(&mut fsm, &grid, &clock, "");

        // Assert: 10/2 = 5 per piston; the short one clips at 2 and the
        // excess 3 moves to the long one
        assert_eq!(short.max_limit(), 2.0);
        assert_eq!(long.max_limit(), 8.0);
        assert_eq!(short.velocity(), 1.0);
        assert_eq!(long.velocity(), 1.0);
    }

    #[test]
    fn test_leftover_distance_is_carried_when_retracting() {
        // Arrange: the first piston cannot go below its lower bound
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Down", 2.0);
        let bounded = add_piston(&grid, "Piston Bounded", 2.0, 4.0, 4.0);
        let free = add_piston(&grid, "Piston Free", 0.0, 10.0, 6.0);

        // Act
        fsm.tick("call Down");
        tick_world(&mut fsm, &grid, &clock, "");

        // Assert: 2/2 = 1 per piston; the bounded one clips at 2, the excess
        // -1 sends the free one all the way to 0
        assert_eq!(bounded.min_limit(), 2.0);
        assert_eq!(free.min_limit(), 0.0);
        assert_eq!(bounded.velocity(), -1.0);
        assert_eq!(free.velocity(), -1.0);
    }

    #[test]
    fn test_duplicate_door_resolves_to_first_registration() {
        // Arrange
        let (mut fsm, grid, _clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Twin", 3.0);
        add_door(&grid, "Twin", 7.0);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act
        fsm.tick("call Twin");

        // Assert
        assert_eq!(fsm.test_queue_distances(), vec![3.0]);
    }

    #[test]
    fn test_reload_picks_up_new_doors() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        fsm.tick("");

        // Act & Assert: a door added after registration is unknown
        add_door(&grid, "Roof", 10.0);
        tick_world(&mut fsm, &grid, &clock, "call Roof");
        assert_eq!(fsm.test_queue_len(), 0);

        // Until the topology is rebuilt
        tick_world(&mut fsm, &grid, &clock, "reload");
        tick_world(&mut fsm, &grid, &clock, "call Roof");
        assert_eq!(fsm.test_queue_len(), 1);
    }

    #[test]
    fn test_configuration_text_change_is_detected() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        add_door(&grid, "Roof", 10.0);
        let piston = add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);
        fsm.tick("");

        // Act
        grid.set_custom_data("ElevatorName=Test\nWaitForClosingDoorsTime=0\nPistonsSpeed=4");
        fsm.tick("call Roof");
        tick_world(&mut fsm, &grid, &clock, "");

        // Assert: the new combined speed is in effect
        assert_eq!(piston.velocity(), 4.0);
    }

    #[test]
    fn test_call_to_open_door_cycle() {
        // Arrange
        let (mut fsm, grid, clock) = setup(CONTROLLER_DATA);
        let lobby = add_door(&grid, "Lobby", 0.0);
        let roof = add_door(&grid, "Roof", 10.0);
        let piston = add_piston(&grid, "Piston A", 0.0, 10.0, 0.0);

        // Act
        fsm.tick("call Roof");
        let mut serviced = false;
        for _ in 0..300 {
            tick_world(&mut fsm, &grid, &clock, "");
            if fsm.test_state() == ElevatorState::WaitingForInput
                && fsm.test_queue_len() == 0
                && piston.current_position() > 9.9
            {
                serviced = true;
                break;
            }
        }

        // Assert: the cab moved to the roof, the door opened and was powered
        // down, and the request was dropped
        assert!(serviced);
        assert!(piston.current_position() >= 9.99);
        assert_eq!(roof.status(), DoorStatus::Open);
        assert!(!roof.is_enabled());
        assert_eq!(lobby.status(), DoorStatus::Closed);
    }

    #[test]
    fn test_evaluation_stops_at_the_step_budget() {
        // Arrange: a step function that never stabilizes
        let (steps, exhausted) = test_run_until_stable(|| true, 10);

        // Assert
        assert_eq!(steps, 10);
        assert!(exhausted);
    }

    #[test]
    fn test_evaluation_stops_when_stable() {
        // Arrange: two transitions, then stable
        let count = Cell::new(0);

        // Act
        let (steps, exhausted) = test_run_until_stable(
            || {
                count.set(count.get() + 1);
                count.get() < 3
            },
            10,
        );

        // Assert
        assert_eq!(steps, 3);
        assert!(!exhausted);
    }
}
