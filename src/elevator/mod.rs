pub mod fsm;
pub mod hardware;
pub mod queue;
pub mod topology;

pub mod fsm_tests;

pub use fsm::ElevatorFSM;
