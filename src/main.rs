/* 3rd party libraries */
use clap::Parser;
use crossbeam_channel as cbc;
use log::info;
use std::io::BufRead;
use std::rc::Rc;
use std::time::Duration;

/* Custom libraries */
use elevator::hardware::SystemClock;
use elevator::ElevatorFSM;
use simulator::SimGrid;

/* Modules */
mod config;
mod elevator;
mod simulator;

#[derive(Debug, Parser)]
#[clap(about = "Piston elevator controller running against a simulated grid")]
struct Args {
    /// Path to the scenario file describing the simulated grid
    #[clap(long, default_value = "config.toml")]
    scenario: String,
}

/* Main */
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let scenario = config::load_scenario(&args.scenario);

    // Build the simulated world and the controller
    let grid = Rc::new(SimGrid::from_scenario(&scenario));
    let mut fsm = ElevatorFSM::new(grid.clone(), Rc::new(SystemClock));

    // Commands are read line by line from stdin; each tick consumes the most
    // recent unhandled line
    let (command_tx, command_rx) = cbc::unbounded::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if command_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let tick_interval = Duration::from_millis(scenario.simulation.tick_interval_ms);
    let ticker = cbc::tick(tick_interval);
    let dt = tick_interval.as_secs_f32();
    let mut pending_command = String::new();

    info!("Elevator controller running. Commands: \"call <doorName>\", \"reload\"");
    loop {
        cbc::select! {
            recv(command_rx) -> line => match line {
                Ok(line) => pending_command = line,
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                grid.advance(dt);
                fsm.tick(&std::mem::take(&mut pending_command));
            }
        }
    }
}
