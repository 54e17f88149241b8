/***************************************/
/*        3rd party libraries          */
/***************************************/
use log::error;
use serde::Deserialize;
use std::fs;

/***************************************/
/*       Public data structures        */
/***************************************/

/**
 * Controller settings parsed from the controller block's configuration text.
 *
 * The configuration text is a free-text blob of `key=value` lines. Recognized
 * keys (case-insensitive):
 *
 * - `ElevatorName`:            Name of the elevator. Required; an empty name
 *                              disables the controller entirely.
 * - `WaitForClosingDoorsTime`: Seconds to wait before closing the doors
 *                              (optional, default 3 seconds).
 * - `PistonsSpeed`:            Speed of all pistons summed up, in axis units
 *                              per second (optional, default 2).
 */
#[derive(Clone, Debug, PartialEq)]
pub struct ElevatorConfig {
    pub elevator_name: String,
    pub wait_for_closing_doors_time: f64,
    pub pistons_speed: f32,
}

impl Default for ElevatorConfig {
    fn default() -> ElevatorConfig {
        ElevatorConfig {
            elevator_name: String::new(),
            wait_for_closing_doors_time: 3.0,
            pistons_speed: 2.0,
        }
    }
}

impl ElevatorConfig {
    /// Parses the controller configuration text. Parsing starts from the
    /// defaults, so a reparse after a text change resets unspecified keys.
    /// Invalid numbers are logged and the previous value is kept; negative
    /// wait times and non-positive speeds are rejected the same way.
    pub fn parse(text: &str) -> ElevatorConfig {
        let mut config = ElevatorConfig::default();
        for (key, value) in key_value_pairs(text) {
            match key.as_str() {
                "elevatorname" => config.elevator_name = value.to_lowercase(),
                "waitforclosingdoorstime" => match value.parse::<f64>() {
                    Ok(time) if time >= 0.0 => config.wait_for_closing_doors_time = time,
                    Ok(_) => {}
                    Err(e) => error!("Invalid wait for closing doors time \"{}\": {}", value, e),
                },
                "pistonsspeed" => match value.parse::<f32>() {
                    Ok(speed) if speed > f32::EPSILON => config.pistons_speed = speed,
                    Ok(_) => {}
                    Err(e) => error!("Invalid pistons speed \"{}\": {}", value, e),
                },
                _ => {}
            }
        }
        config
    }
}

/// Extracts `key=value` pairs from a configuration text, one pair per line.
/// Keys are trimmed and lowercased, values trimmed. Lines without a
/// non-leading `=`, or with an empty value, are skipped.
pub fn key_value_pairs(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let equals_index = line.find('=')?;
            if equals_index == 0 {
                return None;
            }
            let key = line[..equals_index].trim().to_lowercase();
            let value = line[equals_index + 1..].trim();
            if value.is_empty() {
                return None;
            }
            Some((key, value.to_string()))
        })
        .collect()
}

/***************************************/
/*         Simulator scenario          */
/***************************************/

#[derive(Deserialize, Clone)]
pub struct Scenario {
    pub simulation: SimulationConfig,
    pub controller: ControllerScenario,
    #[serde(default)]
    pub doors: Vec<DoorScenario>,
    #[serde(default)]
    pub pistons: Vec<PistonScenario>,
}

#[derive(Deserialize, Clone)]
pub struct SimulationConfig {
    pub tick_interval_ms: u64,
    pub door_travel_ticks: u32,
}

#[derive(Deserialize, Clone)]
pub struct ControllerScenario {
    pub custom_data: String,
}

#[derive(Deserialize, Clone)]
pub struct DoorScenario {
    pub name: String,
    pub custom_data: String,
}

#[derive(Deserialize, Clone)]
pub struct PistonScenario {
    pub name: String,
    pub custom_data: String,
    pub lowest_position: f32,
    pub highest_position: f32,
    pub initial_position: f32,
}

/***************************************/
/*             Public API              */
/***************************************/
pub fn load_scenario(path: &str) -> Scenario {
    let scenario_str = fs::read_to_string(path).expect("Failed to read scenario file");
    toml::from_str(&scenario_str).expect("Failed to parse scenario file")
}

/***************************************/
/*             Unit tests              */
/***************************************/
