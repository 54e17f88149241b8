use crate::config;
use crate::elevator::hardware::{Door, Grid, Piston};
use log::{error, info, warn};
use std::collections::HashMap;
use std::rc::Rc;

/// A registered stop: the door block plus the summed piston travel needed to
/// reach it.
#[derive(Clone)]
pub struct ElevatorDoor {
    pub door: Rc<dyn Door>,
    pub pistons_distance: f32,
}

/// The doors and pistons belonging to one named elevator. Door names are
/// lowercased and unique; the first registration of a name wins.
#[derive(Default)]
pub struct Topology {
    pub doors: HashMap<String, ElevatorDoor>,
    pub pistons: Vec<Rc<dyn Piston>>,
}

impl Topology {
    /// Scans the grid and rebuilds the door map and piston list for
    /// `elevator_name` (lowercased) from scratch. Blocks with invalid or
    /// incomplete configuration are logged and skipped; registration of the
    /// remaining blocks continues.
    pub fn register(grid: &dyn Grid, elevator_name: &str) -> Topology {
        let mut topology = Topology::default();
        for door in grid.doors() {
            if !door.is_functional() {
                continue;
            }
            let mut assigned_elevator: Option<String> = None;
            let mut door_name: Option<String> = None;
            let mut pistons_distance: Option<f32> = None;
            for (key, value) in config::key_value_pairs(&door.custom_data()) {
                match key.as_str() {
                    "elevatorname" => assigned_elevator = Some(value.to_lowercase()),
                    "elevatordoorname" => door_name = Some(value.to_lowercase()),
                    "pistonsdistance" => match value.parse::<f32>() {
                        Ok(distance) if distance >= 0.0 => pistons_distance = Some(distance),
                        Ok(_) => {}
                        Err(e) => {
                            error!("Invalid pistons distance on door \"{}\": {}", door.name(), e)
                        }
                    },
                    _ => {}
                }
            }
            if assigned_elevator.is_none() && door_name.is_none() && pistons_distance.is_none() {
                // Not an elevator door at all
                continue;
            }
            let Some(assigned_elevator) = assigned_elevator else {
                error!(
                    "Door \"{}\" does not have an elevator name assigned.",
                    door.name()
                );
                continue;
            };
            if assigned_elevator != elevator_name {
                continue;
            }
            let Some(door_name) = door_name else {
                error!(
                    "Door \"{}\" does not have an elevator door name assigned.",
                    door.name()
                );
                continue;
            };
            let Some(pistons_distance) = pistons_distance else {
                error!(
                    "Door \"{}\" does not have a pistons distance assigned.",
                    door.name()
                );
                continue;
            };
            if topology.doors.contains_key(&door_name) {
                warn!("Skipping duplicate elevator door name \"{}\"...", door_name);
                continue;
            }
            info!("Registered door \"{}\" as \"{}\".", door.name(), door_name);
            topology.doors.insert(
                door_name,
                ElevatorDoor {
                    door,
                    pistons_distance,
                },
            );
        }
        for piston in grid.pistons() {
            let is_member = config::key_value_pairs(&piston.custom_data())
                .into_iter()
                .any(|(key, value)| key == "elevatorname" && value.to_lowercase() == elevator_name);
            if is_member {
                info!("Registered piston \"{}\".", piston.name());
                topology.pistons.push(piston);
            }
        }
        topology
    }
}
