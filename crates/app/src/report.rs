//! Log lines for notable colony events.

use bevy::prelude::*;

use colony_sim::ColonyEvent;

pub fn log_colony_events(mut events: EventReader<ColonyEvent>) {
    for event in events.read() {
        match event {
            ColonyEvent::BuildingConstructed { building, pos } => {
                info!("{building} constructed at {pos}");
            }
            ColonyEvent::HumanCreated { human, pos } => {
                debug!("{human} spawned at {pos}");
            }
            ColonyEvent::HumanRemoved { human, reason } => {
                debug!("{human} removed: {reason:?}");
            }
            ColonyEvent::ResourceDelivered { building, kind } => {
                debug!("resource {kind:?} delivered to {building}");
            }
            other => trace!("{other:?}"),
        }
    }
}
