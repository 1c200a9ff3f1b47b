//! Deterministic simulation ordering via `SystemSet` phases.
//!
//! ```text
//! PreSim  →  Simulation  →  PostSim
//! ```
//!
//! * **PreSim** – tick counter, draining build requests into the world queue.
//! * **Simulation** – the colony tick itself.
//! * **PostSim** – forwarding journaled colony events. Only reads world state.

use bevy::prelude::*;

/// Ordered phases for systems running in the `FixedUpdate` schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    PreSim,
    Simulation,
    PostSim,
}

pub(crate) fn configure_simulation_sets(app: &mut App) {
    app.configure_sets(
        FixedUpdate,
        (
            SimulationSet::PreSim,
            SimulationSet::Simulation,
            SimulationSet::PostSim,
        )
            .chain(),
    );
}
