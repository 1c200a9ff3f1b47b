//! Transporters and their state machine.
//!
//! A human is always in one root [`HumanStateKind`]. Each kind maps to a
//! static [`HumanState`] object (see [`states`]) and every transition goes
//! through [`set_state`], which runs the old state's `on_exit` before the new
//! state's `on_enter`. Callbacks may transition again from inside, so callers
//! return right after a transition.
//!
//! Humans never own references to the world. Everything they touch is passed
//! in through a [`HumanCx`] borrowed from the world for one call.

pub mod moving;
pub mod moving_resources;
pub mod states;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buildings::BuildingStore;
use crate::events::{ColonyEvent, HumanRemovalReason, Observers};
use crate::game_params::HumanParams;
use crate::grid::WorldGrid;
use crate::ids::{BuildingId, HumanId, ResourceId, SegmentId, SlotMap, StrictLookup};
use crate::library::BuildingLibrary;
use crate::resources::ResourceStore;
use crate::segments::SegmentStore;
use crate::tile_pos::TilePos;

pub use moving::HumanMoving;
pub use moving_resources::MovingResourcesState;
pub use states::{state_of, HumanState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HumanKind {
    Transporter,
    Constructor,
    Employee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HumanStateKind {
    #[default]
    None,
    MovingInTheWorld,
    MovingInsideSegment,
    MovingResources,
    Construction,
    Employee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovingInTheWorldState {
    #[default]
    None,
    MovingToCityHall,
    MovingToDestination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Human {
    pub moving: HumanMoving,
    pub kind: HumanKind,
    pub state: HumanStateKind,
    pub moving_in_the_world: MovingInTheWorldState,
    pub moving_resources: MovingResourcesState,
    pub segment_id: Option<SegmentId>,
    pub building_id: Option<BuildingId>,
    pub resource_id: Option<ResourceId>,
    pub action_started_at: f64,
    pub action_progress: f32,
}

impl Human {
    pub fn new(kind: HumanKind, pos: TilePos) -> Self {
        Self {
            moving: HumanMoving::new(pos),
            kind,
            state: HumanStateKind::None,
            moving_in_the_world: MovingInTheWorldState::None,
            moving_resources: MovingResourcesState::None,
            segment_id: None,
            building_id: None,
            resource_id: None,
            action_started_at: f64::NEG_INFINITY,
            action_progress: 0.0,
        }
    }
}

/// Live humans plus the bookkeeping lists that reference them.
#[derive(Debug, Default)]
pub struct HumanStore {
    pub humans: SlotMap<HumanId, Human>,
    /// Created this tick, merged at the end of [`update_humans`].
    pub staged: Vec<HumanId>,
    pub to_remove: Vec<(HumanId, HumanRemovalReason)>,
    /// Transporters without a segment, reassigned newest first.
    pub going_to_city_hall: Vec<HumanId>,
}

impl HumanStore {
    pub fn len(&self) -> usize {
        self.humans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.humans.is_empty()
    }

    pub fn get(&self, id: HumanId) -> Option<&Human> {
        self.humans.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HumanId, &Human)> + '_ {
        self.humans.iter()
    }

    fn removal_pending(&self, id: HumanId) -> bool {
        self.to_remove.iter().any(|(h, _)| *h == id)
    }
}

/// World state a human callback may read or change.
pub struct HumanCx<'a> {
    pub grid: &'a WorldGrid,
    pub segments: &'a mut SegmentStore,
    pub resources: &'a mut ResourceStore,
    pub buildings: &'a mut BuildingStore,
    pub library: &'a BuildingLibrary,
    pub params: &'a HumanParams,
    pub observers: &'a mut Observers,
    /// Simulation time in seconds.
    pub time: f64,
}

// ---------------------------------------------------------------------------
// Root state transitions
// ---------------------------------------------------------------------------

pub fn set_state(id: HumanId, human: &mut Human, new_state: HumanStateKind, cx: &mut HumanCx) {
    let old = human.state;
    debug!("{id}: {old:?} -> {new_state:?}");
    if let Some(state) = state_of(old) {
        state.on_exit(id, human, cx);
    }
    human.state = new_state;
    if let Some(state) = state_of(new_state) {
        state.on_enter(id, human, cx);
    }
}

pub fn root_update(id: HumanId, human: &mut Human, cx: &mut HumanCx, dt: f32) {
    if let Some(state) = state_of(human.state) {
        state.update(id, human, cx, dt);
    }
}

pub fn on_current_segment_changed(id: HumanId, human: &mut Human, cx: &mut HumanCx) {
    if let Some(state) = state_of(human.state) {
        state.on_current_segment_changed(id, human, cx);
    }
}

pub fn on_moved_to_the_next_tile(id: HumanId, human: &mut Human, cx: &mut HumanCx) {
    if let Some(state) = state_of(human.state) {
        state.on_moved_to_the_next_tile(id, human, cx);
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Spawn a transporter at `city_hall` for `segment_id`. It is staged until
/// the end of the current [`update_humans`].
pub fn create_transporter(
    humans: &mut HumanStore,
    cx: &mut HumanCx,
    city_hall: BuildingId,
    segment_id: SegmentId,
) -> HumanId {
    let pos = cx.buildings.strict(city_hall).pos;
    let id = humans.humans.insert(Human::new(HumanKind::Transporter, pos));
    humans.staged.push(id);
    cx.segments.strict_mut(segment_id).assigned_human = Some(id);

    let human = humans.humans.strict_mut(id);
    human.segment_id = Some(segment_id);
    set_state(id, human, HumanStateKind::MovingInTheWorld, cx);

    info!("transporter {id} created at {pos} for segment {segment_id}");
    cx.observers.emit(ColonyEvent::HumanCreated { human: id, pos });
    id
}

/// Advance every city-hall spawn timer and create one transporter per hall
/// that is due while segments are waiting.
pub fn process_city_halls(humans: &mut HumanStore, cx: &mut HumanCx, dt: f32) {
    for i in 0..cx.buildings.city_halls.len() {
        let (hall_id, _) = cx.buildings.city_halls[i];
        let scriptable = cx.buildings.strict(hall_id).scriptable;
        let delay = cx.library.strict_building(scriptable).human_spawning_delay;

        let timer = &mut cx.buildings.city_halls[i].1;
        timer.time_since_human_was_created = (timer.time_since_human_was_created + dt).min(delay);
        if timer.time_since_human_was_created < delay {
            continue;
        }
        let Some(segment_id) = cx.segments.wo_humans.pop_front() else {
            continue;
        };
        cx.buildings.city_halls[i].1.time_since_human_was_created -= delay;
        create_transporter(humans, cx, hall_id, segment_id);
    }
}

fn update_human(id: HumanId, humans: &mut HumanStore, cx: &mut HumanCx, dt: f32) {
    let removal_pending = humans.removal_pending(id);
    let Some(human) = humans.humans.get_mut(id) else {
        return;
    };

    if human.moving.to.is_some() {
        let duration = cx.params.moving_one_tile_duration;
        if human.moving.step(dt, duration) {
            on_moved_to_the_next_tile(id, human, cx);
        }
        human.moving.settle(duration);
    }

    if removal_pending {
        return;
    }
    root_update(id, human, cx, dt);

    let at_city_hall = human.moving_in_the_world == MovingInTheWorldState::MovingToCityHall
        && human.moving.to.is_none()
        && human
            .building_id
            .and_then(|b| cx.buildings.get(b))
            .is_some_and(|b| b.pos == human.moving.pos);
    if at_city_hall {
        humans
            .to_remove
            .push((id, HumanRemovalReason::TransporterReturnedToCityHall));
    }
}

pub fn remove_humans(humans: &mut HumanStore, cx: &mut HumanCx) {
    for (id, reason) in std::mem::take(&mut humans.to_remove) {
        humans.going_to_city_hall.retain(|&h| h != id);
        humans.staged.retain(|&h| h != id);
        if humans.humans.remove(id).is_none() {
            continue;
        }
        for (_, segment) in cx.segments.iter_mut() {
            if segment.assigned_human == Some(id) {
                segment.assigned_human = None;
            }
        }
        info!("{id} removed: {reason:?}");
        cx.observers.emit(ColonyEvent::HumanRemoved { human: id, reason });
    }
}

/// One tick of every human: live ones first, then the ones staged by city
/// halls this tick.
pub fn update_humans(humans: &mut HumanStore, cx: &mut HumanCx, dt: f32) {
    remove_humans(humans, cx);

    let live: Vec<HumanId> = humans
        .humans
        .keys()
        .filter(|id| !humans.staged.contains(id))
        .collect();
    for id in live {
        update_human(id, humans, cx, dt);
    }

    for id in std::mem::take(&mut humans.staged) {
        let Some(segment_id) = humans.humans.get(id).and_then(|h| h.segment_id) else {
            continue;
        };
        if let Some(segment) = cx.segments.get_mut(segment_id) {
            segment.assigned_human = Some(id);
        }
        update_human(id, humans, cx, dt);
    }

    remove_humans(humans, cx);
}
