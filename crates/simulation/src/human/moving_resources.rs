//! The `MovingResources` root state and its sub-states: walk to the queued
//! resource, pick it up, carry it to the leg's exit vertex, put it down.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::states::HumanState;
use super::{set_state, Human, HumanCx, HumanStateKind};
use crate::events::ColonyEvent;
use crate::ids::{HumanId, ResourceId};
use crate::pathfinding_sys::find_path_inside_graph;
use crate::resources::cancel_resource_route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovingResourcesState {
    #[default]
    None,
    MovingToResource,
    PickingUpResource,
    MovingResource,
    PlacingResource,
}

/// Callbacks of one `MovingResources` sub-state.
trait ResourceSubState: Sync {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx);
    fn on_exit(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    fn update(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx, _dt: f32) {}
    fn on_current_segment_changed(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    fn on_moved_to_the_next_tile(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
}

struct MovingToResource;
struct PickingUpResource;
struct MovingResource;
struct PlacingResource;

fn substate_of(kind: MovingResourcesState) -> Option<&'static dyn ResourceSubState> {
    match kind {
        MovingResourcesState::None => None,
        MovingResourcesState::MovingToResource => Some(&MovingToResource),
        MovingResourcesState::PickingUpResource => Some(&PickingUpResource),
        MovingResourcesState::MovingResource => Some(&MovingResource),
        MovingResourcesState::PlacingResource => Some(&PlacingResource),
    }
}

fn set_substate(id: HumanId, human: &mut Human, new_state: MovingResourcesState, cx: &mut HumanCx) {
    debug!("{id}: {:?} -> {new_state:?}", human.moving_resources);
    if let Some(state) = substate_of(human.moving_resources) {
        state.on_exit(id, human, cx);
    }
    human.moving_resources = new_state;
    if let Some(state) = substate_of(new_state) {
        state.on_enter(id, human, cx);
    }
}

/// Leave resource handling altogether.
fn exit(id: HumanId, human: &mut Human, cx: &mut HumanCx) {
    set_state(id, human, HumanStateKind::MovingInTheWorld, cx);
}

fn action_progress(time: f64, started_at: f64, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    ((time - started_at) / f64::from(duration)) as f32
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

pub struct MovingResources;

impl HumanState for MovingResources {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        set_substate(id, human, MovingResourcesState::MovingToResource, cx);
    }

    /// Whatever is still in hand is put down where the human stands and its
    /// building gets the request back.
    fn on_exit(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        if let Some(state) = substate_of(human.moving_resources) {
            state.on_exit(id, human, cx);
        }
        human.moving_resources = MovingResourcesState::None;

        let Some(resource_id) = human.resource_id.take() else {
            return;
        };
        let Some(res) = cx.resources.get_mut(resource_id) else {
            return;
        };
        if res.targeted_human == Some(id) {
            res.targeted_human = None;
        }
        if res.carrying_human == Some(id) {
            res.carrying_human = None;
            res.pos = human.moving.pos;
            info!("{id} dropped {resource_id} at {}", human.moving.pos);
            cancel_resource_route(cx.resources, cx.segments, resource_id, true);
        }
    }

    fn update(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx, dt: f32) {
        if let Some(state) = substate_of(human.moving_resources) {
            state.update(id, human, cx, dt);
        }
    }

    fn on_current_segment_changed(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        if let Some(state) = substate_of(human.moving_resources) {
            state.on_current_segment_changed(id, human, cx);
        }
    }

    fn on_moved_to_the_next_tile(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        if let Some(state) = substate_of(human.moving_resources) {
            state.on_moved_to_the_next_tile(id, human, cx);
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-states
// ---------------------------------------------------------------------------

impl ResourceSubState for MovingToResource {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        let Some(segment_id) = human.segment_id else {
            exit(id, human, cx);
            return;
        };
        let Some(&resource_id) = cx.segments.strict(segment_id).resources_to_transport.front() else {
            exit(id, human, cx);
            return;
        };

        human.resource_id = Some(resource_id);
        let res = cx.resources.strict_mut(resource_id);
        res.targeted_human = Some(id);
        let resource_pos = res.pos;

        if !cx.segments.strict(segment_id).graph.has_node(resource_pos) {
            warn!("{id}: {resource_id} at {resource_pos} is off segment {segment_id}, dropping its route");
            cancel_resource_route(cx.resources, cx.segments, resource_id, true);
            exit(id, human, cx);
            return;
        }

        human.moving.clear_to_if_idle();
        if resource_pos == human.moving.pos && human.moving.elapsed == 0.0 {
            set_substate(id, human, MovingResourcesState::PickingUpResource, cx);
            return;
        }

        let graph = &cx.segments.strict(segment_id).graph;
        let will_move_to = human.moving.destination();
        let walkable = graph.has_node(human.moving.pos) && graph.has_node(will_move_to);
        if !walkable {
            exit(id, human, cx);
            return;
        }
        if resource_pos != will_move_to {
            match find_path_inside_graph(graph, will_move_to, resource_pos) {
                Some(path) => human.moving.add_path(&path),
                None => {
                    warn!("{id}: {resource_id} unreachable inside segment {segment_id}");
                    exit(id, human, cx);
                }
            }
        }
    }

    fn on_exit(&self, _id: HumanId, human: &mut Human, _cx: &mut HumanCx) {
        human.moving.reset_path();
    }

    fn on_current_segment_changed(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        exit(id, human, cx);
    }

    fn on_moved_to_the_next_tile(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        let Some(resource_pos) = human
            .resource_id
            .and_then(|r| cx.resources.get(r))
            .map(|r| r.pos)
        else {
            exit(id, human, cx);
            return;
        };

        human.moving.clear_to_if_idle();
        if human.moving.pos == resource_pos {
            set_substate(id, human, MovingResourcesState::PickingUpResource, cx);
        }
    }
}

impl ResourceSubState for PickingUpResource {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        debug_assert!(human.moving.to.is_none(), "{id} picks up while walking");
        debug_assert!(human.moving.path.is_empty());

        human.moving.elapsed = 0.0;
        human.action_started_at = cx.time;
        if let Some(resource) = human.resource_id {
            cx.observers.emit(ColonyEvent::HumanStartedPickingUpResource { human: id, resource });
        }
    }

    fn on_exit(&self, _id: HumanId, human: &mut Human, _cx: &mut HumanCx) {
        human.action_started_at = f64::NEG_INFINITY;
        human.action_progress = 0.0;
    }

    fn update(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx, _dt: f32) {
        human.action_progress =
            action_progress(cx.time, human.action_started_at, cx.params.picking_up_duration);
        if human.action_progress < 1.0 {
            return;
        }
        human.action_progress = 1.0;

        let Some(resource_id) = human.resource_id else {
            exit(id, human, cx);
            return;
        };
        cx.observers.emit(ColonyEvent::HumanFinishedPickingUpResource {
            human: id,
            resource: resource_id,
        });
        cx.resources.strict_mut(resource_id).carrying_human = Some(id);
        set_substate(id, human, MovingResourcesState::MovingResource, cx);
    }
}

impl ResourceSubState for MovingResource {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        debug_assert!(human.moving.to.is_none());

        let (Some(segment_id), Some(resource_id)) = (human.segment_id, human.resource_id) else {
            exit(id, human, cx);
            return;
        };
        let Some(&target) = cx.resources.strict(resource_id).transportation_vertices.first() else {
            panic!("{id} carries {resource_id} which has no route");
        };
        let graph = &cx.segments.strict(segment_id).graph;
        if !graph.has_node(human.moving.pos) || !graph.has_node(target) {
            exit(id, human, cx);
            return;
        }

        match find_path_inside_graph(graph, human.moving.pos, target) {
            Some(path) => human.moving.add_path(&path),
            None => {
                warn!("{id}: {target} unreachable inside segment {segment_id}");
                exit(id, human, cx);
                return;
            }
        }
        // Already standing on the exit vertex.
        if human.moving.to.is_none() {
            set_substate(id, human, MovingResourcesState::PlacingResource, cx);
        }
    }

    fn on_moved_to_the_next_tile(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        if human.moving.to.is_none() {
            set_substate(id, human, MovingResourcesState::PlacingResource, cx);
        }
    }
}

impl ResourceSubState for PlacingResource {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        debug_assert!(human.moving.to.is_none(), "{id} places while walking");
        debug_assert!(human.moving.path.is_empty());

        human.moving.elapsed = 0.0;
        human.action_started_at = cx.time;
    }

    fn on_exit(&self, _id: HumanId, human: &mut Human, _cx: &mut HumanCx) {
        human.action_started_at = f64::NEG_INFINITY;
        human.action_progress = 0.0;
    }

    fn update(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx, _dt: f32) {
        human.action_progress =
            action_progress(cx.time, human.action_started_at, cx.params.placing_duration);
        if human.action_progress < 1.0 {
            return;
        }
        human.action_progress = 1.0;

        if let Some(resource_id) = human.resource_id {
            if let Some(res) = cx.resources.get_mut(resource_id) {
                res.targeted_human = None;
            }
            place_resource(id, human, resource_id, cx);
            cx.observers.emit(ColonyEvent::HumanFinishedPlacingResource {
                human: id,
                resource: resource_id,
                pos: human.moving.pos,
            });
        }
        exit(id, human, cx);
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Put a carried resource down at the human's tile and decide what happens
/// to it: delivered into its building, handed to the next leg's segment, or
/// left on the map with its route cancelled.
fn place_resource(id: HumanId, human: &mut Human, resource_id: ResourceId, cx: &mut HumanCx) {
    let pos = human.moving.pos;

    let res = cx.resources.strict_mut(resource_id);
    res.pos = pos;
    res.carrying_human = None;
    let (booking, kind) = (res.booking, res.kind);

    let building_id = booking
        .and_then(|b| cx.resources.booking(b))
        .map(|b| b.building);
    let placed_inside = building_id
        .and_then(|b| cx.buildings.get(b))
        .is_some_and(|b| b.pos == pos);

    let res = cx.resources.strict_mut(resource_id);
    let moved_to_next = if res.transportation_vertices.is_empty() {
        false
    } else {
        let vertex = res.transportation_vertices.remove(0);
        res.transportation_segments.remove(0);
        vertex == pos && !res.transportation_segments.is_empty()
    };
    let next_segment = res.transportation_segments.first().copied();

    if let Some(segment) = human.segment_id.and_then(|s| cx.segments.get_mut(s)) {
        segment.forget_resource(resource_id);
    }

    if placed_inside {
        let (Some(building_id), Some(booking)) = (building_id, booking) else {
            unreachable!("placed inside without a booking");
        };
        cx.resources.remove_booking(booking);
        cx.resources.remove(resource_id);
        for (_, segment) in cx.segments.iter_mut() {
            segment.forget_resource(resource_id);
        }

        info!("{id} delivered {resource_id} to {building_id}");
        let constructed = cx.buildings.deliver_resource(building_id, kind, cx.library);
        cx.observers.emit(ColonyEvent::ResourceDelivered {
            building: building_id,
            kind,
        });
        if constructed {
            let building_pos = cx.buildings.strict(building_id).pos;
            info!("building {building_id} at {building_pos} constructed");
            cx.observers.emit(ColonyEvent::BuildingConstructed {
                building: building_id,
                pos: building_pos,
            });
        }
        return;
    }

    if moved_to_next {
        if let Some(segment) = next_segment.and_then(|s| cx.segments.get_mut(s)) {
            segment.resources_to_transport.push_back(resource_id);
            debug!("{resource_id} handed over at {pos}");
            return;
        }
    }

    info!("{resource_id} left on the map at {pos}");
    cancel_resource_route(cx.resources, cx.segments, resource_id, true);
}
