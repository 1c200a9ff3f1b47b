//! Root states. Every [`HumanStateKind`] resolves to one static object
//! through [`state_of`].

use bevy::prelude::*;

use super::moving_resources::MovingResources;
use super::{set_state, Human, HumanCx, HumanKind, HumanStateKind, MovingInTheWorldState};
use crate::grid::WorldGrid;
use crate::ids::{BuildingId, HumanId};
use crate::pathfinding_sys::find_path;
use crate::tile_pos::TilePos;

pub trait HumanState: Sync {
    fn on_enter(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    fn on_exit(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    fn update(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx, _dt: f32) {}
    fn on_current_segment_changed(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    fn on_moved_to_the_next_tile(&self, _id: HumanId, _human: &mut Human, _cx: &mut HumanCx) {}
    /// Re-evaluate transitions. `old_building` is the building the human
    /// was heading to before this call.
    fn update_states(
        &self,
        _id: HumanId,
        _human: &mut Human,
        _cx: &mut HumanCx,
        _old_building: Option<BuildingId>,
    ) {
    }
}

pub struct MovingInTheWorld;
pub struct MovingInsideSegment;
pub struct Construction;
pub struct Employee;

impl HumanState for Construction {}
impl HumanState for Employee {}

pub fn state_of(kind: HumanStateKind) -> Option<&'static dyn HumanState> {
    match kind {
        HumanStateKind::None => None,
        HumanStateKind::MovingInTheWorld => Some(&MovingInTheWorld),
        HumanStateKind::MovingInsideSegment => Some(&MovingInsideSegment),
        HumanStateKind::MovingResources => Some(&MovingResources),
        HumanStateKind::Construction => Some(&Construction),
        HumanStateKind::Employee => Some(&Employee),
    }
}

/// Queue a free-grid path (trees avoided) from where the human will stand
/// to `target`.
pub(super) fn walk_to(id: HumanId, human: &mut Human, grid: &WorldGrid, target: TilePos) {
    let from = human.moving.destination();
    match find_path(grid, from, target, true) {
        Some(path) => human.moving.add_path(&path),
        None => warn!("{id}: no path from {from} to {target}"),
    }
}

// ---------------------------------------------------------------------------
// MovingInTheWorld
// ---------------------------------------------------------------------------

impl HumanState for MovingInTheWorld {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        human.moving.reset_path();
        self.update_states(id, human, cx, None);
    }

    fn on_exit(&self, _id: HumanId, human: &mut Human, _cx: &mut HumanCx) {
        human.moving_in_the_world = MovingInTheWorldState::None;
        human.moving.reset_path();
    }

    fn update(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx, _dt: f32) {
        let building = human.building_id;
        self.update_states(id, human, cx, building);
    }

    fn on_current_segment_changed(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        debug_assert_eq!(human.kind, HumanKind::Transporter);
        self.update_states(id, human, cx, None);
    }

    fn update_states(
        &self,
        id: HumanId,
        human: &mut Human,
        cx: &mut HumanCx,
        old_building: Option<BuildingId>,
    ) {
        if let Some(segment_id) = human.segment_id {
            debug_assert_eq!(human.kind, HumanKind::Transporter);
            human.building_id = None;

            let Some(segment) = cx.segments.get(segment_id) else {
                panic!("{id} is assigned to dead segment {segment_id}");
            };
            let inside = segment.graph.has_node(human.moving.pos);
            let center = segment.graph.center();

            if inside {
                human.moving.reset_path();
                set_state(id, human, HumanStateKind::MovingInsideSegment, cx);
                return;
            }

            if human.moving_in_the_world != MovingInTheWorldState::MovingToDestination {
                human.moving_in_the_world = MovingInTheWorldState::MovingToDestination;
                human.moving.clear_to_if_idle();
                if center != human.moving.destination() {
                    debug!("{id}: walking to segment {segment_id}");
                    walk_to(id, human, cx.grid, center);
                }
            }
            return;
        }

        let works_in_building = matches!(human.kind, HumanKind::Constructor | HumanKind::Employee);
        if works_in_building {
            if let Some(building_id) = human.building_id {
                if old_building != Some(building_id) {
                    let target = cx.buildings.strict(building_id).pos;
                    human.moving.clear_to_if_idle();
                    walk_to(id, human, cx.grid, target);
                }
                return;
            }
        }

        if human.moving_in_the_world != MovingInTheWorldState::MovingToCityHall {
            human.moving_in_the_world = MovingInTheWorldState::MovingToCityHall;
            let Some(city_hall) = cx.buildings.first_city_hall() else {
                panic!("{id} has no city hall to return to");
            };
            let target = cx.buildings.strict(city_hall).pos;
            human.building_id = Some(city_hall);
            human.moving.clear_to_if_idle();
            human.moving.reset_path();
            if human.moving.destination() != target {
                debug!("{id}: walking back to city hall {city_hall}");
                walk_to(id, human, cx.grid, target);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MovingInsideSegment
// ---------------------------------------------------------------------------

impl HumanState for MovingInsideSegment {
    fn on_enter(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        let Some(segment_id) = human.segment_id else {
            panic!("{id} entered its segment without having one");
        };
        let segment = cx.segments.strict(segment_id);
        if segment.resources_to_transport.is_empty() {
            let center = segment.graph.center();
            human.moving.clear_to_if_idle();
            walk_to(id, human, cx.grid, center);
        }
    }

    fn on_exit(&self, _id: HumanId, human: &mut Human, _cx: &mut HumanCx) {
        human.moving.reset_path();
    }

    fn update(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx, _dt: f32) {
        self.update_states(id, human, cx, None);
    }

    fn on_current_segment_changed(&self, id: HumanId, human: &mut Human, cx: &mut HumanCx) {
        set_state(id, human, HumanStateKind::MovingInTheWorld, cx);
    }

    fn update_states(
        &self,
        id: HumanId,
        human: &mut Human,
        cx: &mut HumanCx,
        _old_building: Option<BuildingId>,
    ) {
        let Some(segment) = human.segment_id.and_then(|s| cx.segments.get(s)) else {
            human.moving.reset_path();
            set_state(id, human, HumanStateKind::MovingInTheWorld, cx);
            return;
        };

        if !segment.resources_to_transport.is_empty() {
            if human.moving.to.is_none() {
                set_state(id, human, HumanStateKind::MovingResources, cx);
                return;
            }
            // Finish the tile being entered, then pick up.
            human.moving.reset_path();
        }
    }
}
