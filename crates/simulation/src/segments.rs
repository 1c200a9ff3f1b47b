//! Live road segments and the transaction that replaces them.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::graph::Graph;
use crate::human::{self, HumanCx, HumanStateKind, HumanStore};
use crate::ids::{HumanId, ResourceId, SegmentId, SlotMap, StrictLookup};
use crate::resources::cancel_resource_route;
use crate::tile_pos::TilePos;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphSegment {
    pub vertices: Vec<TilePos>,
    pub graph: Graph,
    pub assigned_human: Option<HumanId>,
    pub linked_segments: Vec<SegmentId>,
    pub resources_to_transport: VecDeque<ResourceId>,
    /// Every resource whose booked route crosses this segment.
    pub linked_resources: Vec<ResourceId>,
}

impl GraphSegment {
    pub fn new(vertices: Vec<TilePos>, graph: Graph) -> Self {
        Self {
            vertices,
            graph,
            assigned_human: None,
            linked_segments: Vec::new(),
            resources_to_transport: VecDeque::new(),
            linked_resources: Vec::new(),
        }
    }

    pub fn shares_vertex_with(&self, other: &GraphSegment) -> bool {
        self.vertices.iter().any(|v| other.vertices.contains(v))
    }

    pub fn is_vertex(&self, pos: TilePos) -> bool {
        self.vertices.contains(&pos)
    }

    /// Drop every reference to `resource` from the queue and the link list.
    pub fn forget_resource(&mut self, resource: ResourceId) {
        self.resources_to_transport.retain(|&r| r != resource);
        self.linked_resources.retain(|&r| r != resource);
    }
}

#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: SlotMap<SegmentId, GraphSegment>,
    /// Segments waiting for a transporter, oldest first.
    pub wo_humans: VecDeque<SegmentId>,
}

impl SegmentStore {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: SegmentId) -> Option<&GraphSegment> {
        self.segments.get(id)
    }

    pub fn get_mut(&mut self, id: SegmentId) -> Option<&mut GraphSegment> {
        self.segments.get_mut(id)
    }

    #[track_caller]
    pub fn strict(&self, id: SegmentId) -> &GraphSegment {
        self.segments.strict(id)
    }

    #[track_caller]
    pub fn strict_mut(&mut self, id: SegmentId) -> &mut GraphSegment {
        self.segments.strict_mut(id)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &GraphSegment)> + '_ {
        self.segments.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SegmentId, &mut GraphSegment)> + '_ {
        self.segments.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments.keys()
    }

    /// Segments with a non-zero node at `pos`.
    pub fn segments_at(&self, pos: TilePos) -> impl Iterator<Item = (SegmentId, &GraphSegment)> + '_ {
        self.segments.iter().filter(move |(_, s)| s.graph.has_node(pos))
    }

    pub fn any_segment_at(&self, pos: TilePos) -> bool {
        self.segments_at(pos).next().is_some()
    }

    /// Finalise `segment` and link it to every live segment it shares a vertex
    /// with.
    pub fn add_and_link(&mut self, mut segment: GraphSegment) -> SegmentId {
        segment.graph.calculate_data();
        segment.assigned_human = None;
        segment.linked_segments.clear();

        let neighbours: Vec<SegmentId> = self
            .segments
            .iter()
            .filter(|(_, other)| other.shares_vertex_with(&segment))
            .map(|(id, _)| id)
            .collect();

        let id = self.segments.insert(segment);
        for other in neighbours {
            let Some([added, linked]) = self.segments.get_disjoint_mut([id, other]) else {
                panic!("segment {id} aliased with {other} while linking");
            };
            if !added.linked_segments.contains(&other) {
                added.linked_segments.push(other);
            }
            if !linked.linked_segments.contains(&id) {
                linked.linked_segments.push(id);
            }
        }
        id
    }

    /// Unlink from neighbours, leave the waiting queue, and free the slot.
    pub fn unlink_and_remove(&mut self, id: SegmentId) -> GraphSegment {
        let Some(segment) = self.segments.remove(id) else {
            panic!("removing dead segment {id}");
        };
        for &linked in &segment.linked_segments {
            if let Some(other) = self.segments.get_mut(linked) {
                other.linked_segments.retain(|&s| s != id);
            }
        }
        self.wo_humans.retain(|&s| s != id);
        segment
    }

    /// No edge bit is owned by two segments.
    #[track_caller]
    pub fn assert_no_overlaps(&self) {
        for (id1, s1) in self.segments.iter() {
            for (id2, s2) in self.segments.iter() {
                if id1 == id2 {
                    continue;
                }
                for pos in s1.graph.node_positions() {
                    let shared = s1.graph.node(pos) & s2.graph.node(pos);
                    assert!(
                        shared == 0,
                        "segments {id1} and {id2} share edges {shared:#06b} at {pos}"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Replacement transaction
// ---------------------------------------------------------------------------

fn assign_human(
    humans: &mut HumanStore,
    cx: &mut HumanCx,
    segment_id: SegmentId,
    human_id: HumanId,
) {
    cx.segments.strict_mut(segment_id).assigned_human = Some(human_id);
    let human = humans.humans.strict_mut(human_id);
    human.segment_id = Some(segment_id);
    debug!("transporter {human_id} assigned to segment {segment_id}");
    human::on_current_segment_changed(human_id, human, cx);
}

/// Delete `to_delete`, add `to_add`, then hand segments to idle transporters.
///
/// Transporters of deleted segments are sent back towards the city hall and
/// are the first to be reassigned.
pub fn update_segments(
    humans: &mut HumanStore,
    cx: &mut HumanCx,
    to_add: Vec<GraphSegment>,
    to_delete: &[SegmentId],
) {
    debug!(
        "update_segments: {} live, {} to add, {} to delete",
        cx.segments.len(),
        to_add.len(),
        to_delete.len()
    );

    for &segment_id in to_delete {
        let assigned = cx.segments.strict_mut(segment_id).assigned_human.take();
        if let Some(human_id) = assigned {
            let human = humans.humans.strict_mut(human_id);
            human.segment_id = None;
            human::set_state(human_id, human, HumanStateKind::MovingInTheWorld, cx);
            assert_eq!(
                human.moving_in_the_world,
                human::MovingInTheWorldState::MovingToCityHall,
                "detached transporter {human_id} is not heading to a city hall"
            );
            humans.going_to_city_hall.push(human_id);
        }

        let linked = cx.segments.strict(segment_id).linked_resources.clone();
        for resource_id in linked {
            let targeted = cx.resources.get(resource_id).and_then(|r| r.targeted_human);
            // The queues must be scrubbed before the reset so the human sees
            // an empty segment and walks back to its center.
            cancel_resource_route(cx.resources, cx.segments, resource_id, true);
            if let Some(human_id) = targeted {
                if let Some(human) = humans.humans.get_mut(human_id) {
                    human::set_state(human_id, human, HumanStateKind::MovingInTheWorld, cx);
                }
            }
        }
    }

    // Unlinking happens after every detach so callbacks above still see the
    // doomed segments.
    for &segment_id in to_delete {
        cx.segments.unlink_and_remove(segment_id);
    }

    let added: Vec<SegmentId> = to_add
        .into_iter()
        .map(|segment| cx.segments.add_and_link(segment))
        .collect();

    while !cx.segments.wo_humans.is_empty() && !humans.going_to_city_hall.is_empty() {
        let (Some(segment_id), Some(human_id)) =
            (cx.segments.wo_humans.pop_front(), humans.going_to_city_hall.pop())
        else {
            break;
        };
        assign_human(humans, cx, segment_id, human_id);
    }

    let mut remaining = added.len();
    while remaining > 0 {
        let Some(human_id) = humans.going_to_city_hall.pop() else {
            break;
        };
        remaining -= 1;
        assign_human(humans, cx, added[remaining], human_id);
    }

    while remaining > 0 {
        remaining -= 1;
        cx.segments.wo_humans.push_back(added[remaining]);
    }
}
