//! Resources lying on the map and the routing that books them for
//! construction sites.
//!
//! Every tick each [`ResourceToBook`] request runs a directional BFS outward
//! from its building. The first unbooked resource of the requested kind that
//! sits on a segment becomes the match; the BFS path from resource back to
//! building is then cut into per-segment legs ([`compute_legs`]). The
//! resource is queued on the first leg's segment and linked to all of them.

use bevy::log::debug_span;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buildings::BuildingStore;
use crate::config::{QUEUES_SCALE, ROUTING_HARD_ITERATION_LIMIT, ROUTING_SOFT_ITERATION_LIMIT};
use crate::grid::WorldGrid;
use crate::ids::{BookingId, BuildingId, HumanId, ResourceId, SegmentId, SlotMap, StrictLookup};
use crate::library::{BuildingLibrary, ResourceKindId};
use crate::scratch::ScratchArena;
use crate::segments::SegmentStore;
use crate::tile_pos::{Direction, TilePos, ALL_DIRECTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingKind {
    Construction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldResourceBooking {
    pub kind: BookingKind,
    pub building: BuildingId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldResource {
    pub kind: ResourceKindId,
    pub pos: TilePos,
    pub booking: Option<BookingId>,
    pub targeted_human: Option<HumanId>,
    pub carrying_human: Option<HumanId>,
    /// Legs of the booked route. `transportation_vertices[i]` is where the
    /// resource leaves `transportation_segments[i]`.
    pub transportation_segments: Vec<SegmentId>,
    pub transportation_vertices: Vec<TilePos>,
}

impl WorldResource {
    pub fn new(kind: ResourceKindId, pos: TilePos) -> Self {
        Self {
            kind,
            pos,
            booking: None,
            targeted_human: None,
            carrying_human: None,
            transportation_segments: Vec::new(),
            transportation_vertices: Vec::new(),
        }
    }

    pub fn clear_route(&mut self) {
        self.transportation_segments.clear();
        self.transportation_vertices.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceToBook {
    pub kind: ResourceKindId,
    pub count: u32,
    pub building: BuildingId,
}

#[derive(Debug, Default)]
pub struct ResourceStore {
    resources: SlotMap<ResourceId, WorldResource>,
    bookings: SlotMap<BookingId, WorldResourceBooking>,
    pub to_book: Vec<ResourceToBook>,
}

impl ResourceStore {
    pub fn add(&mut self, kind: ResourceKindId, pos: TilePos) -> ResourceId {
        self.resources.insert(WorldResource::new(kind, pos))
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<WorldResource> {
        self.resources.remove(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> Option<&WorldResource> {
        self.resources.get(id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut WorldResource> {
        self.resources.get_mut(id)
    }

    #[track_caller]
    pub fn strict(&self, id: ResourceId) -> &WorldResource {
        self.resources.strict(id)
    }

    #[track_caller]
    pub fn strict_mut(&mut self, id: ResourceId) -> &mut WorldResource {
        self.resources.strict_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &WorldResource)> + '_ {
        self.resources.iter()
    }

    pub fn at(&self, pos: TilePos) -> impl Iterator<Item = (ResourceId, &WorldResource)> + '_ {
        self.resources.iter().filter(move |(_, r)| r.pos == pos)
    }

    pub fn booking(&self, id: BookingId) -> Option<&WorldResourceBooking> {
        self.bookings.get(id)
    }

    #[track_caller]
    pub fn strict_booking(&self, id: BookingId) -> &WorldResourceBooking {
        self.bookings.strict(id)
    }

    pub fn remove_booking(&mut self, id: BookingId) -> Option<WorldResourceBooking> {
        self.bookings.remove(id)
    }

    pub fn bookings_len(&self) -> usize {
        self.bookings.len()
    }

    /// Ask for `count` more resources of `kind` for `building`, merging into
    /// an existing request.
    pub fn request(&mut self, kind: ResourceKindId, building: BuildingId, count: u32) {
        if count == 0 {
            return;
        }
        match self
            .to_book
            .iter_mut()
            .find(|r| r.kind == kind && r.building == building)
        {
            Some(existing) => existing.count += count,
            None => self.to_book.push(ResourceToBook { kind, count, building }),
        }
    }

    pub fn pending_for(&self, building: BuildingId) -> u32 {
        self.to_book
            .iter()
            .filter(|r| r.building == building)
            .map(|r| r.count)
            .sum()
    }

    /// Resources currently booked for `building`.
    pub fn booked_for(&self, building: BuildingId) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|(_, r)| {
                r.booking
                    .and_then(|b| self.bookings.get(b))
                    .is_some_and(|b| b.building == building)
            })
            .map(|(id, _)| id)
            .collect()
    }
}

/// Drop a resource's booking and legs and scrub it from every segment.
///
/// With `requeue` the building gets its request back, so a later tick can
/// find a new route.
pub fn cancel_resource_route(
    resources: &mut ResourceStore,
    segments: &mut SegmentStore,
    id: ResourceId,
    requeue: bool,
) {
    let Some(res) = resources.get_mut(id) else {
        return;
    };
    let booking = res.booking.take();
    let kind = res.kind;
    res.targeted_human = None;
    res.clear_route();

    for (_, segment) in segments.iter_mut() {
        segment.forget_resource(id);
    }

    if let Some(booking) = booking.and_then(|b| resources.remove_booking(b)) {
        debug!("route of {id} cancelled, requeue={requeue}");
        if requeue {
            resources.request(kind, booking.building, 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Split a resource-to-building path into `(segment, exit vertex)` legs.
///
/// A step `a -> b` belongs to every segment whose node at `a` has that
/// direction. `b` ends the leg only when it is one of the segment's vertices
/// and the path does not keep going through the same segment past it.
pub fn compute_legs(segments: &SegmentStore, path: &[TilePos]) -> Vec<(SegmentId, TilePos)> {
    let mut legs = Vec::new();
    for i in 0..path.len().saturating_sub(1) {
        let (a, b) = (path[i], path[i + 1]);
        let Some(dir) = a.direction_to(b) else {
            panic!("path jumps from {a} to {b}");
        };
        for (segment_id, segment) in segments.iter() {
            if !dir.is_set(segment.graph.node(a)) {
                continue;
            }
            if let Some(&c) = path.get(i + 2) {
                let passes_through = c
                    .direction_to(b)
                    .is_some_and(|back| back.is_set(segment.graph.node(c)));
                if passes_through {
                    continue;
                }
            }
            if segment.is_vertex(b) {
                legs.push((segment_id, b));
            }
        }
    }
    legs
}

/// Whether `legs` chain from the first tile of `path` to its last one with
/// every leg starting and ending inside its own segment.
fn legs_cover_path(
    segments: &SegmentStore,
    path: &[TilePos],
    legs: &[(SegmentId, TilePos)],
) -> bool {
    let (Some(&start), Some(&end)) = (path.first(), path.last()) else {
        return false;
    };
    let mut from = start;
    for &(segment_id, exit) in legs {
        let Some(segment) = segments.get(segment_id) else {
            return false;
        };
        if !segment.graph.has_node(from) || !segment.graph.has_node(exit) {
            return false;
        }
        from = exit;
    }
    from == end
}

/// Run every pending request once. Returns the number of resources booked.
pub fn book_resources(
    grid: &WorldGrid,
    segments: &mut SegmentStore,
    resources: &mut ResourceStore,
    buildings: &BuildingStore,
    library: &BuildingLibrary,
    scratch: &ScratchArena,
) -> usize {
    if resources.to_book.is_empty() {
        return 0;
    }
    let _span = debug_span!("book_resources", requests = resources.to_book.len()).entered();
    let _temp = scratch.temp_usage();

    let tiles_count = grid.tiles_count();
    let mut visited = scratch.lease_zeroed::<u8>(tiles_count);
    let mut parents = scratch.lease_zeroed::<Option<TilePos>>(tiles_count);
    let mut queue = scratch.lease_queue::<(Direction, TilePos)>(tiles_count * QUEUES_SCALE);

    let mut claimed: Vec<ResourceId> = Vec::new();
    let mut found: Vec<(usize, ResourceId, Vec<TilePos>)> = Vec::new();
    let mut warned = false;

    for (entry_index, entry) in resources.to_book.iter().enumerate() {
        let Some(building) = buildings.get(entry.building) else {
            warn!("resource request for dead building {}", entry.building);
            continue;
        };
        let destination = building.pos;

        visited.fill(0);
        parents.fill(None);
        queue.clear();

        for _ in 0..entry.count {
            for dir in Direction::ALL {
                queue.push_back((dir, destination));
            }
            visited[grid.index(destination)] = ALL_DIRECTIONS;

            let mut match_id = None;
            let mut iteration = 0;
            while match_id.is_none() {
                let Some((dir, pos)) = queue.pop_front() else {
                    break;
                };
                iteration += 1;
                assert!(
                    iteration < ROUTING_HARD_ITERATION_LIMIT,
                    "booking search for {} did not terminate",
                    entry.building
                );

                let new_pos = pos.step(dir);
                if !grid.in_bounds(new_pos) {
                    continue;
                }
                let (index, new_index) = (grid.index(pos), grid.index(new_pos));
                let back = dir.opposite();
                if back.is_set(visited[new_index]) {
                    continue;
                }
                back.mark(&mut visited[new_index]);
                dir.mark(&mut visited[index]);

                let tile = grid.element(pos);
                let new_tile = grid.element(new_pos);
                if tile.is_building() && new_tile.is_building() {
                    continue;
                }
                if tile.is_none() || new_tile.is_none() {
                    continue;
                }
                if new_tile.is_building() {
                    let enters_city_hall = new_tile
                        .building_id
                        .is_some_and(|b| buildings.is_city_hall(b, library));
                    if !enters_city_hall {
                        continue;
                    }
                }

                // Two vertices side by side have no road between them.
                let on_segment = segments
                    .segments_at(pos)
                    .any(|(_, s)| dir.is_set(s.graph.node(pos)));
                if !on_segment {
                    continue;
                }

                parents[new_index] = Some(pos);

                if segments.any_segment_at(new_pos) {
                    match_id = resources
                        .iter()
                        .find(|(id, r)| {
                            r.pos == new_pos
                                && r.kind == entry.kind
                                && r.booking.is_none()
                                && r.carrying_human.is_none()
                                && !claimed.contains(id)
                        })
                        .map(|(id, _)| id);
                }

                for next in Direction::ALL {
                    if next != back && !next.is_set(visited[new_index]) {
                        queue.push_back((next, new_pos));
                    }
                }
            }

            if iteration >= ROUTING_SOFT_ITERATION_LIMIT && !warned {
                warned = true;
                warn!("booking search for {} took {iteration} iterations", entry.building);
            }

            let Some(resource_id) = match_id else {
                break;
            };
            claimed.push(resource_id);

            let mut path = vec![resources.strict(resource_id).pos];
            let mut cursor = path[0];
            while let Some(parent) = parents[grid.index(cursor)] {
                assert!(path.len() <= tiles_count, "parent chain loops at {cursor}");
                path.push(parent);
                cursor = parent;
            }
            debug_assert_eq!(cursor, destination);
            found.push((entry_index, resource_id, path));
        }
    }

    let mut booked_per_entry = vec![0u32; resources.to_book.len()];
    for (entry_index, resource_id, path) in found {
        let legs = compute_legs(segments, &path);
        if legs.is_empty() || !legs_cover_path(segments, &path, &legs) {
            debug!("{resource_id} has no legs towards its building, leaving it unbooked");
            continue;
        }

        let building = resources.to_book[entry_index].building;
        let booking = resources.bookings.insert(WorldResourceBooking {
            kind: BookingKind::Construction,
            building,
        });

        let res = resources.resources.strict_mut(resource_id);
        debug_assert!(res.transportation_segments.is_empty());
        res.booking = Some(booking);
        res.transportation_segments = legs.iter().map(|(s, _)| *s).collect();
        res.transportation_vertices = legs.iter().map(|(_, v)| *v).collect();

        segments
            .strict_mut(legs[0].0)
            .resources_to_transport
            .push_back(resource_id);
        for &(segment_id, _) in &legs {
            let segment = segments.strict_mut(segment_id);
            if !segment.linked_resources.contains(&resource_id) {
                segment.linked_resources.push(resource_id);
            }
        }
        booked_per_entry[entry_index] += 1;
        debug!("{resource_id} booked for {building} over {} legs", legs.len());
    }

    let mut booked = 0;
    for (entry, count) in resources.to_book.iter_mut().zip(&booked_per_entry) {
        entry.count = entry.count.saturating_sub(*count);
        booked += *count as usize;
    }
    resources.to_book.retain(|r| r.count > 0);
    booked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::segment_builder::build_graph_segments;

    fn store_for(rows: &[&str]) -> SegmentStore {
        let layout = Layout::parse(rows).expect("valid layout");
        let mut store = SegmentStore::default();
        for segment in build_graph_segments(&layout.grid, &ScratchArena::default()) {
            store.add_and_link(segment);
        }
        store
    }

    fn segment_ending_at(store: &SegmentStore, a: TilePos, b: TilePos) -> SegmentId {
        store
            .iter()
            .find(|(_, s)| s.is_vertex(a) && s.is_vertex(b))
            .map(|(id, _)| id)
            .expect("segment between the two vertices")
    }

    #[test]
    fn test_legs_split_at_flag() {
        let store = store_for(&["CrFrB"]);
        let path: Vec<TilePos> = (1..=4).map(|x| TilePos::new(x, 0)).collect();
        let legs = compute_legs(&store, &path);
        let first = segment_ending_at(&store, TilePos::new(0, 0), TilePos::new(2, 0));
        let second = segment_ending_at(&store, TilePos::new(2, 0), TilePos::new(4, 0));
        assert_eq!(legs, vec![(first, TilePos::new(2, 0)), (second, TilePos::new(4, 0))]);
    }

    #[test]
    fn test_legs_single_segment() {
        let store = store_for(&["CrrB"]);
        let path = vec![TilePos::new(1, 0), TilePos::new(2, 0), TilePos::new(3, 0)];
        let legs = compute_legs(&store, &path);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].1, TilePos::new(3, 0));
    }

    #[test]
    fn test_legs_through_city_hall() {
        let store = store_for(&["BrCrB"]);
        let path: Vec<TilePos> = (0..=3).rev().map(|x| TilePos::new(x, 0)).collect();
        let legs = compute_legs(&store, &path);
        let hall = TilePos::new(2, 0);
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].1, hall, "first leg exits at the city hall");
        assert_eq!(legs[1].1, TilePos::new(0, 0));
        assert!(legs_cover_path(&store, &path, &legs));
    }

    #[test]
    fn test_hop_between_adjacent_flags_is_not_covered() {
        let store = store_for(&["CrFFrB"]);
        assert_eq!(store.len(), 2, "adjacent flags are not linked");
        let path: Vec<TilePos> = (1..=5).map(|x| TilePos::new(x, 0)).collect();
        let legs = compute_legs(&store, &path);
        assert_eq!(legs.len(), 2);
        assert!(!legs_cover_path(&store, &path, &legs), "no segment owns (2,0) -> (3,0)");

        let covered: Vec<TilePos> = (4..=5).map(|x| TilePos::new(x, 0)).collect();
        let legs = compute_legs(&store, &covered);
        assert!(legs_cover_path(&store, &covered, &legs));
    }

    #[test]
    fn test_request_merges() {
        let mut resources = ResourceStore::default();
        let mut ids: SlotMap<BuildingId, ()> = SlotMap::with_key();
        let building = ids.insert(());
        resources.request(ResourceKindId(0), building, 2);
        resources.request(ResourceKindId(0), building, 1);
        resources.request(ResourceKindId(1), building, 1);
        resources.request(ResourceKindId(1), building, 0);
        assert_eq!(resources.to_book.len(), 2);
        assert_eq!(resources.to_book[0].count, 3);
        assert_eq!(resources.pending_for(building), 4);
    }

    #[test]
    fn test_cancel_route_scrubs_segments_and_requeues() {
        let mut segments = store_for(&["CrFrB"]);
        let mut resources = ResourceStore::default();
        let mut ids: SlotMap<BuildingId, ()> = SlotMap::with_key();
        let building = ids.insert(());

        let id = resources.add(ResourceKindId(0), TilePos::new(1, 0));
        let booking = resources.bookings.insert(WorldResourceBooking {
            kind: BookingKind::Construction,
            building,
        });
        let segment_ids: Vec<SegmentId> = segments.ids().collect();
        {
            let res = resources.strict_mut(id);
            res.booking = Some(booking);
            res.transportation_segments = segment_ids.clone();
            res.transportation_vertices = vec![TilePos::new(2, 0), TilePos::new(4, 0)];
        }
        for &s in &segment_ids {
            let seg = segments.strict_mut(s);
            seg.resources_to_transport.push_back(id);
            seg.linked_resources.push(id);
        }

        cancel_resource_route(&mut resources, &mut segments, id, true);

        let res = resources.strict(id);
        assert!(res.booking.is_none());
        assert!(res.transportation_segments.is_empty());
        assert_eq!(resources.bookings_len(), 0);
        assert_eq!(resources.pending_for(building), 1, "request comes back");
        for (_, seg) in segments.iter() {
            assert!(seg.resources_to_transport.is_empty());
            assert!(seg.linked_resources.is_empty());
        }
    }
}
