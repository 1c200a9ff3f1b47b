//! Typed entity ids backed by generation-checked slot maps.
//!
//! Every collection hands out its own key type, so a `SegmentId` can never be
//! used to look up a human. A removed slot bumps its version, which makes
//! stale keys resolve to `None` instead of aliasing whatever reused the slot.

use std::fmt;

use slotmap::{Key, KeyData};

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    pub struct HumanId;
    pub struct BuildingId;
    pub struct SegmentId;
    pub struct ResourceId;
    pub struct BookingId;
}

/// `(slot index, version)` of a key.
pub fn slot_of(data: KeyData) -> (u32, u32) {
    let ffi = data.as_ffi();
    ((ffi & 0xffff_ffff) as u32, (ffi >> 32) as u32)
}

macro_rules! display_key {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let (index, version) = slot_of(self.data());
                    write!(f, "{}#{}v{}", stringify!($name), index, version)
                }
            }
        )*
    };
}

display_key!(HumanId, BuildingId, SegmentId, ResourceId, BookingId);

/// Lookups that treat a dead key as an invariant violation.
pub trait StrictLookup<K: Key, V> {
    fn strict(&self, key: K) -> &V;
    fn strict_mut(&mut self, key: K) -> &mut V;
}

impl<K: Key, V> StrictLookup<K, V> for SlotMap<K, V> {
    #[track_caller]
    fn strict(&self, key: K) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("dead id {key:?} used in a strict lookup"),
        }
    }

    #[track_caller]
    fn strict_mut(&mut self, key: K) -> &mut V {
        match self.get_mut(key) {
            Some(v) => v,
            None => panic!("dead id {key:?} used in a strict lookup"),
        }
    }
}
