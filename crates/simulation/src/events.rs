use bevy::prelude::*;

use crate::ids::{BuildingId, HumanId, ResourceId};
use crate::library::{BuildingKindId, ResourceKindId};
use crate::tile_pos::TilePos;

// =============================================================================
// Event Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemToBuild {
    Road,
    Flag,
    Building(BuildingKindId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanRemovalReason {
    TransporterReturnedToCityHall,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub enum ColonyEvent {
    ItemBuilt {
        pos: TilePos,
        item: ItemToBuild,
    },
    HumanCreated {
        human: HumanId,
        pos: TilePos,
    },
    HumanRemoved {
        human: HumanId,
        reason: HumanRemovalReason,
    },
    HumanStartedPickingUpResource {
        human: HumanId,
        resource: ResourceId,
    },
    HumanFinishedPickingUpResource {
        human: HumanId,
        resource: ResourceId,
    },
    HumanFinishedPlacingResource {
        human: HumanId,
        resource: ResourceId,
        pos: TilePos,
    },
    ResourceDelivered {
        building: BuildingId,
        kind: ResourceKindId,
    },
    BuildingConstructed {
        building: BuildingId,
        pos: TilePos,
    },
}

// =============================================================================
// Observers
// =============================================================================

pub type ObserverFn = Box<dyn FnMut(&ColonyEvent) + Send + Sync>;

/// Synchronous fan-out of colony events.
///
/// Callbacks run inline, inside the call that caused the event. Every event
/// is also kept in a bounded journal so the bevy side can forward it after
/// the tick.
pub struct Observers {
    callbacks: Vec<ObserverFn>,
    journal: Vec<ColonyEvent>,
    max_journal: usize,
    /// Events pushed out of a full journal before anyone drained them.
    dropped: usize,
}

impl Default for Observers {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
            journal: Vec::new(),
            max_journal: 4096,
            dropped: 0,
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("callbacks", &self.callbacks.len())
            .field("journal", &self.journal.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Observers {
    pub fn subscribe(&mut self, callback: impl FnMut(&ColonyEvent) + Send + Sync + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn emit(&mut self, event: ColonyEvent) {
        for callback in &mut self.callbacks {
            callback(&event);
        }
        self.journal.push(event);
        if self.journal.len() > self.max_journal {
            let excess = self.journal.len() - self.max_journal;
            if self.dropped == 0 {
                warn!(
                    "event journal is full at {} entries, dropping the oldest events",
                    self.max_journal
                );
            }
            self.dropped += excess;
            self.journal.drain(0..excess);
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn journal(&self) -> &[ColonyEvent] {
        &self.journal
    }

    /// Take every journaled event, oldest first.
    pub fn drain_journal(&mut self) -> Vec<ColonyEvent> {
        std::mem::take(&mut self.journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callbacks_run_inline_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::default();
        for tag in 0..2 {
            let seen = Arc::clone(&seen);
            observers.subscribe(move |e| {
                if let ColonyEvent::ItemBuilt { pos, .. } = e {
                    seen.lock().unwrap().push((tag, pos.x));
                }
            });
        }
        observers.emit(ColonyEvent::ItemBuilt {
            pos: TilePos::new(3, 0),
            item: ItemToBuild::Road,
        });
        assert_eq!(*seen.lock().unwrap(), vec![(0, 3), (1, 3)]);
    }

    #[test]
    fn test_journal_is_bounded_and_drains() {
        let mut observers = Observers {
            max_journal: 3,
            ..Default::default()
        };
        for x in 0..5 {
            observers.emit(ColonyEvent::ItemBuilt {
                pos: TilePos::new(x, 0),
                item: ItemToBuild::Flag,
            });
        }
        assert_eq!(observers.dropped(), 2);
        let drained = observers.drain_journal();
        assert_eq!(drained.len(), 3, "only the newest events are kept");
        assert_eq!(
            drained[0],
            ColonyEvent::ItemBuilt {
                pos: TilePos::new(2, 0),
                item: ItemToBuild::Flag
            }
        );
        assert!(observers.journal().is_empty());
    }

    #[test]
    fn test_journal_under_the_cap_drops_nothing() {
        let mut observers = Observers {
            max_journal: 3,
            ..Default::default()
        };
        for x in 0..3 {
            observers.emit(ColonyEvent::ItemBuilt {
                pos: TilePos::new(x, 0),
                item: ItemToBuild::Road,
            });
        }
        assert_eq!(observers.dropped(), 0);
        observers.drain_journal();
        observers.emit(ColonyEvent::ItemBuilt {
            pos: TilePos::new(9, 0),
            item: ItemToBuild::Road,
        });
        assert_eq!(observers.journal().len(), 1);
        assert_eq!(observers.dropped(), 0, "draining makes room again");
    }
}
