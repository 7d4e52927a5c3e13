use std::collections::BTreeMap;

use serde::Serialize;

use crate::animation::Animation;

/// Identifies one element of a `GridView`'s layer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

/// The host's animation engine. The grid only ever attaches and detaches
/// descriptors; timing and frame delivery belong to the implementor.
pub trait AnimationScheduler {
    /// Attaches `animation` under `key`, replacing any previous one with that key.
    fn add(&mut self, layer: LayerId, key: &str, animation: &Animation);

    /// Cancels every animation on `layer`, looping ones included.
    fn remove_all(&mut self, layer: LayerId);
}

impl<S: AnimationScheduler + ?Sized> AnimationScheduler for &mut S {
    fn add(&mut self, layer: LayerId, key: &str, animation: &Animation) {
        (**self).add(layer, key, animation);
    }

    fn remove_all(&mut self, layer: LayerId) {
        (**self).remove_all(layer);
    }
}

/// Scheduler that keeps the attached descriptors in memory.
#[derive(Debug, Default, Serialize)]
pub struct ScheduleLog {
    active: BTreeMap<LayerId, BTreeMap<String, Animation>>,
    #[serde(skip)]
    added: usize,
    #[serde(skip)]
    cancelled: usize,
}

impl ScheduleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, layer: LayerId, key: &str) -> Option<&Animation> {
        self.active.get(&layer).and_then(|anims| anims.get(key))
    }

    pub fn active_count(&self) -> usize {
        self.active.values().map(BTreeMap::len).sum()
    }

    /// Layers that currently carry at least one animation.
    pub fn animated_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.active.keys().copied()
    }

    pub fn total_added(&self) -> usize {
        self.added
    }

    pub fn total_cancelled(&self) -> usize {
        self.cancelled
    }
}

impl AnimationScheduler for ScheduleLog {
    fn add(&mut self, layer: LayerId, key: &str, animation: &Animation) {
        self.added += 1;
        self.active
            .entry(layer)
            .or_default()
            .insert(key.to_string(), animation.clone());
    }

    fn remove_all(&mut self, layer: LayerId) {
        if let Some(removed) = self.active.remove(&layer) {
            self.cancelled += removed.len();
        }
    }
}
