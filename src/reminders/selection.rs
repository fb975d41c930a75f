use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

/// Batch-mode selection: a flag plus the reminder ids picked so far, in the
/// order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    batch_mode: bool,
    ids: Vec<Uuid>,
}

impl Selection {
    pub fn batch_mode(&self) -> bool {
        self.batch_mode
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    /// Leaving batch mode drops the selection.
    pub fn set_batch_mode(&mut self, enabled: bool) {
        self.batch_mode = enabled;
        if !enabled {
            self.ids.clear();
        }
    }

    /// Selecting an id enters batch mode. Returns false if already selected.
    pub fn add(&mut self, id: Uuid) -> bool {
        self.batch_mode = true;
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.ids.len();
        self.ids.retain(|selected| *selected != id);
        self.ids.len() != before
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Hands the ids to a batch action and resets the selection, batch mode
    /// included.
    pub fn take(&mut self) -> Vec<Uuid> {
        self.batch_mode = false;
        std::mem::take(&mut self.ids)
    }

    /// Drops ids that are no longer in the active set. Returns how many went.
    pub fn retain_active(&mut self, active: &HashSet<Uuid>) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| active.contains(id));
        before - self.ids.len()
    }
}
