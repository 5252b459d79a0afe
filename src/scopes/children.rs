//! Arena of child scopes with deferred removal.
//!
//! Children are addressed by a stable [`ScopeId`]. A delegation pass iterates over a
//! snapshot of ids, so children inserted during the pass are not visited by it, and
//! destructed children are removed only after the pass is over.

use crate::events::RawEvent;
use crate::scopes::{Dispatch, Lifecycle, RumContext, Scope};

/// Stable identity of a child inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ScopeId(u64);

#[derive(Debug)]
pub(crate) struct ScopeArena<S> {
    next: u64,
    entries: Vec<(ScopeId, S)>,
}

impl<S> Default for ScopeArena<S> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }
}

impl<S: Scope> ScopeArena<S> {
    pub(crate) fn insert(&mut self, scope: S) -> ScopeId {
        let id = ScopeId(self.next);
        self.next += 1;
        self.entries.push((id, scope));
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &S> {
        self.entries.iter().map(|(_, s)| s)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.entries.iter_mut().map(|(_, s)| s)
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> Option<&mut S> {
        self.entries
            .iter_mut()
            .find(|(sid, _)| *sid == id)
            .map(|(_, s)| s)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.iter().filter(|s| s.is_active()).count()
    }

    /// Removes every child for which `keep` returns `false`.
    pub(crate) fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&S) -> bool,
    {
        self.entries.retain(|(_, s)| keep(s));
    }

    /// Delegates `event` to every child present when the pass starts, then prunes
    /// those that asked to be destructed and hands them back.
    pub(crate) fn delegate(
        &mut self,
        event: &RawEvent,
        parent: &RumContext,
        dispatch: Dispatch<'_>,
    ) -> Vec<S> {
        let snapshot: Vec<ScopeId> = self.entries.iter().map(|(id, _)| *id).collect();
        let mut destructed = Vec::new();

        for id in snapshot {
            if let Some(child) = self.get_mut(id) {
                if child.handle(event, parent, dispatch) == Lifecycle::Destruct {
                    destructed.push(id);
                }
            }
        }

        let mut removed = Vec::with_capacity(destructed.len());
        let mut i = 0;
        while i < self.entries.len() && !destructed.is_empty() {
            if destructed.contains(&self.entries[i].0) {
                removed.push(self.entries.remove(i).1);
            } else {
                i += 1;
            }
        }
        removed
    }
}
