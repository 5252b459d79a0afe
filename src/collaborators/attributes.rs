//! Injected global attribute store, snapshotted at emission time.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::events::Attributes;

/// Thread-safe key/value map merged into every emitted record.
///
/// Cloning shares the underlying map; writers on any thread are visible to the
/// next record the worker emits.
#[derive(Debug, Clone, Default)]
pub struct GlobalAttributes {
    inner: Arc<RwLock<Attributes>>,
}

impl GlobalAttributes {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Copy of the current attributes.
    pub fn snapshot(&self) -> Attributes {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_is_detached() {
        let attrs = GlobalAttributes::new();
        attrs.set("tier", json!("gold"));
        let snap = attrs.snapshot();
        attrs.remove("tier");
        assert_eq!(snap["tier"], json!("gold"));
        assert!(attrs.snapshot().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let a = GlobalAttributes::new();
        let b = a.clone();
        b.set("k", json!(1));
        assert_eq!(a.snapshot()["k"], json!(1));
    }
}
