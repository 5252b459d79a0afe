//! # Writer: the single emission path of the scope tree.
//!
//! ```text
//! scope ──► Writer::submit(record, storage_event)
//!              │
//!              ├─ muted ────────────────► Feedback::confirm(*Dropped)
//!              ├─ Storage::write Ok ────► Feedback::confirm(*Sent)
//!              └─ Storage::write Err ───► Feedback::confirm(*Dropped)
//! ```
//!
//! ## Rules
//! - The write is synchronous: the record reflects the context captured at emission.
//! - Confirmations are pushed back into the event stream, never handled inline.
//! - A muted writer (session not tracked) never reaches storage, but still confirms
//!   as dropped so pending counters drain.

use crate::error::WriteError;
use crate::events::{EventTime, RawEvent, StorageEvent};
use crate::storage::{RumRecord, SdkContext};

/// Storage collaborator: supplies the SDK context and persists records.
///
/// Implementations must be thread-safe; the core calls them only from its worker.
pub trait Storage: Send + Sync {
    /// Current immutable SDK context.
    fn sdk_context(&self) -> SdkContext;

    /// Persists one record.
    fn write(&self, record: &RumRecord) -> Result<(), WriteError>;
}

/// Channel back into the event stream for write confirmations.
pub trait Feedback: Send + Sync {
    /// Enqueues a `*Sent` / `*Dropped` event.
    fn confirm(&self, event: RawEvent);
}

/// Borrowed handle scopes use to emit records.
#[derive(Clone, Copy)]
pub struct Writer<'a> {
    storage: &'a dyn Storage,
    feedback: &'a dyn Feedback,
    muted: bool,
}

impl<'a> Writer<'a> {
    /// Creates an unmuted writer.
    pub fn new(storage: &'a dyn Storage, feedback: &'a dyn Feedback) -> Self {
        Self {
            storage,
            feedback,
            muted: false,
        }
    }

    /// Returns a copy that swallows records when `muted` is `true`.
    #[must_use]
    pub fn muted(self, muted: bool) -> Self {
        Self { muted, ..self }
    }

    /// Returns `true` when records are swallowed.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Current SDK context from storage.
    pub fn sdk_context(&self) -> SdkContext {
        self.storage.sdk_context()
    }

    /// Writes `record` and reports the outcome for `confirmation`, timestamped with `time`.
    ///
    /// Returns `true` when storage accepted the record.
    pub fn submit(
        &self,
        record: RumRecord,
        confirmation: Option<StorageEvent>,
        time: EventTime,
    ) -> bool {
        if self.muted {
            tracing::trace!(kind = record.as_label(), "record swallowed for untracked session");
            if let Some(ev) = confirmation {
                self.feedback.confirm(ev.dropped(time));
            }
            return false;
        }

        match self.storage.write(&record) {
            Ok(()) => {
                if let Some(ev) = confirmation {
                    self.feedback.confirm(ev.sent(time));
                }
                true
            }
            Err(err) => {
                tracing::debug!(
                    kind = record.as_label(),
                    error = err.as_label(),
                    "record write failed"
                );
                if let Some(ev) = confirmation {
                    self.feedback.confirm(ev.dropped(time));
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Attributes;
    use crate::scopes::RumContext;
    use crate::storage::{LongTaskRecord, RecordHeader};
    use crate::testing::{QueuedFeedback, RecordingStorage};
    use uuid::Uuid;

    fn long_task() -> RumRecord {
        RumRecord::LongTask(LongTaskRecord {
            header: RecordHeader::new(
                &RumContext::default(),
                SdkContext::default(),
                EventTime::new(0, 0),
                100.0,
                false,
                Attributes::new(),
            ),
            id: Uuid::new_v4(),
            duration_nanos: 1,
            is_frozen_frame: false,
            target: String::new(),
        })
    }

    #[test]
    fn test_success_confirms_sent() {
        let storage = RecordingStorage::default();
        let feedback = QueuedFeedback::default();
        let view_id = Uuid::new_v4();
        let t = EventTime::new(5, 5);

        let ok = Writer::new(&storage, &feedback).submit(
            long_task(),
            Some(StorageEvent::Error { view_id }),
            t,
        );

        assert!(ok);
        assert_eq!(storage.len(), 1);
        assert_eq!(feedback.take(), vec![RawEvent::ErrorSent { view_id, time: t }]);
    }

    #[test]
    fn test_failure_confirms_dropped() {
        let storage = RecordingStorage::failing();
        let feedback = QueuedFeedback::default();
        let view_id = Uuid::new_v4();
        let t = EventTime::new(5, 5);

        let ok = Writer::new(&storage, &feedback).submit(
            long_task(),
            Some(StorageEvent::Resource { view_id }),
            t,
        );

        assert!(!ok);
        assert_eq!(
            feedback.take(),
            vec![RawEvent::ResourceDropped { view_id, time: t }]
        );
    }

    #[test]
    fn test_muted_never_reaches_storage() {
        let storage = RecordingStorage::default();
        let feedback = QueuedFeedback::default();
        let writer = Writer::new(&storage, &feedback).muted(true);
        let view_id = Uuid::new_v4();

        writer.submit(long_task(), None, EventTime::new(0, 0));
        writer.submit(
            long_task(),
            Some(StorageEvent::LongTask {
                view_id,
                is_frozen_frame: true,
            }),
            EventTime::new(0, 0),
        );

        assert!(writer.is_muted());
        assert_eq!(storage.len(), 0);
        assert_eq!(
            feedback.take(),
            vec![RawEvent::LongTaskDropped {
                view_id,
                is_frozen_frame: true,
                time: EventTime::new(0, 0)
            }]
        );
    }
}
