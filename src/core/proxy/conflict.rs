// Winner-take-all resolution between two versioned state snapshots

use crate::core::proxy::types::epoch_millis;
use serde::{Deserialize, Serialize};

/// Timestamped snapshot owned by the instance that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncableState<T> {
    pub payload: T,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub instance_id: String,
    pub version: u32,
}

impl<T> SyncableState<T> {
    /// Snapshot stamped with the current time
    pub fn new(payload: T, instance_id: impl Into<String>, version: u32) -> Self {
        Self {
            payload,
            timestamp: epoch_millis(),
            instance_id: instance_id.into(),
            version,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetails {
    pub local_timestamp: u64,
    pub remote_timestamp: u64,
    pub local_instance: String,
    pub remote_instance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution<T> {
    pub winner: Winner,
    /// Verbatim copy of the winning snapshot
    pub resolved_state: SyncableState<T>,
    pub conflict_details: Option<ConflictDetails>,
}

impl<T> ConflictResolution<T> {
    /// Two different instances disagreed
    pub fn is_conflict(&self) -> bool {
        self.conflict_details.is_some()
    }
}

/// Stateless resolver; same inputs always give the same output
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Strictly newer timestamp wins; ties go to `remote`
    ///
    /// Details are reported only when the instance ids differ and the
    /// timestamps differ. Snapshots are never merged field by field.
    pub fn resolve<T: Clone>(
        &self,
        local: &SyncableState<T>,
        remote: &SyncableState<T>,
    ) -> ConflictResolution<T> {
        let (winner, resolved_state) = if local.timestamp > remote.timestamp {
            (Winner::Local, local.clone())
        } else {
            (Winner::Remote, remote.clone())
        };

        let conflict_details = if local.instance_id != remote.instance_id
            && local.timestamp != remote.timestamp
        {
            Some(ConflictDetails {
                local_timestamp: local.timestamp,
                remote_timestamp: remote.timestamp,
                local_instance: local.instance_id.clone(),
                remote_instance: remote.instance_id.clone(),
            })
        } else {
            None
        };

        ConflictResolution {
            winner,
            resolved_state,
            conflict_details,
        }
    }
}
