//! Migration records and the append-only migration log.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantshift_core::{MigrationError, MigrationResult};
use serde::{Deserialize, Serialize};

/// Direction of a migration run.
///
/// Rollback is forward with swapped endpoints; no separate configuration
/// exists for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Move principals from the configured source grant to the target grant.
    Forward,
    /// Move principals from the target grant back to the source grant.
    Rollback,
}

impl MigrationDirection {
    /// Returns a stable storage value for this direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Rollback => "rollback",
        }
    }
}

impl FromStr for MigrationDirection {
    type Err = MigrationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "forward" => Ok(Self::Forward),
            "rollback" => Ok(Self::Rollback),
            _ => Err(MigrationError::Validation(format!(
                "unknown migration direction '{value}'"
            ))),
        }
    }
}

/// Identity captured for every principal a live run changed.
///
/// Carries enough to re-resolve the principal on rollback without
/// re-querying grant membership, which will already have changed by then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedPrincipal {
    /// Stable directory identifier.
    pub user_id: String,
    /// Human-readable name at migration time.
    pub display_name: String,
    /// External login key at migration time.
    pub user_principal_name: String,
}

/// Persisted outcome of one live migration run.
///
/// Records are created once, never mutated in place, and never garbage
/// collected automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Monotonic record identifier within the log.
    pub id: u64,
    /// Completion time of the run.
    pub timestamp: DateTime<Utc>,
    /// Direction the run executed in.
    pub direction: MigrationDirection,
    /// Display name of the grant principals were moved away from.
    pub from_role: String,
    /// Display name of the grant principals were moved onto.
    pub to_role: String,
    /// Principals actually changed by the run, in execution order.
    pub affected_users: Vec<AffectedPrincipal>,
}

/// Append-only sequence of migration records with monotonic identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationLog {
    /// Persisted records, oldest first.
    pub records: Vec<MigrationRecord>,
}

impl MigrationLog {
    /// Returns the identifier the next appended record must carry.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.records.last().map_or(1, |record| record.id + 1)
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&MigrationRecord> {
        self.records.last()
    }

    /// Returns the record with the given identifier, if present.
    #[must_use]
    pub fn find(&self, id: u64) -> Option<&MigrationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Appends a record, enforcing monotonic identifiers.
    pub fn append(&mut self, record: MigrationRecord) -> MigrationResult<()> {
        if record.id != self.next_id() {
            return Err(MigrationError::Validation(format!(
                "migration record id {} breaks the monotonic sequence (expected {})",
                record.id,
                self.next_id()
            )));
        }

        self.records.push(record);
        Ok(())
    }
}
