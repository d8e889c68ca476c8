//! File-backed append-only migration log.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use grantshift_application::MigrationStateStore;
use grantshift_core::{MigrationError, MigrationResult};
use grantshift_domain::{MigrationLog, MigrationRecord};

/// Migration log persisted as human-readable pretty-printed JSON.
///
/// A missing file is an empty log; a file that exists but cannot be parsed
/// is an error, never silently reset. Appends go through a temp file and
/// an atomic rename so a crash mid-write cannot corrupt the log.
pub struct JsonFileMigrationLog {
    path: PathBuf,
}

impl JsonFileMigrationLog {
    /// Creates a store over the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MigrationStateStore for JsonFileMigrationLog {
    async fn load_log(&self) -> MigrationResult<MigrationLog> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|error| {
                MigrationError::StatePersistence(format!(
                    "migration log at '{}' is unreadable: {error}",
                    self.path.display()
                ))
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(MigrationLog::default()),
            Err(error) => Err(MigrationError::StatePersistence(format!(
                "failed to read migration log at '{}': {error}",
                self.path.display()
            ))),
        }
    }

    async fn append_record(&self, record: MigrationRecord) -> MigrationResult<()> {
        let mut log = self.load_log().await?;
        let record_id = record.id;
        log.append(record)?;

        let serialized = serde_json::to_string_pretty(&log).map_err(|error| {
            MigrationError::StatePersistence(format!(
                "failed to serialize migration log: {error}"
            ))
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serialized.as_bytes())
            .await
            .map_err(|error| {
                MigrationError::StatePersistence(format!(
                    "failed to write migration log at '{}': {error}",
                    temp_path.display()
                ))
            })?;
        fs::rename(&temp_path, &self.path).await.map_err(|error| {
            MigrationError::StatePersistence(format!(
                "failed to replace migration log at '{}': {error}",
                self.path.display()
            ))
        })?;

        debug!(
            record_id,
            path = %self.path.display(),
            "migration record appended"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uuid::Uuid;

    use grantshift_application::MigrationStateStore;
    use grantshift_core::MigrationError;
    use grantshift_domain::{AffectedPrincipal, MigrationDirection, MigrationRecord};

    use super::JsonFileMigrationLog;

    fn temp_log_path() -> PathBuf {
        std::env::temp_dir().join(format!("grantshift-log-{}.json", Uuid::new_v4()))
    }

    fn record(id: u64) -> MigrationRecord {
        MigrationRecord {
            id,
            timestamp: chrono::Utc::now(),
            direction: MigrationDirection::Forward,
            from_role: "Too Many Perms".to_owned(),
            to_role: "Just Right Perms".to_owned(),
            affected_users: vec![AffectedPrincipal {
                user_id: "u-1".to_owned(),
                display_name: "Ada".to_owned(),
                user_principal_name: "ada@contoso.example".to_owned(),
            }],
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_log() {
        let store = JsonFileMigrationLog::new(temp_log_path());

        let result = store.load_log().await;

        assert!(matches!(result, Ok(log) if log.records.is_empty()));
    }

    #[tokio::test]
    async fn appended_records_survive_a_reload() {
        let path = temp_log_path();
        let store = JsonFileMigrationLog::new(path.clone());

        assert!(store.append_record(record(1)).await.is_ok());
        assert!(store.append_record(record(2)).await.is_ok());

        let reloaded = JsonFileMigrationLog::new(path.clone()).load_log().await;
        let Ok(log) = reloaded else {
            panic!("reload failed");
        };
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.next_id(), 3);
        assert_eq!(log.records[0].affected_users[0].user_id, "u-1");

        let _ = tokio::fs::remove_file(path).await;
    }

    #[tokio::test]
    async fn persisted_file_uses_wire_field_names() {
        let path = temp_log_path();
        let store = JsonFileMigrationLog::new(path.clone());

        assert!(store.append_record(record(1)).await.is_ok());

        let contents = tokio::fs::read_to_string(&path)
            .await
            .unwrap_or_default();
        assert!(contents.contains("\"affectedUsers\""));
        assert!(contents.contains("\"userPrincipalName\""));
        assert!(contents.contains("\"fromRole\""));

        let _ = tokio::fs::remove_file(path).await;
    }

    #[tokio::test]
    async fn corrupt_file_is_a_loud_error_not_a_reset() {
        let path = temp_log_path();
        let written = tokio::fs::write(&path, b"not json").await;
        assert!(written.is_ok());

        let store = JsonFileMigrationLog::new(path.clone());
        let result = store.load_log().await;

        assert!(matches!(result, Err(MigrationError::StatePersistence(_))));

        let _ = tokio::fs::remove_file(path).await;
    }

    #[tokio::test]
    async fn append_enforces_monotonic_ids_on_disk() {
        let path = temp_log_path();
        let store = JsonFileMigrationLog::new(path.clone());

        assert!(store.append_record(record(1)).await.is_ok());
        assert!(store.append_record(record(5)).await.is_err());

        let _ = tokio::fs::remove_file(path).await;
    }
}
