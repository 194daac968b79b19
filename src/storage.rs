use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::domain::Ledger;

/// Fixed namespace the whole ledger blob is keyed by. On disk this is the
/// default file name; the payload is a single JSON object.
pub const STORAGE_NAMESPACE: &str = "trackApp";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::JsonDecode(err) => write!(f, "failed to parse ledger blob: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode ledger blob: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Loads the ledger blob. A missing or empty file yields a default-empty
/// ledger; a partially shaped blob deserializes through field defaults and is
/// then repaired back to a consistent state. Only a payload that is not JSON
/// at all is an error.
pub fn load_store(path: &Path, now: DateTime<Local>) -> Result<Ledger, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Ledger::new(now)),
        Err(err) => return Err(StorageError::Io(err)),
    };

    if raw.trim().is_empty() {
        return Ok(Ledger::new(now));
    }

    let mut ledger: Ledger = serde_json::from_str(&raw).map_err(StorageError::JsonDecode)?;
    ledger.repair(now);
    Ok(ledger)
}

pub fn save_store(path: &Path, ledger: &Ledger) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let blob = serde_json::to_string_pretty(ledger).map_err(StorageError::JsonEncode)?;
    fs::write(path, blob).map_err(StorageError::Io)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::{Local, TimeZone};

    use crate::domain::Ledger;

    use super::{load_store, save_store};

    fn now() -> chrono::DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
            .single()
            .expect("local time should exist")
    }

    #[test]
    fn round_trips_the_whole_ledger() {
        let mut ledger = Ledger::new(now());
        ledger
            .create_project("Work", now())
            .expect("project should be created");
        ledger
            .start_tracking(now())
            .expect("start should work");
        ledger.stop_tracking(now() + chrono::Duration::minutes(30));

        let path = temp_file("trackapp_storage_roundtrip.json");
        save_store(&path, &ledger).expect("save should succeed");
        let loaded = load_store(&path, now()).expect("load should succeed");

        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.projects[0].name, "Work");
        assert_eq!(loaded.projects[0].total_seconds, 1800);
        assert_eq!(loaded.current_project_id, ledger.current_project_id);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_yields_an_empty_ledger() {
        let path = temp_file("trackapp_storage_missing.json");
        let _ = fs::remove_file(&path);

        let ledger = load_store(&path, now()).expect("load should succeed");
        assert!(ledger.projects.is_empty());
        assert_eq!(ledger.selected_date, now().date_naive());
    }

    #[test]
    fn partially_shaped_blob_is_repaired() {
        let path = temp_file("trackapp_storage_partial.json");
        fs::write(
            &path,
            r#"{"projects":[{"id":1,"name":"Work","total_seconds":0,"sessions":[]}],"is_tracking":true}"#,
        )
        .expect("write should succeed");

        let ledger = load_store(&path, now()).expect("load should succeed");
        assert_eq!(ledger.current_project_id, Some(1));
        assert!(!ledger.is_tracking);
        assert_eq!(ledger.selected_date, now().date_naive());
        assert_eq!(ledger.selected_year, 2026);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn garbage_blob_is_an_error_not_data_loss() {
        let path = temp_file("trackapp_storage_garbage.json");
        fs::write(&path, "not json at all").expect("write should succeed");

        assert!(load_store(&path, now()).is_err());
        let _ = fs::remove_file(path);
    }

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
