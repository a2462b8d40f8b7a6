// Named recordings, kept between runs.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pipeline::recorder::TriggerEvent;

pub const RIDDIM_DIR: &str = ".riddim";
const RECORDINGS_FILE: &str = "recordings.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub events: Vec<TriggerEvent>,
    pub date: String, // RFC 3339, UTC
    pub tempo: f64,
}

impl RecordingRecord {
    pub fn new(events: Vec<TriggerEvent>, tempo: f64) -> Self {
        Self { events, date: rfc3339_utc(SystemTime::now()), tempo }
    }
}

/// Where named recordings live. Saving under an existing name replaces it.
pub trait RecordingStore {
    fn save(&self, name: &str, record: &RecordingRecord) -> Result<()>;
    fn load(&self, name: &str) -> Result<Option<RecordingRecord>>;
    fn names(&self) -> Result<Vec<String>>;
}

type RecordingMap = BTreeMap<String, RecordingRecord>;

/// Every recording in one JSON object at `<project_dir>/.riddim/recordings.json`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn for_project(project_dir: &Path) -> Self {
        Self { path: project_dir.join(RIDDIM_DIR).join(RECORDINGS_FILE) }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<RecordingMap> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordingMap::new()),
            Err(e) => return Err(persistence(&self.path, e)),
        };
        serde_json::from_str(&data).map_err(|e| persistence(&self.path, e))
    }

    fn write_all(&self, map: &RecordingMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persistence(parent, e))?; // create .riddim/ if needed
        }
        let json = serde_json::to_string_pretty(map).map_err(|e| persistence(&self.path, e))?;
        std::fs::write(&self.path, json).map_err(|e| persistence(&self.path, e))
    }
}

fn persistence(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("{}: {e}", path.display()))
}

impl RecordingStore for JsonFileStore {
    fn save(&self, name: &str, record: &RecordingRecord) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(name.to_string(), record.clone());
        self.write_all(&all)?;
        info!(name, events = record.events.len(), path = %self.path.display(), "recording saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<RecordingRecord>> {
        let record = self.read_all()?.remove(name);
        debug!(name, found = record.is_some(), "recording lookup");
        Ok(record)
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

// in-process store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<RecordingMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordingStore for MemoryStore {
    fn save(&self, name: &str, record: &RecordingRecord) -> Result<()> {
        self.records.borrow_mut().insert(name.to_string(), record.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<RecordingRecord>> {
        Ok(self.records.borrow().get(name).cloned())
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.records.borrow().keys().cloned().collect())
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn rfc3339_utc(t: SystemTime) -> String {
    let since = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since.as_secs();
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}.{:03}Z",
        rem / 3600,
        (rem / 60) % 60,
        rem % 60,
        since.subsec_millis()
    )
}

// days since 1970-01-01 -> (year, month, day), proleptic Gregorian
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}
