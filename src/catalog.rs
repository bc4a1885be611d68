//! Misconception catalog: id -> description, loaded once from the mapping CSV.
//!
//! Expected columns: `MisconceptionId`, `MisconceptionName`. The catalog is
//! read-only after construction and shared across sessions behind an `Arc`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::TutorError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MisconceptionRecord {
  pub id: i64,
  pub description: String,
}

#[derive(Deserialize)]
struct MisconceptionRow {
  #[serde(rename = "MisconceptionId")]
  id: i64,
  #[serde(rename = "MisconceptionName")]
  name: String,
}

#[derive(Clone, Debug, Default)]
pub struct MisconceptionCatalog {
  records: HashMap<i64, MisconceptionRecord>,
}

impl MisconceptionCatalog {
  /// Load from a CSV file. Any IO/format problem is `DataUnavailable`.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, TutorError> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| TutorError::data_unavailable(&label, e))?;
    let catalog = Self::from_reader(file, &label)?;
    info!(target: "tutor", path = %label, misconceptions = catalog.len(), "Loaded misconception catalog");
    Ok(catalog)
  }

  /// Load from any CSV reader; `label` names the source in errors.
  pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self, TutorError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = HashMap::new();
    for row in rdr.deserialize::<MisconceptionRow>() {
      let row = row.map_err(|e| TutorError::data_unavailable(label, e))?;
      if row.name.is_empty() {
        warn!(target: "tutor", id = row.id, "Skipping misconception with empty description");
        continue;
      }
      if records.contains_key(&row.id) {
        return Err(TutorError::data_unavailable(label, format!("duplicate MisconceptionId {}", row.id)));
      }
      records.insert(row.id, MisconceptionRecord { id: row.id, description: row.name });
    }
    Ok(Self { records })
  }

  #[cfg(test)]
  pub fn from_records(records: impl IntoIterator<Item = MisconceptionRecord>) -> Self {
    Self { records: records.into_iter().map(|r| (r.id, r)).collect() }
  }

  /// Description for `id`. `None` covers both an absent id and an unknown one.
  pub fn lookup(&self, id: Option<i64>) -> Option<&str> {
    let id = id?;
    self.records.get(&id).map(|r| r.description.as_str())
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  const SAMPLE: &str = "MisconceptionId,MisconceptionName\n\
    0,Does not know that angles in a triangle sum to 180 degrees\n\
    7,Confuses area and perimeter\n\
    12,\"Thinks that when you multiply, the answer always gets bigger\"\n";

  #[test]
  fn lookup_known_and_unknown_ids() {
    let cat = MisconceptionCatalog::from_reader(SAMPLE.as_bytes(), "sample").unwrap();
    assert_eq!(cat.len(), 3);
    assert_eq!(cat.lookup(Some(7)), Some("Confuses area and perimeter"));
    assert_eq!(
      cat.lookup(Some(12)),
      Some("Thinks that when you multiply, the answer always gets bigger")
    );
    assert_eq!(cat.lookup(Some(999)), None);
    assert_eq!(cat.lookup(None), None);
    assert_eq!(cat.lookup(Some(-1)), None);
  }

  #[test]
  fn duplicate_ids_are_rejected() {
    let csv = "MisconceptionId,MisconceptionName\n1,a\n1,b\n";
    let err = MisconceptionCatalog::from_reader(csv.as_bytes(), "dup").unwrap_err();
    assert!(matches!(err, TutorError::DataUnavailable { .. }));
  }

  #[test]
  fn malformed_rows_are_data_unavailable() {
    let csv = "MisconceptionId,MisconceptionName\nseven,Confuses area and perimeter\n";
    let err = MisconceptionCatalog::from_reader(csv.as_bytes(), "bad").unwrap_err();
    assert!(matches!(err, TutorError::DataUnavailable { .. }));
  }

  #[test]
  fn missing_file_is_data_unavailable() {
    let err = MisconceptionCatalog::from_csv_path("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, TutorError::DataUnavailable { .. }));
  }

  #[test]
  fn loads_from_disk() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(SAMPLE.as_bytes()).unwrap();
    let cat = MisconceptionCatalog::from_csv_path(f.path()).unwrap();
    assert_eq!(cat.lookup(Some(0)), Some("Does not know that angles in a triangle sum to 180 degrees"));
  }
}
