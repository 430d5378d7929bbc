use crate::error::{Result, TilerError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column holding the scene id a classification row belongs to.
pub const SCENE_COLUMN: &str = "scene";

/// One row of the classification-tags table. All columns are carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRecord {
    tags: BTreeMap<String, String>,
}

impl ClassificationRecord {
    pub fn new(tags: BTreeMap<String, String>) -> Result<Self> {
        if !tags.contains_key(SCENE_COLUMN) {
            return Err(TilerError::MissingColumn(SCENE_COLUMN.to_string()));
        }
        Ok(Self { tags })
    }

    pub fn scene(&self) -> &str {
        self.tags.get(SCENE_COLUMN).map(String::as_str).unwrap_or_default()
    }

    /// Product id recorded for the scene; the table keys products by scene.
    pub fn product_id(&self) -> &str {
        self.scene()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Read-only classification table, loaded once and shared by every scene.
#[derive(Debug, Clone, Default)]
pub struct ClassificationTable {
    records: Vec<ClassificationRecord>,
}

impl ClassificationTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Loading classification tags: {}", path.display());
        let table = Self::from_reader(File::open(path)?)?;
        info!("Loaded {} classification records", table.len());
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        if !rdr.headers()?.iter().any(|h| h == SCENE_COLUMN) {
            return Err(TilerError::MissingColumn(SCENE_COLUMN.to_string()));
        }

        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let tags: BTreeMap<String, String> = result?;
            records.push(ClassificationRecord::new(tags)?);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record whose scene column equals `scene_id`.
    pub fn record_for(&self, scene_id: &str) -> Result<&ClassificationRecord> {
        let record = self
            .records
            .iter()
            .find(|r| r.scene() == scene_id)
            .ok_or_else(|| TilerError::DataIntegrity(scene_id.to_string()))?;
        debug!("Classification record for {}: {} tags", scene_id, record.tags.len());
        Ok(record)
    }
}
