//! Tag manifest (label table) loading.
//!
//! A tagging model's output vector is aligned with a fixed label table read
//! once from a CSV manifest:
//!
//! | column        | required | meaning                                         |
//! |---------------|----------|-------------------------------------------------|
//! | `name`        | yes      | display label                                   |
//! | `category`    | no       | label category, 0 when missing                  |
//! | `original_en` | no       | canonical label; empty or missing means `name`  |
//!
//! Extra columns (for example `tag_id` or `count`) are ignored.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TagCandidate;
use crate::error::MangalabelError;

#[derive(Debug, Deserialize)]
struct ManifestRow {
    name: String,
    #[serde(default)]
    category: Option<u32>,
    #[serde(default)]
    original_en: Option<String>,
}

/// One entry of a label table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label: String,
    pub origin_label: String,
    pub category: u32,
}

impl From<ManifestRow> for LabelEntry {
    fn from(row: ManifestRow) -> Self {
        let origin_label = match row.original_en {
            Some(origin) if !origin.trim().is_empty() => origin,
            _ => row.name.clone(),
        };
        Self {
            label: row.name,
            origin_label,
            category: row.category.unwrap_or(0),
        }
    }
}

/// The label table a tagging model's probabilities are aligned with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    pub fn new(entries: Vec<LabelEntry>) -> Self {
        Self { entries }
    }

    /// Reads a label table from a CSV manifest file.
    ///
    /// # Example
    /// ```no_run
    /// use std::path::Path;
    /// use mangalabel::tagging::LabelTable;
    ///
    /// let table = LabelTable::from_path(Path::new("selected_tags.csv"))?;
    /// println!("{} labels", table.len());
    /// # Ok::<(), mangalabel::MangalabelError>(())
    /// ```
    pub fn from_path(path: &Path) -> Result<Self, MangalabelError> {
        let file = File::open(path).map_err(|source| MangalabelError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parses a label table from CSV text; `origin` is only used in errors.
    pub fn from_csv_str(csv_text: &str, origin: &Path) -> Result<Self, MangalabelError> {
        Self::from_reader(csv_text.as_bytes(), origin)
    }

    fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, MangalabelError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();

        for result in csv_reader.deserialize() {
            let row: ManifestRow = result.map_err(|source| MangalabelError::TagManifestParse {
                path: origin.to_path_buf(),
                source,
            })?;
            if row.name.is_empty() {
                return Err(MangalabelError::TagManifestInvalid {
                    path: origin.to_path_buf(),
                    message: format!("row {} has an empty name", entries.len() + 1),
                });
            }
            entries.push(LabelEntry::from(row));
        }

        if entries.is_empty() {
            return Err(MangalabelError::TagManifestInvalid {
                path: origin.to_path_buf(),
                message: "manifest contains no labels".to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    /// Pairs a probability vector with the table.
    ///
    /// The vector must have exactly one value per entry.
    pub fn candidates(&self, probabilities: &[f32]) -> Result<Vec<TagCandidate>, MangalabelError> {
        if probabilities.len() != self.entries.len() {
            return Err(MangalabelError::ProbabilityMismatch {
                expected: self.entries.len(),
                actual: probabilities.len(),
            });
        }

        Ok(self
            .entries
            .iter()
            .zip(probabilities)
            .map(|(entry, &confidence)| TagCandidate {
                label: entry.label.clone(),
                origin_label: entry.origin_label.clone(),
                category: entry.category,
                confidence,
            })
            .collect())
    }

    /// Entries whose display or canonical label contains `keyword`,
    /// ignoring case. Results keep table order.
    pub fn search(&self, keyword: &str) -> Vec<&LabelEntry> {
        let needle = keyword.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                entry.label.to_lowercase().contains(&needle)
                    || entry.origin_label.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn inline_origin() -> PathBuf {
        PathBuf::from("<inline>")
    }

    const MANIFEST: &str = "\
tag_id,name,category,count,original_en
1,general,9,100,
2,1girl,0,90,
3,笑顔,0,80,smile
4,hatsune_miku,4,70,
";

    fn table() -> LabelTable {
        LabelTable::from_csv_str(MANIFEST, &inline_origin()).unwrap()
    }

    #[test]
    fn test_reads_entries_and_falls_back_to_name() {
        let table = table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.entries()[0].origin_label, "general");
        assert_eq!(table.entries()[0].category, 9);
        assert_eq!(table.entries()[2].label, "笑顔");
        assert_eq!(table.entries()[2].origin_label, "smile");
    }

    #[test]
    fn test_category_defaults_to_zero() {
        let table = LabelTable::from_csv_str("name\nsmile\nblush\n", &inline_origin()).unwrap();
        assert!(table.entries().iter().all(|e| e.category == 0));
    }

    #[test]
    fn test_candidates_align_with_entries() {
        let candidates = table().candidates(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(candidates[2].label, "笑顔");
        assert_eq!(candidates[2].origin_label, "smile");
        assert_eq!(candidates[2].confidence, 0.3);
    }

    #[test]
    fn test_candidates_reject_length_mismatch() {
        let err = table().candidates(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(
            err,
            MangalabelError::ProbabilityMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_search_matches_either_label() {
        let table = table();
        let hits: Vec<_> = table.search("SMI").iter().map(|e| e.label.as_str()).collect();
        assert_eq!(hits, vec!["笑顔"]);
        assert_eq!(table.search("girl").len(), 1);
        assert!(table.search("sword").is_empty());
    }

    #[test]
    fn test_empty_manifest_is_invalid() {
        let err = LabelTable::from_csv_str("name,category\n", &inline_origin()).unwrap_err();
        assert!(matches!(err, MangalabelError::TagManifestInvalid { .. }));
    }

    #[test]
    fn test_bad_category_is_parse_error() {
        let err = LabelTable::from_csv_str("name,category\nsmile,abc\n", &inline_origin())
            .unwrap_err();
        assert!(matches!(err, MangalabelError::TagManifestParse { .. }));
    }
}
