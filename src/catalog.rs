//! JSON-lines catalog loader.
//!
//! One object per line:
//!
//! ```text
//! {"item_id": "tt0114709", "vector": [0.12, -0.4, ...], "title": "Toy Story", "image_url": "https://..."}
//! ```
//!
//! `title` and `image_url` are optional display metadata; only `item_id` and
//! `vector` feed the index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ForestError, Result};
use crate::vector::Vector;

/// Display metadata for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub title: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    item_id: String,
    vector: Vec<f32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Items parsed from a catalog file, in file order.
#[derive(Debug, Default)]
pub struct Catalog {
    pub vectors: Vec<(String, Vector)>,
    pub info: HashMap<String, ItemInfo>,
}

impl Catalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: BufReader<R>) -> Result<Self> {
        let mut catalog = Catalog::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: CatalogRecord =
                serde_json::from_str(trimmed).map_err(|e| ForestError::Catalog {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            catalog.info.insert(
                record.item_id.clone(),
                ItemInfo {
                    title: record.title,
                    image_url: record.image_url,
                },
            );
            catalog
                .vectors
                .push((record.item_id, Vector::new(record.vector)));
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Split into build input and display metadata.
    pub fn into_parts(self) -> (Vec<(String, Vector)>, HashMap<String, ItemInfo>) {
        (self.vectors, self.info)
    }
}
