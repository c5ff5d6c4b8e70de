//! Platform taxonomy: platforms, their framework guides, and doc URL tables.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use pocsync_shared::{PocsyncError, Result};

/// Taxonomy shipped with the crate.
const BUILTIN_TAXONOMY: &str = include_str!("../data/platforms.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    /// Platforms in display order.
    pub platforms: Vec<Platform>,
    /// Section key → path relative to a platform's base URL.
    #[serde(default)]
    pub doc_sections: HashMap<String, String>,
    /// Product doc key → absolute URL.
    #[serde(default)]
    pub product_docs: HashMap<String, String>,
    #[serde(default)]
    pub integration_docs: HashMap<String, IntegrationDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    pub key: String,
    pub display_name: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub base_url: String,
    #[serde(default)]
    pub guides: Vec<Guide>,
}

fn default_category() -> String {
    "language".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guide {
    pub key: String,
    pub display_name: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationDoc {
    pub display_name: String,
    pub url: String,
}

impl Taxonomy {
    /// The built-in taxonomy.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TAXONOMY)
    }

    /// Parse a taxonomy from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PocsyncError::parse(format!("invalid platform taxonomy: {e}")))
    }

    /// Load a taxonomy from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PocsyncError::io(path, e))?;
        Self::from_json(&content)
    }
}
