//! Exchange Directory
//!
//! Resolves the numeric exchange ids carried by trade events (`x`) to
//! display names, from a Polygon reference file:
//!
//! ```json
//! {"results":[{"id":4,"name":"NYSE American, LLC"},{"id":10,"name":"Nasdaq"}]}
//! ```
//!
//! Entries without a name, and ids missing from the file, resolve to
//! `"ID <n>"`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::application::ports::{ExchangeNames, NumericExchangeNames};

/// Errors loading the exchange reference file.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeDirectoryError {
    /// File could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid reference JSON.
    #[error("invalid exchange reference data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    results: Vec<ReferenceEntry>,
}

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    id: u32,
    #[serde(default)]
    name: Option<String>,
}

/// Exchange id to name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeDirectory {
    names: HashMap<u32, String>,
}

impl ExchangeDirectory {
    /// Load the directory from a reference file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExchangeDirectoryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ExchangeDirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse the directory from reference JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid reference JSON.
    pub fn from_json(text: &str) -> Result<Self, ExchangeDirectoryError> {
        let file: ReferenceFile = serde_json::from_str(text)?;
        let names = file
            .results
            .into_iter()
            .map(|entry| {
                let name = entry
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| fallback_name(entry.id));
                (entry.id, name)
            })
            .collect();
        Ok(Self { names })
    }

    /// Display name for an exchange id.
    #[must_use]
    pub fn name(&self, id: u32) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| fallback_name(id))
    }

    /// Number of known exchanges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if no exchanges are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ExchangeNames for ExchangeDirectory {
    fn name(&self, id: u32) -> String {
        Self::name(self, id)
    }
}

fn fallback_name(id: u32) -> String {
    NumericExchangeNames.name(id)
}
