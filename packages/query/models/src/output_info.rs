//! The `output.info` metadata file shipped inside every result archive.

use serde::{Deserialize, Serialize};

use crate::coerce;

/// File name of the metadata document inside a result archive.
pub const OUTPUT_INFO_FILE_NAME: &str = "output.info";

/// Description of one file in a result archive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputFile {
    /// File name relative to the archive root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Layer the file was produced from.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub layer_id: Option<String>,
    /// File description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Timestamp of the data in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Parsed `output.info` document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryOutputInfoFile {
    /// One-line summary of the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Query name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Query description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link to the job in the web UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Files in the archive.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<OutputFile>,
}
