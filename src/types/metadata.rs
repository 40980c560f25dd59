use serde::{Deserialize, Serialize};

/// Page metadata returned by the metadata endpoint.
///
/// Every field may be missing or empty on partial extraction failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}
