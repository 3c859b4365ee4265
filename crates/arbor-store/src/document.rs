//! The tree document model.
//!
//! The store treats a document as opaque JSON.  This module only knows two
//! things about it: what a freshly created tree looks like, and how a partial
//! update is folded into an existing record.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

/// Name given to trees created without one.
pub const DEFAULT_TREE_NAME: &str = "Untitled Tree";

/// Document format version written into new trees.
pub const DOCUMENT_VERSION: &str = "1.0";

/// The document body every new tree starts with.
pub fn default_document() -> Value {
    json!({
        "version": DOCUMENT_VERSION,
        "nodes": [],
        "edges": [],
        "decorations": [],
        "viewport": { "zoom": 1, "panX": 0, "panY": 0 }
    })
}

/// A partial update to a tree.
///
/// Each field is either replaced wholesale or left untouched; `data` is never
/// deep-merged with the previous document.  A JSON `null` is treated the same
/// as an absent field.  An empty patch is still a write and bumps
/// `updated_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl TreePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            data: None,
        }
    }

    pub fn replace_data(data: Value) -> Self {
        Self {
            name: None,
            data: Some(data),
        }
    }

    /// `true` when neither field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.data.is_none()
    }

    /// The replacement document in its on-disk text form, if any.
    pub(crate) fn encoded_data(&self) -> Result<Option<String>> {
        Ok(self.data.as_ref().map(serde_json::to_string).transpose()?)
    }
}
