//! Item identity - the unit of content whose storage placement is tracked
//!
//! Items themselves (bytes, metadata records, ownership) live in the
//! surrounding CRUD system. This core only sees a stable UUID plus a
//! closed kind set, carried on every edge and summary.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of tracked item kinds.
///
/// The set is part of the wire contract: any other value is rejected
/// at the boundary rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
    Note,
    Document,
    Audio,
}

impl ItemKind {
    /// Get the string representation of the item kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Image => "image",
            ItemKind::Video => "video",
            ItemKind::Note => "note",
            ItemKind::Document => "document",
            ItemKind::Audio => "audio",
        }
    }

    /// Get all item kinds
    pub fn all() -> &'static [ItemKind] {
        &[
            ItemKind::Image,
            ItemKind::Video,
            ItemKind::Note,
            ItemKind::Document,
            ItemKind::Audio,
        ]
    }
}

impl FromStr for ItemKind {
    type Err = Error;

    // Exact names only. The closed set is a contract, not a convenience.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(ItemKind::Image),
            "video" => Ok(ItemKind::Video),
            "note" => Ok(ItemKind::Note),
            "document" => Ok(ItemKind::Document),
            "audio" => Ok(ItemKind::Audio),
            _ => Err(Error::Validation(format!("Unknown item type: {}", s))),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An (id, kind) pair addressing one tracked item.
///
/// The id is issued by the surrounding system; this core requires it to
/// be a well-formed UUID but never mints one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "itemId")]
    pub id: Uuid,
    #[serde(rename = "itemType")]
    pub kind: ItemKind,
}

impl ItemRef {
    pub fn new(id: Uuid, kind: ItemKind) -> Self {
        Self { id, kind }
    }

    /// Parse an item reference from untrusted wire strings.
    pub fn parse(id: &str, kind: &str) -> Result<Self> {
        let id = Uuid::parse_str(id)
            .map_err(|_| Error::Validation(format!("Invalid item id (expected UUID): {}", id)))?;
        let kind = kind.parse()?;
        Ok(Self { id, kind })
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
