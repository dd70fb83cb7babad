use serde::Deserialize;
use serde_json::Value;

/// One batch of summaries returned by the list endpoint
///
/// Only the fields the crawler depends on are modeled; everything else in the
/// response is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    /// Server-reported size of the whole result set
    #[serde(default)]
    pub total: Option<u64>,

    /// Offset this page corresponds to, when the server echoes it back
    #[serde(default, alias = "startAt")]
    pub offset: Option<u64>,

    /// Lightweight record summaries, in server order
    #[serde(default, alias = "issues")]
    pub items: Vec<Value>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offset just past this page
    ///
    /// Falls back to the requested offset when the server does not echo one.
    /// Returns None if the echoed offset is too large to move past.
    pub fn next_offset(&self, requested: u64) -> Option<u64> {
        self.offset
            .unwrap_or(requested)
            .checked_add(self.items.len() as u64)
    }

    /// Returns true once `offset` covers the whole result set
    pub fn is_exhausted_at(&self, offset: u64) -> bool {
        matches!(self.total, Some(total) if offset >= total)
    }
}
