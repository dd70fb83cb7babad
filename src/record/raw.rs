use serde::{Serialize, Serializer};
use serde_json::Value;

/// Full detail representation of one record, written verbatim to the raw log
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub body: Value,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}
