//! Per-run description of a single source
//!
//! A `Source` combines one `[[source]]` entry with the remote API shape so the
//! controller never has to look at configuration again. It is immutable for
//! the duration of a run.

use crate::config::{RemoteConfig, SourceEntry};
use serde_json::Value;

/// One harvestable source: its identifier, ordered query, and endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Source identifier (e.g. project key)
    pub id: String,

    /// Filter/sort expression defining the ordered universe of records
    pub query: String,

    /// Absolute URL of the paged list endpoint
    pub list_url: String,

    /// Absolute detail URL with a `{key}` placeholder
    pub detail_url_template: String,

    query_param: String,
    offset_param: String,
    page_size_param: String,
    fields: Option<String>,
    id_field: String,
}

impl Source {
    /// Builds a source from its configuration entry and the remote API shape
    pub fn from_config(entry: &SourceEntry, remote: &RemoteConfig) -> Self {
        let base = remote.base_url.trim_end_matches('/');
        let query = entry
            .query
            .clone()
            .unwrap_or_else(|| remote.query_template.replace("{key}", &entry.key));

        Self {
            id: entry.key.clone(),
            query,
            list_url: format!("{}{}", base, remote.search_path),
            detail_url_template: format!("{}{}", base, remote.detail_path),
            query_param: remote.query_param.clone(),
            offset_param: remote.offset_param.clone(),
            page_size_param: remote.page_size_param.clone(),
            fields: remote.fields.clone(),
            id_field: remote.id_field.clone(),
        }
    }

    /// Query parameters for the list page starting at `offset`
    pub fn list_params(&self, offset: u64, page_size: u32) -> Vec<(String, String)> {
        let mut params = vec![
            (self.query_param.clone(), self.query.clone()),
            (self.offset_param.clone(), offset.to_string()),
            (self.page_size_param.clone(), page_size.to_string()),
        ];
        if let Some(fields) = &self.fields {
            params.push(("fields".to_string(), fields.clone()));
        }
        params
    }

    /// Detail URL for one record identifier
    ///
    /// The identifier is percent-encoded so it always stays a single path
    /// segment.
    pub fn detail_url(&self, id: &str) -> String {
        let segment = url::form_urlencoded::byte_serialize(id.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        self.detail_url_template.replace("{key}", &segment)
    }

    /// Query parameters for a detail request
    pub fn detail_params(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|fields| ("fields".to_string(), fields.clone()))
            .collect()
    }

    /// Extracts the identifier of a list summary
    ///
    /// Numeric identifiers are accepted and rendered as strings.
    pub fn summary_id(&self, summary: &Value) -> Option<String> {
        match summary.get(&self.id_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
