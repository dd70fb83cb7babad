//! Training-ready shape derived from a raw record

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub metadata: Metadata,
    pub title: String,
    pub description: String,
    /// Sub-record texts as `author (created): body`, in original order
    pub comments: Vec<String>,
    pub derived: Derived,
    pub raw_issue_id: Option<String>,
}

/// Identifiers, actors, timestamps and classification fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub issue_key: Option<String>,
    pub project: Option<String>,
    pub issuetype: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub reporter: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub summarization: SummarizationTask,
    pub qna: QnaTask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizationTask {
    pub task: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QnaTask {
    pub task: String,
    pub context: String,
    pub qa_pairs: Vec<QaPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}
