//! Raw record to normalized record mapping
//!
//! Pure and total: any missing or mistyped field becomes an empty or absent
//! value.

use crate::record::normalized::{
    Derived, Metadata, NormalizedRecord, QnaTask, SummarizationTask,
};
use crate::record::raw::RawRecord;
use serde_json::Value;

/// Maps a raw record into its normalized form
pub fn transform(raw: &RawRecord) -> NormalizedRecord {
    let body = &raw.body;

    let title = text_at(body, "/fields/summary").unwrap_or_default();
    let description = text_at(body, "/fields/description").unwrap_or_default();
    let comments = comment_texts(body);
    let joined = comments.join("\n");

    let metadata = Metadata {
        issue_key: text_at(body, "/key").or_else(|| Some(raw.id.clone())),
        project: text_at(body, "/fields/project/key"),
        issuetype: text_at(body, "/fields/issuetype/name"),
        status: text_at(body, "/fields/status/name"),
        priority: text_at(body, "/fields/priority/name"),
        reporter: text_at(body, "/fields/reporter/displayName"),
        assignee: text_at(body, "/fields/assignee/displayName"),
        labels: labels(body),
        created: text_at(body, "/fields/created"),
        updated: text_at(body, "/fields/updated"),
    };

    let summarization = SummarizationTask {
        task: "summarization".to_string(),
        input: format!(
            "Title: {}\n\nDescription:\n{}\n\nComments:\n{}",
            title, description, joined
        ),
        output: String::new(),
    };

    let qna = QnaTask {
        task: "qa".to_string(),
        context: format!("{}\n\n{}\n\n{}", title, description, joined),
        qa_pairs: Vec::new(),
    };

    NormalizedRecord {
        metadata,
        title,
        description,
        comments,
        derived: Derived { summarization, qna },
        raw_issue_id: text_at(body, "/id"),
    }
}

/// String (or number rendered as string) at a JSON pointer
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn comment_texts(body: &Value) -> Vec<String> {
    let Some(comments) = body
        .pointer("/fields/comment/comments")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    comments
        .iter()
        .map(|c| {
            format!(
                "{} ({}): {}",
                text_at(c, "/author/displayName").unwrap_or_default(),
                text_at(c, "/created").unwrap_or_default(),
                text_at(c, "/body").unwrap_or_default()
            )
        })
        .collect()
}

fn labels(body: &Value) -> Vec<String> {
    body.pointer("/fields/labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
