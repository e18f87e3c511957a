use crate::models::{ListRecords, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /generate`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(default)]
    #[validate(
        required(message = "prompt is required"),
        length(min = 1, message = "prompt must be a non-empty string")
    )]
    pub prompt: Option<String>,
}

/// Body of `POST /explain`.
#[derive(Debug, Deserialize, Validate)]
pub struct ExplainRequest {
    #[serde(default)]
    #[validate(
        required(message = "code is required"),
        length(min = 1, message = "code must be a non-empty string")
    )]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: i64,
    pub input_text: String,
    pub output_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Record> for RecordResponse {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            input_text: record.input_text,
            output_text: record.output_text,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordListResponse {
    pub records: Vec<RecordResponse>,
    /// Pass as `before_id` to fetch the next page; absent on the last page.
    pub next_before_id: Option<i64>,
}

impl RecordListResponse {
    pub fn new(records: Vec<Record>, page: ListRecords) -> Self {
        let next_before_id = if records.len() as i64 == page.limit {
            records.last().map(|r| r.id)
        } else {
            None
        };

        Self {
            records: records.into_iter().map(RecordResponse::from).collect(),
            next_before_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRecordsQuery {
    pub limit: Option<i64>,
    pub before_id: Option<i64>,
}

impl From<ListRecordsQuery> for ListRecords {
    fn from(query: ListRecordsQuery) -> Self {
        ListRecords::new(query.limit, query.before_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prompt_fails_validation() {
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_err());

        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": null}"#).unwrap();
        assert!(req.validate().is_err());

        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": ""}"#).unwrap();
        assert!(req.validate().is_err());

        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn next_page_cursor_only_on_full_page() {
        let record = |id| Record {
            id,
            input_text: "x".into(),
            output_text: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        let full = RecordListResponse::new(vec![record(3), record(2)], ListRecords::new(Some(2), None));
        assert_eq!(full.next_before_id, Some(2));

        let partial = RecordListResponse::new(vec![record(1)], ListRecords::new(Some(2), None));
        assert_eq!(partial.next_before_id, None);
    }
}
