//! Audit records for the cover pipeline: every attempted source with its
//! outcome, plus the final selection reason and storage key. Serialized onto
//! the book's raw payload.

use serde::{Deserialize, Serialize};

use crate::domain::models::CoverSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Success,
    Failure404,
    FailureTimeout,
    FailureProcessing,
    FailurePlaceholderDetected,
    SkippedBadUrl,
    SkippedNoIsbn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverAttempt {
    pub source: CoverSource,
    pub url: String,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverProvenance {
    pub attempts: Vec<CoverAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl CoverProvenance {
    pub fn record(&mut self, attempt: CoverAttempt) {
        self.attempts.push(attempt);
    }

    pub fn select(&mut self, reason: impl Into<String>, storage_key: Option<String>) {
        self.selection_reason = Some(reason.into());
        self.storage_key = storage_key;
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_serializes_attempt_trail() {
        let mut provenance = CoverProvenance::default();
        provenance.record(CoverAttempt {
            source: CoverSource::GoogleBooks,
            url: "http://g/cover.jpg".into(),
            status: AttemptStatus::FailurePlaceholderDetected,
            width: Some(100),
            height: Some(100),
            reason: Some("dominant color".into()),
        });
        provenance.record(CoverAttempt {
            source: CoverSource::OpenLibrary,
            url: "http://ol/cover.jpg".into(),
            status: AttemptStatus::Success,
            width: Some(800),
            height: Some(1200),
            reason: None,
        });
        provenance.select("high-resolution OPEN_LIBRARY candidate", Some("images/book-covers/x.jpg".into()));

        let json = provenance.to_json();
        assert_eq!(json["attempts"].as_array().unwrap().len(), 2);
        assert_eq!(json["attempts"][0]["status"], "FailurePlaceholderDetected");
        assert_eq!(json["storage_key"], "images/book-covers/x.jpg");
    }
}
