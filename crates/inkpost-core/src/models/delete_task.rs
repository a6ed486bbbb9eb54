use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deferred removal of one media file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteTask {
    /// Path relative to the media root
    pub file_path: String,
    /// Creation time, diagnostics only
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl DeleteTask {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    /// Copy for the next attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            file_path: self.file_path.clone(),
            timestamp: Utc::now(),
            retry_count: self.retry_count + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_attempt_increments_retry_count() {
        let task = DeleteTask::new("2024/05/abc.png");
        let retry = task.next_attempt().next_attempt();
        assert_eq!(retry.retry_count, 2);
        assert_eq!(retry.file_path, "2024/05/abc.png");
    }

    #[test]
    fn test_payload_without_retry_count_defaults_to_zero() {
        let task: DeleteTask = serde_json::from_str(
            r#"{"file_path":"a.png","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(task.retry_count, 0);
    }
}
