//! Space tracker records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes freed by one cleanup operation, one JSON line in the tracker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRecord {
    /// Logical operation label, e.g. `chrome_cache`
    pub operation: String,
    pub bytes_freed: u64,
    pub recorded_at: DateTime<Utc>,
    /// Process that performed the cleanup
    pub pid: u32,
}

impl SpaceRecord {
    /// A record stamped with the current time and process id
    pub fn new(operation: impl Into<String>, bytes_freed: u64) -> Self {
        Self {
            operation: operation.into(),
            bytes_freed,
            recorded_at: Utc::now(),
            pid: std::process::id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_single_line_json() {
        let record = SpaceRecord::new("npm\ncache", 42);
        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));

        let parsed: SpaceRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.pid, std::process::id());
    }
}
