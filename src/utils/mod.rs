//! Utilities module for logging, metrics, and helper functions
//!
//! This module provides:
//! - Structured logging with tracing
//! - Evaluation metrics (classification report, confusion matrix)
//! - Error handling types

pub mod error;
pub mod logging;
pub mod metrics;

// Re-export main types for convenience
pub use error::{LeafError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};
pub use metrics::{ClassificationReport, ConfusionMatrix};

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

/// Parse a boolean flag the way environment switches are written (1/true/yes/on)
pub fn parse_bool_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Split a comma-separated argument, dropping blank items
pub fn split_csv_arg(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.5), "30.5s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m");
    }

    #[test]
    fn test_parse_bool_flag() {
        for raw in ["1", "true", "YES", " on "] {
            assert!(parse_bool_flag(raw), "{raw}");
        }
        for raw in ["0", "false", "off", ""] {
            assert!(!parse_bool_flag(raw), "{raw}");
        }
    }

    #[test]
    fn test_split_csv_arg() {
        assert_eq!(split_csv_arg(" a, ,b ,"), vec!["a", "b"]);
        assert!(split_csv_arg("  ").is_empty());
    }
}
