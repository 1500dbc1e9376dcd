//! # Web Server Utilities
//!
//! Small formatting helpers for the page handlers.

use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;

/// Formats a data timestamp for the week page footer: the absolute UTC
/// time plus a human-readable relative time (e.g. "7 minutes ago").
///
/// For a directory source the timestamp is the file's mtime; for an HTTP
/// source it is when the document was fetched. `None` reads as unknown.
pub fn format_updated(updated: Option<DateTime<Utc>>) -> String {
    match updated {
        Some(at) => {
            let human = HumanTime::from(Utc::now() - at).to_text_en(
                chrono_humanize::Accuracy::Rough,
                chrono_humanize::Tense::Past,
            );
            format!("{} ({})", at.format("%Y-%m-%d %H:%M:%S UTC"), human)
        }
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_updated_includes_relative_time() {
        let s = format_updated(Some(Utc::now() - chrono::Duration::minutes(7)));
        assert!(s.contains("UTC"));
        assert!(s.contains("minutes ago"), "{}", s);
    }

    #[test]
    fn test_format_updated_without_a_stamp() {
        assert_eq!(format_updated(None), "unknown");
    }
}
