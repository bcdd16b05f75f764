//! Correlation filter: admits a message only when the category of
//! `metadata.correlationStreamName` matches the category of the filter's
//! stream name.

use crate::types::{stream_category, Message};

/// Whether `message` passes `correlation` (category-of-category match).
/// `None` filter always passes. A missing `metadata`, missing field, or
/// non-string field excludes the message.
pub fn matches(message: &Message, correlation: Option<&str>) -> bool {
    let Some(filter) = correlation else {
        return true;
    };
    let filter_category = stream_category(filter);
    match message.correlation_stream_name() {
        Some(name) => stream_category(name) == filter_category,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn message_with_correlation(correlation_stream: Option<&str>) -> Message {
        Message {
            id: "id".to_string(),
            stream_name: "order-100".to_string(),
            event_type: "OrderPlaced".to_string(),
            position: 0,
            global_position: 1,
            data: json!({}),
            metadata: correlation_stream
                .map(|s| json!({"correlationStreamName": s})),
            time: Utc::now(),
        }
    }

    #[test]
    fn no_filter_always_matches() {
        assert!(matches(&message_with_correlation(None), None));
    }

    #[test]
    fn missing_metadata_excluded_when_filter_set() {
        assert!(!matches(&message_with_correlation(None), Some("customer")));
    }

    #[test]
    fn category_of_category_comparison() {
        let message = message_with_correlation(Some("customer-alice"));
        assert!(matches(&message, Some("customer")));
        assert!(matches(&message, Some("customer-bob")));
        assert!(!matches(&message, Some("user")));
    }
}
