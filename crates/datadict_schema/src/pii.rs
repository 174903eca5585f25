//! PII Detection
//!
//! Name-based and content-based heuristics for flagging columns that likely
//! hold personal data. Name matches short-circuit so sample contents are only
//! inspected when the name gives no signal.

use regex::Regex;
use std::sync::OnceLock;

/// Column-name fragments that mark a column as PII regardless of content.
pub const PII_COLUMN_PATTERNS: &[&str] = &[
    "email",
    "ssn",
    "social_security",
    "phone",
    "mobile",
    "address",
    "passport",
    "driver_license",
    "credit_card",
    "dob",
    "birth_date",
    "salary",
    "wage",
];

/// Upper bound on how many sample values are inspected per column.
const MAX_SAMPLES_CHECKED: usize = 100;

fn content_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Email addresses
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("email pattern is valid"),
            // US social security numbers
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern is valid"),
            // Phone numbers; strict grouping so plain digit runs (timestamps,
            // ids) do not match
            Regex::new(r"\b\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
                .expect("phone pattern is valid"),
        ]
    })
}

/// Decide whether a column likely contains PII.
///
/// The column name is checked first (case-insensitive substring match); a hit
/// returns without looking at content. Otherwise the first 100 sample values
/// are scanned against the content patterns.
pub fn detect_pii_column(column_name: &str, sample_values: &[String]) -> bool {
    let name = column_name.to_lowercase();
    if PII_COLUMN_PATTERNS.iter().any(|p| name.contains(p)) {
        return true;
    }

    let samples = &sample_values[..sample_values.len().min(MAX_SAMPLES_CHECKED)];
    content_patterns()
        .iter()
        .any(|re| samples.iter().any(|value| re.is_match(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_match_without_samples() {
        assert!(detect_pii_column("user_email", &[]));
        assert!(detect_pii_column("MOBILE_NUMBER", &[]));
        assert!(detect_pii_column("date_of_birth_date", &[]));
        assert!(!detect_pii_column("order_id", &[]));
    }

    #[test]
    fn test_content_match_on_samples() {
        let samples = vec!["test@example.com".to_string()];
        assert!(detect_pii_column("contact", &samples));

        let ssn = vec!["123-45-6789".to_string()];
        assert!(detect_pii_column("gov_ref", &ssn));
    }

    #[test]
    fn test_timestamps_are_not_phone_numbers() {
        let samples = vec!["2024-01-01 12:34:56".to_string()];
        assert!(!detect_pii_column("created", &samples));
    }

    #[test]
    fn test_plain_notes_are_clean() {
        let samples = vec![
            "called the customer back".to_string(),
            "waiting on shipment".to_string(),
        ];
        assert!(!detect_pii_column("notes", &samples));
    }

    #[test]
    fn test_only_first_hundred_samples_inspected() {
        let mut samples = vec!["clean".to_string(); 100];
        samples.push("hidden@example.com".to_string());
        assert!(!detect_pii_column("misc", &samples));

        let mut early = vec!["clean".to_string(); 99];
        early.push("visible@example.com".to_string());
        assert!(detect_pii_column("misc", &early));
    }
}
