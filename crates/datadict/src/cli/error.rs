//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// A segment's description document is missing
    pub fn description_not_found(segment: &str, path: &Path) -> Self {
        Self::new(format!("Description document not found for segment: {segment}"))
            .with_context(format!("Expected file: {}", path.display()))
            .with_suggestions([
                "TRY: Run the description generation phase for this segment first".to_string(),
                format!("TRY: List available segments: ls {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string())),
                "TRY: Check the segment name for typos".to_string(),
            ])
    }

    /// A segment's review CSV is missing
    pub fn review_not_found(segment: &str, path: &Path) -> Self {
        Self::new(format!("Review CSV not found for segment: {segment}"))
            .with_context(format!("Expected file: {}", path.display()))
            .with_suggestions([
                format!("TRY: Export it first: datadict review {segment}"),
                format!("TRY: List reviewed segments: ls {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string())),
            ])
    }

    /// No segments were named and none could be discovered
    pub fn no_segments(dir: &Path, what: &str) -> Self {
        Self::new(format!("No segments to process: no {what} found"))
            .with_context(format!("Searched directory: {}", dir.display()))
            .with_suggestions([
                "TRY: Name segments explicitly on the command line".to_string(),
                format!("TRY: Check the directory contents: ls {}", dir.display()),
                "TRY: Check --root points at the right workspace".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_description_not_found() {
        let path = PathBuf::from("/work/descriptions/Customer-descriptions.json");
        let err = HelpfulError::description_not_found("Customer", &path);

        let display = format!("{}", err);
        assert!(display.contains("Customer"));
        assert!(display.contains("TRY:"));
    }
}
