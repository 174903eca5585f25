//! TD API connection settings resolved from the environment.

use crate::RemoteError;

pub const DEFAULT_ENDPOINT: &str = "https://api.treasuredata.com";

/// API key and endpoint for one TD account.
#[derive(Debug, Clone)]
pub struct TdConfig {
    api_key: String,
    endpoint: String,
}

impl TdConfig {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            api_key: api_key.into(),
            endpoint,
        }
    }

    /// Read `TD_API_KEY` (required) and `TD_API_ENDPOINT` (optional, defaults
    /// to the US region API).
    pub fn from_env() -> Result<Self, RemoteError> {
        let api_key = std::env::var("TD_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(RemoteError::MissingApiKey)?;
        let endpoint = std::env::var("TD_API_ENDPOINT")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(api_key, endpoint))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let config = TdConfig::new("key", "https://api.eu01.treasuredata.com/");
        assert_eq!(config.endpoint(), "https://api.eu01.treasuredata.com");
    }

    #[test]
    fn test_default_endpoint_constant() {
        assert_eq!(DEFAULT_ENDPOINT, "https://api.treasuredata.com");
    }
}
