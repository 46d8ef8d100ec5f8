use serde::Deserialize;
use std::path::Path;

/// Backend base URL used by the API client when running server-side.
pub const CLIENT_DEFAULT_API_URL: &str = "http://localhost:8000";
/// Backend origin used by the `/api` proxy.
///
/// Differs from [`CLIENT_DEFAULT_API_URL`]: the proxy assumes the container
/// network, the client assumes a local backend. Set `API_URL` to pin both.
pub const PROXY_DEFAULT_API_URL: &str = "http://backend:8000";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the dashboard listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Internal backend URL for server-side calls
    #[serde(default)]
    pub api_url: Option<String>,
    /// Backend URL handed to browsers; relative paths when unset
    #[serde(default)]
    pub public_api_url: Option<String>,
    /// Origin `/api/*` requests are forwarded to
    #[serde(default)]
    pub proxy_target: Option<String>,
    #[serde(default)]
    pub ga_measurement_id: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_url: None,
            public_api_url: None,
            proxy_target: None,
            ga_measurement_id: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `API_URL`, `NEXT_PUBLIC_API_URL` and
    /// `NEXT_PUBLIC_GA_MEASUREMENT_ID` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_url) = lookup("API_URL") {
            self.api_url = Some(api_url.clone());
            self.proxy_target = Some(api_url);
        }
        if let Some(public) = lookup("NEXT_PUBLIC_API_URL") {
            self.public_api_url = Some(public);
        }
        if let Some(ga) = lookup("NEXT_PUBLIC_GA_MEASUREMENT_ID") {
            self.ga_measurement_id = Some(ga);
        }
        self
    }

    /// Backend URL for server-side client calls.
    pub fn internal_api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(CLIENT_DEFAULT_API_URL)
    }

    /// Origin the `/api` proxy forwards to.
    pub fn proxy_origin(&self) -> &str {
        self.proxy_target.as_deref().unwrap_or(PROXY_DEFAULT_API_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_bind_address() {
        assert_eq!(default_bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind_address = "127.0.0.1:8080"
            api_url = "http://api.internal:8000"
            public_api_url = "https://digest.example.com"
            proxy_target = "http://api.internal:8000"
            ga_measurement_id = "G-TEST123"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.internal_api_url(), "http://api.internal:8000");
        assert_eq!(
            config.public_api_url.as_deref(),
            Some("https://digest.example.com")
        );
        assert_eq!(config.proxy_origin(), "http://api.internal:8000");
        assert_eq!(config.ga_measurement_id.as_deref(), Some("G-TEST123"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.internal_api_url(), CLIENT_DEFAULT_API_URL);
        assert_eq!(config.proxy_origin(), PROXY_DEFAULT_API_URL);
    }

    #[test]
    fn test_client_and_proxy_defaults_differ() {
        let config = Config::default();
        assert_eq!(config.internal_api_url(), "http://localhost:8000");
        assert_eq!(config.proxy_origin(), "http://backend:8000");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/digest.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/path/digest.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let result = Config::from_str("bind_address = 3000");
        assert!(result.is_err());
    }

    #[test]
    fn test_api_url_overrides_client_and_proxy() {
        let config = Config::from_str(r#"api_url = "http://from-file:8000""#)
            .unwrap()
            .with_overrides(env(&[("API_URL", "http://from-env:9000")]));

        assert_eq!(config.internal_api_url(), "http://from-env:9000");
        assert_eq!(config.proxy_origin(), "http://from-env:9000");
    }

    #[test]
    fn test_public_and_analytics_overrides() {
        let config = Config::default().with_overrides(env(&[
            ("NEXT_PUBLIC_API_URL", "https://public.example.com"),
            ("NEXT_PUBLIC_GA_MEASUREMENT_ID", "G-ABC"),
        ]));

        assert_eq!(
            config.public_api_url.as_deref(),
            Some("https://public.example.com")
        );
        assert_eq!(config.ga_measurement_id.as_deref(), Some("G-ABC"));
        assert_eq!(config.api_url, None);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let config = Config::default().with_overrides(env(&[("API_URL", "  ")]));
        assert_eq!(config.internal_api_url(), CLIENT_DEFAULT_API_URL);
        assert_eq!(config.proxy_origin(), PROXY_DEFAULT_API_URL);
    }
}
