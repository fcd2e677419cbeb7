use std::path::{Path, PathBuf};

use tracing::info;
use webscout_common::{Error, Result};

use crate::model::AppConfig;

/// Loads `AppConfig` from a TOML file with environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the given path, or from `webscout.toml` in the
    /// working directory when no path is given. A missing file yields the
    /// built-in defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("webscout.toml"));

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            let config: AppConfig = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
            info!("loaded configuration from {}", path.display());
            config
        } else {
            AppConfig::default()
        };

        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(host) = std::env::var("WEBSCOUT_HOST")
            && !host.trim().is_empty()
        {
            config.gateway.host = host;
        }
        if let Ok(port) = std::env::var("WEBSCOUT_PORT")
            && let Ok(port) = port.trim().parse()
        {
            config.gateway.port = port;
        }
        if let Ok(limit) = std::env::var("WEBSCOUT_REQUEST_LIMIT")
            && let Ok(limit) = limit.trim().parse()
        {
            config.gateway.request_limit = limit;
        }
        if let Ok(model) = std::env::var("WEBSCOUT_LLM_MODEL")
            && !model.trim().is_empty()
        {
            config.llm.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ConfigLoader::load(Some(Path::new("/nonexistent/webscout.toml"))).unwrap();
        assert_eq!(config.gateway.port, 3888);
        assert_eq!(config.gateway.request_limit, 5);
        assert_eq!(config.scraper.command, "npx");
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[gateway]
port = 8080
request_limit = 20

[scraper]
command = "node"
args = ["server.js"]
max_retries = 5
"#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.request_limit, 20);
        assert_eq!(config.scraper.command, "node");
        assert_eq!(config.scraper.max_retries, Some(5));
        // untouched sections keep defaults
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [[[").unwrap();
        assert!(ConfigLoader::load(Some(file.path())).is_err());
    }
}
