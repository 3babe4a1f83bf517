//! Loader configuration

use serde::Deserialize;
use std::path::Path;

use crate::error::{BundleError, Result};

/// Name of the item inside the manifest bundle that decodes to a [`crate::Manifest`].
pub const MANIFEST_ITEM_NAME: &str = "AssetBundleManifest";

/// Controls which informational messages are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LogMode {
    /// Info, warnings and errors
    #[default]
    All,
    /// Errors only
    JustErrors,
}

/// What an operation does when its bundle is resident but a recorded
/// dependency failed to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DependencyFailurePolicy {
    /// Issue the request anyway with degraded dependencies
    #[default]
    Dispatch,
    /// Fail the operation with the dependency's error
    Fail,
}

/// Top-level configuration for the bundle loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Prefix joined with a bundle name to form its download URL.
    pub base_url: String,
    /// Variant tags in priority order, most preferred first.
    pub active_variants: Vec<String>,
    pub log_mode: LogMode,
    /// Name of the bundle that carries the manifest.
    pub manifest_bundle: String,
    /// Item inside the manifest bundle holding the manifest.
    pub manifest_item: String,
    pub dependency_failure_policy: DependencyFailurePolicy,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            active_variants: Vec::new(),
            log_mode: LogMode::All,
            manifest_bundle: platform_name().to_string(),
            manifest_item: MANIFEST_ITEM_NAME.to_string(),
            dependency_failure_policy: DependencyFailurePolicy::Dispatch,
        }
    }
}

impl BundleConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Download from a directory relative to the working directory
    pub fn set_source_directory(&mut self, relative_path: &str) -> Result<()> {
        let cwd = std::env::current_dir()?;
        let cwd = cwd.to_string_lossy().replace('\\', "/");
        self.base_url = format!("file://{cwd}{relative_path}");
        Ok(())
    }

    /// Download from `absolute_path/<platform>/`
    pub fn set_source_url(&mut self, absolute_path: &str) -> Result<()> {
        let absolute_path = absolute_path.trim();
        if absolute_path.is_empty() {
            return Err(BundleError::Config("source URL is empty".to_string()));
        }
        self.base_url = format!("{absolute_path}{}/", platform_name());
        Ok(())
    }

    /// Download from the development server whose URL is stored in a text file
    pub fn set_development_server<P: AsRef<Path>>(&mut self, url_file: P) -> Result<()> {
        let url_file = url_file.as_ref();
        let url = std::fs::read_to_string(url_file).map_err(|err| {
            BundleError::Config(format!(
                "development server URL could not be found in {}: {err}",
                url_file.display()
            ))
        })?;

        let url = url.trim();
        if url.is_empty() {
            return Err(BundleError::Config(format!(
                "development server URL file {} is empty",
                url_file.display()
            )));
        }
        self.set_source_url(url)
    }
}

/// Platform directory name bundles are built into
pub fn platform_name() -> &'static str {
    if cfg!(target_os = "android") {
        "Android"
    } else if cfg!(target_os = "ios") {
        "iOS"
    } else if cfg!(target_os = "windows") {
        "Windows"
    } else if cfg!(target_os = "macos") {
        "OSX"
    } else if cfg!(target_os = "linux") {
        "Linux"
    } else if cfg!(target_arch = "wasm32") {
        "WebGL"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BundleConfig::default();
        assert!(config.base_url.is_empty());
        assert_eq!(config.manifest_bundle, platform_name());
        assert_eq!(config.manifest_item, MANIFEST_ITEM_NAME);
        assert_eq!(config.log_mode, LogMode::All);
    }

    #[test]
    fn test_from_json_partial() {
        let config = BundleConfig::from_json_str(
            r#"{"base_url": "http://cdn/", "active_variants": ["hd", "sd"], "log_mode": "JustErrors"}"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://cdn/");
        assert_eq!(config.active_variants, vec!["hd", "sd"]);
        assert_eq!(config.log_mode, LogMode::JustErrors);
        assert_eq!(config.dependency_failure_policy, DependencyFailurePolicy::Dispatch);
    }

    #[test]
    fn test_source_url_appends_platform() {
        let mut config = BundleConfig::default();
        config.set_source_url("http://cdn/bundles/").unwrap();
        assert_eq!(config.base_url, format!("http://cdn/bundles/{}/", platform_name()));
    }

    #[test]
    fn test_empty_source_url_is_config_error() {
        let mut config = BundleConfig::default();
        assert!(matches!(config.set_source_url("  "), Err(BundleError::Config(_))));
    }

    #[test]
    fn test_development_server_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  http://localhost:7888/ ").unwrap();

        let mut config = BundleConfig::default();
        config.set_development_server(file.path()).unwrap();
        assert_eq!(config.base_url, format!("http://localhost:7888/{}/", platform_name()));
    }

    #[test]
    fn test_development_server_missing_or_empty() {
        let mut config = BundleConfig::default();
        assert!(matches!(
            config.set_development_server("/definitely/not/here.txt"),
            Err(BundleError::Config(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            config.set_development_server(file.path()),
            Err(BundleError::Config(_))
        ));
        assert!(config.base_url.is_empty());
    }

    #[test]
    fn test_source_directory_uses_cwd() {
        let mut config = BundleConfig::default();
        config.set_source_directory("/AssetBundles/").unwrap();
        assert!(config.base_url.starts_with("file://"));
        assert!(config.base_url.ends_with("/AssetBundles/"));
    }
}
