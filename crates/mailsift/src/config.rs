//! CLI configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <PATH>`
//! 2. `$MAILSIFT_CONFIG` (environment variable)
//! 3. `~/.config/mailsift/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsift\config.toml` (Windows)
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use mailsift_core::ClassifierConfig;
use mailsift_sniff::{MediaType, SnifferConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Media type sniffing.
    pub sniffer: SnifferSection,
    /// Content classification.
    pub classifier: ClassifierSection,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level when no `-v` flag is given.
    pub log_level: String,
}

/// Sniffer settings. Table entries extend the built-in tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnifferSection {
    /// Number of leading bytes inspected.
    pub probe_size: usize,
    /// Connect timeout for URL sniffing, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout for URL sniffing, in milliseconds.
    pub read_timeout_ms: u64,
    /// Extra signatures, checked after the built-in ones.
    pub signatures: Vec<SignatureEntry>,
    /// Extension to `type/subtype` overrides.
    pub extensions: BTreeMap<String, String>,
    /// Declared `Content-Type` to `type/subtype` overrides.
    pub declared_types: BTreeMap<String, String>,
}

/// A signature table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Hex prefix, or text prefix of the normalized probe.
    pub key: String,
    /// Resulting `type/subtype`.
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Classifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Maximum multipart / forwarded message nesting.
    pub max_depth: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

impl Default for SnifferSection {
    fn default() -> Self {
        let defaults = SnifferConfig::default();
        Self {
            probe_size: defaults.probe_size,
            connect_timeout_ms: duration_ms(defaults.connect_timeout),
            read_timeout_ms: duration_ms(defaults.read_timeout),
            signatures: Vec::new(),
            extensions: BTreeMap::new(),
            declared_types: BTreeMap::new(),
        }
    }
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            max_depth: ClassifierConfig::default().max_depth,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn media_type(essence: &str) -> anyhow::Result<MediaType> {
    MediaType::from_essence(essence)
        .with_context(|| format!("invalid media type {essence:?}, expected type/subtype"))
}

impl SnifferSection {
    /// Builds the sniffer configuration on top of the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a table entry names an invalid media type.
    pub fn to_sniffer_config(&self) -> anyhow::Result<SnifferConfig> {
        let mut builder = SnifferConfig::builder()
            .probe_size(self.probe_size)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .read_timeout(Duration::from_millis(self.read_timeout_ms));

        for entry in &self.signatures {
            builder = builder.signature(&entry.key, media_type(&entry.media_type)?);
        }
        for (ext, essence) in &self.extensions {
            builder = builder.extension(ext, media_type(essence)?);
        }
        for (declared, essence) in &self.declared_types {
            builder = builder.declared_type(declared, media_type(essence)?);
        }
        Ok(builder.build())
    }
}

impl ClassifierSection {
    /// Builds the classifier configuration.
    #[must_use]
    pub fn to_classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::default().max_depth(self.max_depth)
    }
}

/// Loads configuration.
///
/// An explicit path must exist and parse. A file at the standard location
/// is optional; if it cannot be read or parsed the defaults are used.
///
/// # Errors
///
/// Returns an error if an explicit configuration file cannot be loaded.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        return toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()));
    }

    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => return Ok(cfg),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Ok(Config::default())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.sniffer.probe_size, 20);
        assert_eq!(cfg.sniffer.connect_timeout_ms, 3000);
        assert_eq!(cfg.sniffer.read_timeout_ms, 5000);
        assert_eq!(cfg.classifier.max_depth, 64);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[sniffer]
probe_size = 32

[sniffer.extensions]
heic = "image/heic"

[[sniffer.signatures]]
key = "4f676753"
type = "audio/ogg"
"#;
        let cfg: Config = toml::from_str(partial).unwrap();
        assert_eq!(cfg.sniffer.probe_size, 32);
        assert_eq!(cfg.sniffer.read_timeout_ms, 5000);
        assert_eq!(cfg.classifier.max_depth, 64);

        let sniffer = cfg.sniffer.to_sniffer_config().unwrap();
        assert_eq!(sniffer.probe_size, 32);
        assert_eq!(sniffer.extensions.get("heic").unwrap().essence(), "image/heic");
        let (key, last) = sniffer.signatures.iter().last().unwrap();
        assert_eq!(key, "4f676753");
        assert_eq!(last.essence(), "audio/ogg");
    }

    #[test]
    fn test_invalid_media_type_is_rejected() {
        let mut section = SnifferSection::default();
        section
            .declared_types
            .insert("text/x-thing".to_string(), "nonsense".to_string());
        assert!(section.to_sniffer_config().is_err());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.classifier.max_depth = 8;
        cfg.sniffer.signatures.push(SignatureEntry {
            key: "cafebabe".to_string(),
            media_type: "application/java-vm".to_string(),
        });
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[classifier]\nmax_depth = 4").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.classifier.to_classifier_config().max_depth, 4);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
