//! Sniffer configuration.

use crate::fetch::{Fetch, HttpFetcher};
use crate::media_type::MediaType;
use crate::table::TypeTable;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of leading bytes inspected.
pub const DEFAULT_PROBE_SIZE: usize = 20;

/// Default connect timeout for URL sniffing.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default read timeout for URL sniffing.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Immutable sniffer configuration.
#[derive(Clone)]
pub struct SnifferConfig {
    /// Number of leading bytes inspected.
    pub probe_size: usize,
    /// Connect timeout for URL sniffing.
    pub connect_timeout: Duration,
    /// Read timeout for URL sniffing.
    pub read_timeout: Duration,
    /// Fetcher used by URL sniffing.
    pub fetcher: Arc<dyn Fetch>,
    /// Ordered magic signatures.
    pub signatures: TypeTable,
    /// File extension mappings.
    pub extensions: TypeTable,
    /// Declared `Content-Type` mappings, used by URL sniffing.
    pub declared_types: TypeTable,
}

impl SnifferConfig {
    /// Creates a configuration builder starting from the defaults.
    #[must_use]
    pub fn builder() -> SnifferConfigBuilder {
        SnifferConfigBuilder::new()
    }
}

impl Default for SnifferConfig {
    fn default() -> Self {
        SnifferConfigBuilder::new().build()
    }
}

impl fmt::Debug for SnifferConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnifferConfig")
            .field("probe_size", &self.probe_size)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("signatures", &self.signatures.len())
            .field("extensions", &self.extensions.len())
            .field("declared_types", &self.declared_types.len())
            .finish_non_exhaustive()
    }
}

/// Builder for sniffer configuration.
#[derive(Clone)]
pub struct SnifferConfigBuilder {
    probe_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
    fetcher: Arc<dyn Fetch>,
    signatures: TypeTable,
    extensions: TypeTable,
    declared_types: TypeTable,
}

impl SnifferConfigBuilder {
    /// Creates a builder with the built-in tables and timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe_size: DEFAULT_PROBE_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            fetcher: Arc::new(HttpFetcher),
            signatures: TypeTable::default_signatures(),
            extensions: TypeTable::default_extensions(),
            declared_types: TypeTable::default_declared_types(),
        }
    }

    /// Sets the probe window size. Zero is raised to one.
    #[must_use]
    pub fn probe_size(mut self, size: usize) -> Self {
        self.probe_size = size.max(1);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Replaces the fetcher.
    #[must_use]
    pub fn fetcher(mut self, fetcher: impl Fetch + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Replaces the signature table.
    #[must_use]
    pub fn signatures(mut self, table: TypeTable) -> Self {
        self.signatures = table;
        self
    }

    /// Appends a signature with the lowest priority.
    #[must_use]
    pub fn signature(mut self, key: &str, media_type: MediaType) -> Self {
        self.signatures.push(key, media_type);
        self
    }

    /// Replaces the extension table.
    #[must_use]
    pub fn extensions(mut self, table: TypeTable) -> Self {
        self.extensions = table;
        self
    }

    /// Adds or replaces an extension mapping.
    #[must_use]
    pub fn extension(mut self, ext: &str, media_type: MediaType) -> Self {
        self.extensions.insert(ext, media_type);
        self
    }

    /// Replaces the declared content type table.
    #[must_use]
    pub fn declared_types(mut self, table: TypeTable) -> Self {
        self.declared_types = table;
        self
    }

    /// Adds or replaces a declared content type mapping.
    #[must_use]
    pub fn declared_type(mut self, essence: &str, media_type: MediaType) -> Self {
        self.declared_types.insert(essence, media_type);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SnifferConfig {
        SnifferConfig {
            probe_size: self.probe_size,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            fetcher: self.fetcher,
            signatures: self.signatures,
            extensions: self.extensions,
            declared_types: self.declared_types,
        }
    }
}

impl Default for SnifferConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
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

    #[test]
    fn test_config_defaults() {
        let config = SnifferConfig::default();
        assert_eq!(config.probe_size, 20);
        assert_eq!(config.connect_timeout, Duration::from_millis(3000));
        assert_eq!(config.read_timeout, Duration::from_millis(5000));
        assert!(!config.signatures.is_empty());
        assert!(config.extensions.get("pdf").is_some());
        assert!(config.declared_types.get("text/html").is_some());
    }

    #[test]
    fn test_config_builder() {
        let config = SnifferConfig::builder()
            .probe_size(64)
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_secs(2))
            .extension("heic", MediaType::new("image", "heic"))
            .signature("4f676753", MediaType::new("audio", "ogg"))
            .build();

        assert_eq!(config.probe_size, 64);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.extensions.get("HEIC").unwrap().essence(), "image/heic");
        let (last_key, _) = config.signatures.iter().last().unwrap();
        assert_eq!(last_key, "4f676753");
    }

    #[test]
    fn test_probe_size_never_zero() {
        let config = SnifferConfig::builder().probe_size(0).build();
        assert_eq!(config.probe_size, 1);
    }
}
