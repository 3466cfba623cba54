//! Static file serving with an in-memory cache of compressed bodies.

pub mod cache;
pub mod handlers;
pub mod mime;
mod path_utils;

use std::path::PathBuf;
use std::sync::Arc;

use crate::compression::{AllowedCompression, Compressor, Deflater, STATIC_LEVEL};
use crate::error::ConfigError;

pub use cache::CompressedCache;
pub use mime::MimeTable;
pub use path_utils::normalize_request_path;

pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Where a request for a missing file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Empty 404.
    Status,
    /// Empty 302 with this `Location`.
    Redirect(String),
    /// Leave the request to the next handler in the chain.
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct StaticSiteConfig {
    pub document_root: PathBuf,
    pub url_prefix: String,
    pub default_document: String,
    pub mime_types: MimeTable,
    pub compressible_types: Vec<String>,
    pub not_found: NotFoundPolicy,
    pub allow_gzip: bool,
    pub allow_deflate: bool,
    pub allow_cache_compressed: bool,
    pub extra_headers: Vec<(String, String)>,
    pub level: u32,
}

impl StaticSiteConfig {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            url_prefix: "/".to_string(),
            default_document: DEFAULT_DOCUMENT.to_string(),
            mime_types: MimeTable::default(),
            compressible_types: mime::default_compressible_types(),
            not_found: NotFoundPolicy::Status,
            allow_gzip: true,
            allow_deflate: true,
            allow_cache_compressed: true,
            extra_headers: Vec::new(),
            level: STATIC_LEVEL,
        }
    }

    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = prefix.to_string();
        self
    }

    pub fn default_document(mut self, name: &str) -> Self {
        self.default_document = name.to_string();
        self
    }

    pub fn mime_types(mut self, table: MimeTable) -> Self {
        self.mime_types = table;
        self
    }

    pub fn compressible_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compressible_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn redirect_404(mut self, location: &str) -> Self {
        self.not_found = NotFoundPolicy::Redirect(location.to_string());
        self
    }

    pub fn pass_through_missing(mut self) -> Self {
        self.not_found = NotFoundPolicy::PassThrough;
        self
    }

    pub fn allow_gzip(mut self, allow: bool) -> Self {
        self.allow_gzip = allow;
        self
    }

    pub fn allow_deflate(mut self, allow: bool) -> Self {
        self.allow_deflate = allow;
        self
    }

    pub fn allow_cache_compressed(mut self, allow: bool) -> Self {
        self.allow_cache_compressed = allow;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn allowed_compression(&self) -> AllowedCompression {
        AllowedCompression {
            allow_gzip: self.allow_gzip,
            allow_deflate: self.allow_deflate,
        }
    }

    /// Startup checks. Nothing here is re-checked per request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDocumentRoot);
        }
        if !self.url_prefix.starts_with('/') {
            return Err(ConfigError::InvalidPrefix(self.url_prefix.clone()));
        }
        let doc = &self.default_document;
        if doc.is_empty() || doc.contains('/') || doc == "." || doc == ".." {
            return Err(ConfigError::InvalidDefaultDocument(doc.clone()));
        }
        if self.level > 9 {
            return Err(ConfigError::InvalidLevel(self.level));
        }
        for (name, value) in &self.extra_headers {
            let reserved = RESERVED_HEADERS
                .iter()
                .any(|reserved| name.trim().eq_ignore_ascii_case(reserved));
            if reserved
                || name.is_empty()
                || name.contains([':', '\r', '\n'])
                || value.contains(['\r', '\n'])
            {
                return Err(ConfigError::InvalidHeader(format!("{}: {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Headers the site computes per response and never takes from configuration.
const RESERVED_HEADERS: &[&str] = &["Content-Encoding", "Content-Length"];

/// A document root served under a URL prefix. Owns its compressed cache, so
/// several sites can live in one process.
pub struct StaticSite {
    config: StaticSiteConfig,
    cache: CompressedCache,
    compressor: Arc<dyn Compressor>,
}

impl StaticSite {
    pub fn new(config: StaticSiteConfig) -> Result<Self, ConfigError> {
        Self::with_compressor(config, Arc::new(Deflater))
    }

    pub fn with_compressor(
        config: StaticSiteConfig,
        compressor: Arc<dyn Compressor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Static site {} -> {} (gzip: {}, deflate: {}, cache: {})",
            config.url_prefix,
            config.document_root.display(),
            config.allow_gzip,
            config.allow_deflate,
            config.allow_cache_compressed
        );
        Ok(Self {
            config,
            cache: CompressedCache::new(),
            compressor,
        })
    }

    pub fn config(&self) -> &StaticSiteConfig {
        &self.config
    }

    pub fn cache(&self) -> &CompressedCache {
        &self.cache
    }

    pub fn cache_key(&self, target: &str) -> String {
        normalize_request_path(
            target,
            &self.config.url_prefix,
            &self.config.default_document,
        )
    }
}
