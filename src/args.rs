use clap::Parser;
use std::path::PathBuf;

use crate::compression::{AllowedCompression, RESPONSE_LEVEL, STATIC_LEVEL};
use crate::error::ConfigError;
use crate::static_site::mime::default_compressible_types;
use crate::static_site::{MimeTable, StaticSiteConfig, DEFAULT_DOCUMENT};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Static file server with an in-memory compressed cache", long_about = None)]
pub struct Args {
    #[arg(short, long)]
    pub listen_addr: String,

    #[arg(short, long)]
    pub serve_dir: PathBuf,

    /// URL prefix the site is mounted under
    #[arg(long, default_value = "/")]
    pub url_prefix: String,

    #[arg(long, default_value = DEFAULT_DOCUMENT)]
    pub default_document: String,

    /// Answer missing files with a 302 to this location instead of a 404
    #[arg(long, value_name = "URL", conflicts_with = "pass_through_missing")]
    pub redirect_404: Option<String>,

    /// Hand missing files to the next handler instead of answering 404
    #[arg(long)]
    pub pass_through_missing: bool,

    #[arg(long)]
    pub no_gzip: bool,

    #[arg(long)]
    pub no_deflate: bool,

    /// Recompress on every request instead of caching compressed bodies
    #[arg(long)]
    pub no_cache_compressed: bool,

    /// Compressible content type; repeat to build the allowlist
    #[arg(long = "compress-type", value_name = "MIME")]
    pub compress_types: Vec<String>,

    /// Extension mapping such as `md=text/markdown`; `*=TYPE` sets the fallback
    #[arg(long = "mime", value_name = "EXT=TYPE")]
    pub mime_mappings: Vec<String>,

    /// Header added to every response, `Name: value`
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    #[arg(long, default_value_t = STATIC_LEVEL)]
    pub static_level: u32,

    /// Also compress responses of other handlers
    #[arg(long)]
    pub compress_responses: bool,

    #[arg(long, default_value_t = RESPONSE_LEVEL)]
    pub response_level: u32,
}

impl Args {
    pub fn allowed_compression(&self) -> AllowedCompression {
        AllowedCompression {
            allow_gzip: !self.no_gzip,
            allow_deflate: !self.no_deflate,
        }
    }

    pub fn site_config(&self) -> Result<StaticSiteConfig, ConfigError> {
        let mut mime_types = MimeTable::default();
        for mapping in &self.mime_mappings {
            mime_types.insert_mapping(mapping)?;
        }

        let compressible = if self.compress_types.is_empty() {
            default_compressible_types()
        } else {
            self.compress_types.clone()
        };

        let mut config = StaticSiteConfig::new(&self.serve_dir)
            .url_prefix(&self.url_prefix)
            .default_document(&self.default_document)
            .mime_types(mime_types)
            .compressible_types(compressible)
            .allow_gzip(!self.no_gzip)
            .allow_deflate(!self.no_deflate)
            .allow_cache_compressed(!self.no_cache_compressed)
            .level(self.static_level);

        if let Some(location) = &self.redirect_404 {
            config = config.redirect_404(location);
        } else if self.pass_through_missing {
            config = config.pass_through_missing();
        }

        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            config = config.header(name, value);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_header(raw: &str) -> Result<(&str, &str), ConfigError> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(ConfigError::InvalidHeader(raw.to_string())),
    }
}
