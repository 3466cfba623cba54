use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::mime::is_compressible;
use super::path_utils::resolve_file;
use super::{NotFoundPolicy, StaticSite};
use crate::compression::{choose_compression, determine_compression, CompressionType, Encoding};
use crate::error::ServeError;
use crate::http::{Body, Request, Response};
use crate::logging::LoggingExt;
use crate::router::{Handler, Outcome};

impl StaticSite {
    /// Builds the response for `target`. `None` means the file is missing
    /// and the site passes such requests on to the next handler.
    pub fn resolve(
        &self,
        target: &str,
        accept_encoding: &str,
    ) -> Result<Option<Response>, ServeError> {
        let start_time = Instant::now();
        let key = self.cache_key(target);
        let content_type = self.config.mime_types.lookup(&self.mime_source(&key));
        log::debug!("Resolving {} as {} ({})", target, key, content_type);

        let mut compression = choose_compression(
            determine_compression(accept_encoding),
            self.config.allowed_compression(),
        );
        if compression != CompressionType::None
            && !is_compressible(&content_type, &self.config.compressible_types)
        {
            log::debug!("{} is not compressible, serving as-is", content_type);
            compression = CompressionType::None;
        }

        let response = match compression.encoding() {
            None => self.serve_plain(&key, &content_type)?,
            Some(encoding) => self.serve_compressed(&key, &content_type, encoding)?,
        };

        log::debug!("Resolved {} in {:?}", key, start_time.elapsed());
        Ok(response)
    }

    /// Drops the cached bodies of `target`. Returns the number of entries removed.
    pub fn invalidate(&self, target: &str) -> usize {
        let key = self.cache_key(target);
        let removed = self.cache.invalidate(&key);
        log::info!("Invalidated {} cached entries for {}", removed, key);
        removed
    }

    pub fn clear_cache(&self) {
        log::info!("Clearing compressed cache for {}", self.config.url_prefix);
        self.cache.clear();
    }

    pub fn cached_entries(&self, encoding: Encoding) -> usize {
        self.cache.len(encoding)
    }

    /// Directories take their type from the default document inside them.
    fn mime_source(&self, key: &str) -> PathBuf {
        let path = PathBuf::from(key);
        if self.config.document_root.join(&path).is_dir() {
            path.join(&self.config.default_document)
        } else {
            path
        }
    }

    /// Streams the file without touching the cache or its lock.
    fn serve_plain(&self, key: &str, content_type: &str) -> Result<Option<Response>, ServeError> {
        let Some(path) = self.locate(key)? else {
            return Ok(self.not_found(key));
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(self.not_found(key)),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();

        Ok(Some(self.found(content_type, None, Body::File { file, len })))
    }

    /// Cache lookup, and on a miss the read, compression and insert, all
    /// under the cache lock.
    fn serve_compressed(
        &self,
        key: &str,
        content_type: &str,
        encoding: Encoding,
    ) -> Result<Option<Response>, ServeError> {
        let mut maps = self.cache.lock();

        if self.config.allow_cache_compressed {
            if let Some(bytes) = maps.get(encoding, key) {
                log::debug!("Cache hit for {} ({})", key, encoding);
                return Ok(Some(self.found(
                    content_type,
                    Some(encoding),
                    Body::Shared(bytes),
                )));
            }
        }

        let Some(path) = self.locate(key)? else {
            return Ok(self.not_found(key));
        };

        let content = match path.as_path().log_operation("read", || fs::read(&path)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(self.not_found(key)),
            Err(e) => return Err(e.into()),
        };

        let compressed = key.log_operation("compress", || {
            self.compressor
                .compress(&content, encoding, self.config.level)
        })?;
        log::debug!(
            "Compressed {} with {}: {} -> {} bytes",
            key,
            encoding,
            content.len(),
            compressed.len()
        );

        let body = if self.config.allow_cache_compressed {
            Body::Shared(maps.insert(encoding, key, compressed))
        } else {
            Body::Bytes(compressed)
        };
        drop(maps);

        Ok(Some(self.found(content_type, Some(encoding), body)))
    }

    fn locate(&self, key: &str) -> Result<Option<PathBuf>, ServeError> {
        let root: &Path = &self.config.document_root;
        Ok(resolve_file(root, key, &self.config.default_document)?)
    }

    fn found(&self, content_type: &str, encoding: Option<Encoding>, body: Body) -> Response {
        let mut response = Response {
            status: 200,
            headers: Vec::new(),
            body,
        };
        response.set_header("Content-Type", content_type);
        if let Some(encoding) = encoding {
            response.set_header("Content-Encoding", encoding.as_str());
        }
        self.apply_extra_headers(&mut response);
        response
    }

    fn not_found(&self, key: &str) -> Option<Response> {
        let mut response = Response::default();
        match &self.config.not_found {
            NotFoundPolicy::Status => {
                log::debug!("{} not found, responding 404", key);
                response.status = 404;
            }
            NotFoundPolicy::Redirect(location) => {
                log::debug!("{} not found, redirecting to {}", key, location);
                response.status = 302;
                response.set_header("Location", location);
            }
            NotFoundPolicy::PassThrough => {
                log::debug!("{} not found, passing on", key);
                return None;
            }
        }
        self.apply_extra_headers(&mut response);
        Some(response)
    }

    fn apply_extra_headers(&self, response: &mut Response) {
        for (name, value) in &self.config.extra_headers {
            response.set_header(name, value);
        }
    }
}

impl Handler for StaticSite {
    fn handle(&self, request: &Request, response: &mut Response) -> Result<Outcome, ServeError> {
        let accept_encoding = request.header("Accept-Encoding").unwrap_or("");
        match self.resolve(&request.target, accept_encoding)? {
            Some(resolved) => {
                *response = resolved;
                Ok(Outcome::Complete)
            }
            None => Ok(Outcome::Ignore),
        }
    }
}
