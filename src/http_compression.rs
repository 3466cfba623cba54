use std::sync::Arc;

use crate::compression::{
    choose_compression, determine_compression, AllowedCompression, Compressor, Deflater,
    RESPONSE_LEVEL,
};
use crate::error::ServeError;
use crate::http::{Body, Request, Response};
use crate::router::{Handler, Outcome};

/// Compresses in-memory response bodies produced by earlier handlers.
/// Nothing is cached.
pub struct HttpCompression {
    allowed: AllowedCompression,
    level: u32,
    compressor: Arc<dyn Compressor>,
}

impl Default for HttpCompression {
    fn default() -> Self {
        Self::new(AllowedCompression::default())
    }
}

impl HttpCompression {
    pub fn new(allowed: AllowedCompression) -> Self {
        Self {
            allowed,
            level: RESPONSE_LEVEL,
            compressor: Arc::new(Deflater),
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }
}

impl Handler for HttpCompression {
    fn handle(&self, request: &Request, response: &mut Response) -> Result<Outcome, ServeError> {
        if response.header("Content-Encoding").is_some() {
            return Ok(Outcome::Ignore);
        }

        let body = match &response.body {
            Body::Bytes(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(Outcome::Ignore),
        };

        let accepted = determine_compression(request.header("Accept-Encoding").unwrap_or(""));
        let Some(encoding) = choose_compression(accepted, self.allowed).encoding() else {
            return Ok(Outcome::Ignore);
        };

        let compressed = self.compressor.compress(body, encoding, self.level)?;
        log::debug!(
            "Compressed response for {} with {}: {} -> {} bytes",
            request.target,
            encoding,
            body.len(),
            compressed.len()
        );

        response.set_header("Content-Encoding", encoding.as_str());
        response.body = Body::Bytes(compressed);
        Ok(Outcome::Continue)
    }
}
