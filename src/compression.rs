use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use std::fmt;
use thiserror::Error;

/// Growth step of the compression output buffer.
pub const OUTPUT_CHUNK: usize = 256;

/// Level used when serving static files.
pub const STATIC_LEVEL: u32 = 9;

/// Level used by the general-purpose response compression handler.
pub const RESPONSE_LEVEL: u32 = 6;

const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CompressionType {
    Gzip,
    Deflate,
    None,
}

impl CompressionType {
    pub fn encoding(&self) -> Option<Encoding> {
        match self {
            CompressionType::Gzip => Some(Encoding::Gzip),
            CompressionType::Deflate => Some(Encoding::Deflate),
            CompressionType::None => None,
        }
    }
}

/// Encodings named by the client in `Accept-Encoding`.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct AcceptedCompression {
    pub supports_gzip: bool,
    pub supports_deflate: bool,
}

/// Encodings the server side is willing to produce.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AllowedCompression {
    pub allow_gzip: bool,
    pub allow_deflate: bool,
}

impl Default for AllowedCompression {
    fn default() -> Self {
        Self {
            allow_gzip: true,
            allow_deflate: true,
        }
    }
}

/// Splits the header on commas and matches trimmed tokens exactly,
/// ignoring case and any `;q=` parameter.
pub fn determine_compression(accept_encoding: &str) -> AcceptedCompression {
    let binding = accept_encoding.to_lowercase();
    let encodings: Vec<&str> = binding
        .split(',')
        .map(|s| s.split(';').next().unwrap_or("").trim())
        .collect();

    AcceptedCompression {
        supports_gzip: encodings.iter().any(|&e| e == "gzip"),
        supports_deflate: encodings.iter().any(|&e| e == "deflate"),
    }
}

/// Gzip wins over deflate when both sides agree on both.
pub fn choose_compression(
    accepted: AcceptedCompression,
    allowed: AllowedCompression,
) -> CompressionType {
    if allowed.allow_gzip && accepted.supports_gzip {
        CompressionType::Gzip
    } else if allowed.allow_deflate && accepted.supports_deflate {
        CompressionType::Deflate
    } else {
        CompressionType::None
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{encoding} compression failed: {source}")]
    Compress {
        encoding: Encoding,
        #[source]
        source: flate2::CompressError,
    },

    #[error("could not grow compression buffer past {0} bytes")]
    Alloc(usize),
}

/// One-shot compressor for whole buffers.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8], encoding: Encoding, level: u32) -> Result<Vec<u8>, CodecError>;
}

/// `flate2` backed compressor producing raw deflate streams, optionally
/// wrapped in a gzip member.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deflater;

impl Compressor for Deflater {
    fn compress(&self, data: &[u8], encoding: Encoding, level: u32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        if encoding == Encoding::Gzip {
            grow(&mut out, GZIP_HEADER.len())?;
            out.extend_from_slice(&GZIP_HEADER);
        }

        deflate_into(data, level.min(9), encoding, &mut out)?;

        if encoding == Encoding::Gzip {
            let mut crc = Crc::new();
            crc.update(data);
            grow(&mut out, 8)?;
            out.extend_from_slice(&crc.sum().to_le_bytes());
            out.extend_from_slice(&crc.amount().to_le_bytes());
        }

        log::trace!(
            "{} level {}: {} -> {} bytes",
            encoding,
            level,
            data.len(),
            out.len()
        );
        Ok(out)
    }
}

fn deflate_into(
    data: &[u8],
    level: u32,
    encoding: Encoding,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let mut stream = Compress::new(Compression::new(level), false);

    loop {
        if out.len() == out.capacity() {
            grow(out, OUTPUT_CHUNK)?;
        }

        let consumed = stream.total_in() as usize;
        let status = stream
            .compress_vec(&data[consumed..], out, FlushCompress::Finish)
            .map_err(|source| CodecError::Compress { encoding, source })?;

        match status {
            Status::StreamEnd => return Ok(()),
            // Output full: the next iteration grows it by one chunk.
            Status::BufError => grow(out, OUTPUT_CHUNK)?,
            Status::Ok => {}
        }
    }
}

fn grow(out: &mut Vec<u8>, additional: usize) -> Result<(), CodecError> {
    out.try_reserve_exact(additional)
        .map_err(|_| CodecError::Alloc(out.len() + additional))
}
