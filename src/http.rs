use std::fs::File;
use std::io::{self, BufRead, Read, Take, Write};
use std::sync::Arc;

/// Upper bound on the request line and headers together.
pub const MAX_HEAD: u64 = 16 * 1024;

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    /// Raw request target, including any query string or fragment.
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Target without query string or fragment.
    pub fn path(&self) -> &str {
        self.target
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.target)
    }

    /// Reads the request line and headers up to the blank line.
    /// Returns `None` when the peer closed the connection before sending anything.
    /// Heads longer than [`MAX_HEAD`] are rejected as `InvalidData`.
    pub fn read_head<R: BufRead>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut reader = reader.by_ref().take(MAX_HEAD);
        let mut first_line = String::new();
        if read_head_line(&mut reader, &mut first_line)? == 0 {
            return Ok(None);
        }
        crate::log_request!(&first_line);

        let mut parts = first_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next()) {
            (Some(method), Some(target)) => (method.to_string(), target.to_string()),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed request line: {}", first_line.trim()),
                ))
            }
        };

        let mut headers = Vec::new();
        let mut line = String::new();
        while {
            line.clear();
            read_head_line(&mut reader, &mut line)?;
            !line.trim().is_empty()
        } {
            log::trace!("Header line: {}", line.trim());
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok(Some(Self {
            method,
            target,
            headers,
        }))
    }
}

fn read_head_line<R: BufRead>(reader: &mut Take<R>, line: &mut String) -> io::Result<usize> {
    let read = reader.read_line(line)?;
    if reader.limit() == 0 && !line.ends_with('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("request head exceeds {} bytes", MAX_HEAD),
        ));
    }
    Ok(read)
}

pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Compressed bytes shared with the cache.
    Shared(Arc<[u8]>),
    /// Streamed from disk when written.
    File { file: File, len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::Shared(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory contents, `None` for file bodies.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[]),
            Body::Bytes(bytes) => Some(bytes.as_slice()),
            Body::Shared(bytes) => Some(&bytes[..]),
            Body::File { .. } => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Body::Shared(b) => write!(f, "Shared({} bytes)", b.len()),
            Body::File { len, .. } => write!(f, "File({} bytes)", len),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Replaces any existing header with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Body::Bytes(body);
    }

    /// Drops headers and body, keeping only the status.
    pub fn reset(&mut self, status: u16) {
        self.status = status;
        self.headers.clear();
        self.body = Body::Empty;
    }

    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        for (key, value) in &self.headers {
            if key.eq_ignore_ascii_case("content-length") || key.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");
        writer.write_all(head.as_bytes())?;

        match self.body {
            Body::Empty => {}
            Body::Bytes(bytes) => writer.write_all(&bytes)?,
            Body::Shared(bytes) => writer.write_all(&bytes)?,
            Body::File { file, len } => {
                let copied = io::copy(&mut io::Read::take(file, len), writer)?;
                if copied != len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file shrank while sending: {} of {} bytes", copied, len),
                    ));
                }
            }
        }
        writer.flush()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}
