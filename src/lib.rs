//! Static file server that keeps gzip/deflate bodies in memory.

pub mod args;
pub mod compression;
pub mod error;
pub mod http;
pub mod http_compression;
pub mod logging;
pub mod router;
pub mod server;
pub mod static_site;
