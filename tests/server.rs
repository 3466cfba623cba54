use flate2::read::{DeflateDecoder, GzDecoder};
use gzcache::args::Args;
use gzcache::http_compression::HttpCompression;
use gzcache::router::{from_fn, Outcome, Router};
use gzcache::server::{build_router, serve};
use gzcache::static_site::{StaticSite, StaticSiteConfig};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const PAGE: &str = "<!doctype html><html><body><h1>It works</h1></body></html>\n";

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn decoded_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.header("Content-Encoding") {
            Some("gzip") => {
                GzDecoder::new(&self.body[..]).read_to_end(&mut out).unwrap();
            }
            Some("deflate") => {
                DeflateDecoder::new(&self.body[..])
                    .read_to_end(&mut out)
                    .unwrap();
            }
            None => out = self.body.clone(),
            Some(other) => panic!("unexpected encoding {}", other),
        }
        out
    }
}

fn start(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Arc::new(router);
    thread::spawn(move || serve(listener, router));
    addr
}

fn get(addr: SocketAddr, target: &str, accept_encoding: Option<&str>) -> RawResponse {
    let mut stream = TcpStream::connect(addr).unwrap();
    let mut request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n", target);
    if let Some(value) = accept_encoding {
        request.push_str(&format!("Accept-Encoding: {}\r\n", value));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    parse_response(&raw)
}

fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response head terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let body = raw[split + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .expect("status code");
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body,
    }
}

fn document_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), PAGE).unwrap();
    fs::write(root.path().join("app.css"), "h1 { margin: 0 }\n".repeat(40)).unwrap();
    fs::write(root.path().join("photo.jpg"), [0xff, 0xd8, 0xff, 0xe0, 0, 1, 2, 3, 4]).unwrap();
    root
}

#[test]
fn hello_world_through_compression_handler() {
    let router = Router::new()
        .route(
            "GET",
            "/text",
            from_fn(|_, response| {
                response.set_header("Content-Type", "text/plain");
                response.set_body(b"Hello World!".to_vec());
                Ok(Outcome::Continue)
            }),
        )
        .route("*", "/", HttpCompression::default());
    let addr = start(router);

    let response = get(addr, "/text", Some("gzip,deflate"));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Encoding"), Some("gzip"));
    assert!(!response.body.is_empty());
    assert_eq!(response.decoded_body(), b"Hello World!");
}

#[test]
fn serves_compressed_and_plain_files() {
    let root = document_root();
    let site = StaticSite::new(StaticSiteConfig::new(root.path())).unwrap();
    let addr = start(Router::new().route("GET", "/", site));

    let gz = get(addr, "/index.html", Some("gzip, deflate"));
    assert_eq!(gz.status, 200);
    assert_eq!(gz.header("Content-Type"), Some("text/html"));
    assert_eq!(gz.header("Content-Encoding"), Some("gzip"));
    assert_eq!(
        gz.header("Content-Length"),
        Some(gz.body.len().to_string().as_str())
    );
    assert_eq!(gz.decoded_body(), PAGE.as_bytes());

    let deflate = get(addr, "/app.css", Some("deflate"));
    assert_eq!(deflate.header("Content-Encoding"), Some("deflate"));
    assert_eq!(deflate.decoded_body(), "h1 { margin: 0 }\n".repeat(40).as_bytes());

    let plain = get(addr, "/index.html", None);
    assert_eq!(plain.header("Content-Encoding"), None);
    assert_eq!(plain.body, PAGE.as_bytes());

    let photo = get(addr, "/photo.jpg", Some("gzip"));
    assert_eq!(photo.header("Content-Encoding"), None);
    assert_eq!(photo.header("Content-Length"), Some("9"));
    assert_eq!(photo.body.len(), 9);
}

#[test]
fn normalized_targets_return_identical_bytes() {
    let root = document_root();
    let site = StaticSite::new(StaticSiteConfig::new(root.path())).unwrap();
    let addr = start(Router::new().route("GET", "/", site));

    let reference = get(addr, "/index.html", Some("gzip")).body;
    for target in ["/index.html?x=1", "/index.html?x=1#y", "/"] {
        assert_eq!(get(addr, target, Some("gzip")).body, reference, "{}", target);
    }
}

#[test]
fn missing_files_follow_404_policy() {
    let root = document_root();

    let site = StaticSite::new(StaticSiteConfig::new(root.path())).unwrap();
    let addr = start(Router::new().route("GET", "/", site));
    let response = get(addr, "/missing.html", Some("gzip"));
    assert_eq!(response.status, 404);
    assert!(response.body.is_empty());

    let site =
        StaticSite::new(StaticSiteConfig::new(root.path()).redirect_404("/index.html")).unwrap();
    let addr = start(Router::new().route("GET", "/", site));
    let response = get(addr, "/missing.html", Some("gzip"));
    assert_eq!(response.status, 302);
    assert_eq!(response.header("Location"), Some("/index.html"));
    assert!(response.body.is_empty());
}

#[test]
fn pass_through_reaches_next_handler() {
    let root = document_root();
    let site =
        StaticSite::new(StaticSiteConfig::new(root.path()).pass_through_missing()).unwrap();
    let router = Router::new().route("GET", "/", site).route(
        "GET",
        "/",
        from_fn(|_, response| {
            response.set_body(b"fallback".to_vec());
            Ok(Outcome::Complete)
        }),
    );
    let addr = start(router);

    assert_eq!(get(addr, "/missing.html", None).body, b"fallback");
    assert_eq!(get(addr, "/index.html", None).body, PAGE.as_bytes());
}

#[test]
fn router_from_command_line() {
    let root = document_root();
    let serve_dir = root.path().to_str().unwrap();
    let args = <Args as clap::Parser>::try_parse_from([
        "gzcache",
        "-l",
        "127.0.0.1:0",
        "-s",
        serve_dir,
        "--url-prefix",
        "/static",
        "--no-gzip",
        "-H",
        "X-Served-By: gzcache",
    ])
    .unwrap();
    let addr = start(build_router(&args).unwrap());

    let response = get(addr, "/static/app.css", Some("gzip,deflate"));
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Encoding"), Some("deflate"));
    assert_eq!(response.header("X-Served-By"), Some("gzcache"));

    assert_eq!(get(addr, "/elsewhere/app.css", None).status, 404);
}

#[test]
fn concurrent_clients_get_complete_bodies() {
    let root = document_root();
    let site = StaticSite::new(StaticSiteConfig::new(root.path())).unwrap();
    let addr = start(Router::new().route("GET", "/", site));

    let clients: Vec<_> = (0..8)
        .map(|_| thread::spawn(move || get(addr, "/app.css", Some("gzip")).decoded_body()))
        .collect();

    let expected = "h1 { margin: 0 }\n".repeat(40);
    for client in clients {
        assert_eq!(client.join().unwrap(), expected.as_bytes());
    }
}
