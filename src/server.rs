use std::io::{self, BufReader};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::args::Args;
use crate::error::ConfigError;
use crate::http::Response;
use crate::http_compression::HttpCompression;
use crate::router::Router;
use crate::static_site::StaticSite;
use crate::{http, log_error, log_response};

/// Static site first; the response compressor runs after it when enabled.
pub fn build_router(args: &Args) -> Result<Router, ConfigError> {
    let site = StaticSite::new(args.site_config()?)?;
    let mut router = Router::new().route("GET", &args.url_prefix, site);

    if args.compress_responses {
        if args.response_level > 9 {
            return Err(ConfigError::InvalidLevel(args.response_level));
        }
        let compression =
            HttpCompression::new(args.allowed_compression()).level(args.response_level);
        router = router.route("*", "/", compression);
    }
    Ok(router)
}

pub fn start_server(args: Args) -> io::Result<()> {
    let router = build_router(&args).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let listener = TcpListener::bind(&args.listen_addr)?;
    log::info!("Listening on: {}", listener.local_addr()?);
    log::info!(
        "Serving directory: {} under {}",
        args.serve_dir.display(),
        args.url_prefix
    );

    serve(listener, Arc::new(router))
}

/// Accept loop; one thread per connection.
pub fn serve(listener: TcpListener, router: Arc<Router>) -> io::Result<()> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log_error!(e, "Failed to accept connection");
                continue;
            }
        };
        let router = Arc::clone(&router);

        thread::spawn(move || {
            if let Err(e) = handle_connection(stream, &router) {
                log_error!(e, "Error handling connection");
            }
        });
    }

    Ok(())
}

fn handle_connection(mut client: TcpStream, router: &Router) -> io::Result<()> {
    let start_time = Instant::now();
    if let Ok(peer) = client.peer_addr() {
        log::debug!("New connection from {}", peer);
    }

    let head = {
        let mut buf_reader = BufReader::new(&client);
        http::Request::read_head(&mut buf_reader)
    };
    let request = match head {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            let mut response = Response::default();
            response.reset(400);
            response.write_to(&mut client)?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let response = router.dispatch(&request);
    let status = response.status;
    let encoding = response
        .header("Content-Encoding")
        .unwrap_or("identity")
        .to_string();
    let size = response.body.len();

    response.write_to(&mut client)?;
    log_response!(status, start_time.elapsed(), encoding, size);
    Ok(())
}
