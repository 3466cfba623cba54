use clap::Parser;
use std::io;

use gzcache::args::Args;
use gzcache::logging::setup_logging;
use gzcache::server::start_server;

fn main() -> io::Result<()> {
    setup_logging();
    let args = Args::parse();
    start_server(args)
}
