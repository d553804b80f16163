#[macro_use] extern crate log;

use std::time::Duration;

use clap::Parser;

use staticd::config::Config;
use staticd::logger;
use staticd::server::Server;
use staticd::utils::ResultV;


const MODULE: &str = "MAIN";

/// Minimal HTTP/1.1 server for static files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the configurational file
    config_fn: String,
}

fn main() -> ResultV {
    let args = Args::parse();
    let cfg = Config::load(&args.config_fn).map_err(|e| {
        eprintln!("Could not load config from {}: {}", args.config_fn, e);
        "config error"
    })?;
    logger::init_logger(&cfg.log);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    info!("[{}] Starting staticd service at {}", MODULE, addr);
    info!("[{}] Config loaded from {}", MODULE, args.config_fn);

    let server = Server::new(&addr, &cfg.server.doc_root)
        .with_timeout(Duration::from_secs(cfg.server.timeout_secs));

    server.listen_and_serve().map_err(|e| {
        error!("[{}] Could not start server at {}: {}", MODULE, addr, e);
        "init server error"
    })
}
