//! Serves the mock catalog over http, for running a client against it by hand.
//!
//! ```text
//! pokedex-mock-server --addr 127.0.0.1:31080 --fail 3 --fail 7
//! POKEDEX_URL=http://127.0.0.1:31080 my-app
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use pokedex::mock::MockCatalogServer;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "pokedex-mock-server", about = "Mock catalog server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "POKEDEX_MOCK_ADDR", default_value = "127.0.0.1:31080")]
    addr: SocketAddr,

    /// Record ids whose detail request answers 500 (repeatable)
    #[arg(long = "fail", value_name = "ID")]
    fail: Vec<u32>,

    /// Answer list requests with this status instead of a page
    #[arg(long, value_name = "STATUS")]
    fail_list: Option<u16>,

    /// Increase logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let handle = MockCatalogServer::new().start(args.addr).await?;
    for id in &args.fail {
        handle.fail_detail(*id);
    }
    handle.fail_list(args.fail_list);
    println!("mock catalog server listening on {}", handle.base_url());

    tokio::signal::ctrl_c().await?;
    println!(
        "served {} list and {} detail requests",
        handle.list_hits(),
        handle.detail_hits()
    );
    handle.shutdown().await;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = std::env::var("RUST_LOG").map_or_else(
        |_| {
            let level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(level)
        },
        EnvFilter::new,
    );

    fmt().with_env_filter(filter).init();
}
