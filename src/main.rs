use std::error::Error;

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};

use peerd::{Endpoints, NeighborSpec, Router, RouterConfig};

#[derive(Parser, Debug)]
#[clap(name = "peerd", rename_all = "kebab-case")]
/// Relationship-aware route exchange daemon
pub struct Args {
    /// Autonomous system number for this router
    asn: u32,
    /// Neighbors as <udp-port>-<address>-<cust|peer|prov>
    #[clap(required = true)]
    neighbors: Vec<NeighborSpec>,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    pub verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (peerd_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        3 | _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("peerd"), peerd_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", peerd_level, other_level);

    let config = RouterConfig::new(args.asn, args.neighbors);
    info!(
        "Router at AS {} starting up with {} neighbors",
        config.asn,
        config.neighbors.len()
    );

    let mut endpoints = Endpoints::bind(&config.neighbors).await?;
    let mut router = Router::new(&config);
    router.run(&mut endpoints).await;
    Ok(())
}
