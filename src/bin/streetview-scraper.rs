//! Street View scraper CLI tool
//!
//! Samples points on a country's road network and downloads street-level
//! imagery for them through the streetview-scraper library.

#[cfg(feature = "cli")]
use streetview_scraper::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
