// Author: Lukas Bower

use std::sync::Arc;

use clap::Parser;
use ureq::Agent;

use feeddoor::feed::{self, HttpFeedFetcher};
use feeddoor::fetch::{ContentFetcher, HttpContentFetcher};
use feeddoor::server;
use feeddoor::tree::{build_root, Owner};

#[derive(Parser)]
#[command(about = "Serve syndicated feeds as a read-only 9P filesystem")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "localhost:9999")]
    addr: String,
    /// Owner name stamped on every node
    #[arg(long, default_value = "nobody")]
    uid: String,
    /// Group name stamped on every node
    #[arg(long, default_value = "nogroup")]
    gid: String,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
    /// Feed URLs, or page URLs to discover feeds behind
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let agent = Agent::new();
    let mut sources = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        sources.push(feed::resolve_feed_url(&agent, url)?);
    }

    let owner = Owner::new(&args.uid, &args.gid);
    let feeds = HttpFeedFetcher::new();
    let content: Arc<dyn ContentFetcher> = Arc::new(HttpContentFetcher::new());
    let root = build_root(&sources, &owner, &feeds, &content)?;

    server::serve(&args.addr, root)
}
