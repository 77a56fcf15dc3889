//! ipfilter: inspect range lists and routing decisions from the command line.

use clap::{Parser, Subcommand};
use ipfilter::dialer::{Dialer, DirectDialer, Route};
use ipfilter::filter::read_range_list_file;
use ipfilter::{Logger, RouterConfig};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ipfilter")]
#[command(version)]
#[command(about = "Check IP range lists and address routing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test addresses against a range list
    Check {
        /// Range list file (.gz for gzip)
        #[arg(short, long)]
        list: PathBuf,

        /// Addresses to test
        #[arg(required = true)]
        addrs: Vec<IpAddr>,
    },

    /// Print bucket statistics for a range list
    Stats {
        /// Range list file (.gz for gzip)
        #[arg(short, long)]
        list: PathBuf,
    },

    /// Show which filter a router config would pick for each address
    Route {
        /// Router YAML config
        #[arg(short, long)]
        config: PathBuf,

        /// Destinations in host:port form
        #[arg(required = true)]
        addresses: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { list, addrs } => check(&list, &addrs),
        Commands::Stats { list } => stats(&list),
        Commands::Route { config, addresses } => route(&config, &addresses),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn check(list: &PathBuf, addrs: &[IpAddr]) -> Result<(), Box<dyn std::error::Error>> {
    let index = read_range_list_file(list, &Logger::global("ipfilter"))?;

    for addr in addrs {
        match index.find(*addr) {
            Some(range) => println!("{} matched {}", addr, range),
            None => println!("{} unmatched", addr),
        }
    }
    Ok(())
}

fn stats(list: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let index = read_range_list_file(list, &Logger::global("ipfilter"))?;
    let stats = index.stats();

    println!("entries:     {}", stats.entries);
    println!("word bucket: {} key(s), {} range(s)", stats.word_keys, stats.word_ranges);
    println!("byte bucket: {} key(s), {} range(s)", stats.byte_keys, stats.byte_ranges);
    println!("unindexed:   {} range(s)", stats.coarse_ranges);
    Ok(())
}

fn route(config: &PathBuf, addresses: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = RouterConfig::from_file(config)?;

    // Only the decision is printed, so every named dialer can be the same.
    let direct: Arc<dyn Dialer> = Arc::new(DirectDialer::new());
    let dialers: HashMap<String, Arc<dyn Dialer>> = config
        .dialer_names()
        .into_iter()
        .map(|name| (name.to_string(), direct.clone()))
        .collect();

    let router = config.build(direct, &dialers, Logger::global("ipfilter"))?;

    for address in addresses {
        match router.route(address) {
            Ok(Route::Filter(i)) => {
                let pair = &router.filters()[i];
                println!("{} -> {} (dialer {})", address, pair.name(), config.filters[i].dialer);
            }
            Ok(Route::Default) => println!("{} -> default", address),
            Err(e) => println!("{} -> error: {}", address, e),
        }
    }
    Ok(())
}
