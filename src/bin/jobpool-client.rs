use std::net::SocketAddr;
use std::process::exit;

use clap::{Parser, Subcommand};

use jobpool::JobClient;

const DEFAULT_ADDR: &str = "127.0.0.1:4000";

#[derive(Parser)]
#[command(name = "jobpool-client", version, about = "A job server client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a message on a topic
    Publish {
        /// The topic
        topic: String,
        /// The message body
        body: String,
        /// Server address
        #[arg(long, default_value = DEFAULT_ADDR, value_name = "IP-PORT")]
        addr: SocketAddr,
    },
    /// Check that the server is up
    Ping {
        /// Server address
        #[arg(long, default_value = DEFAULT_ADDR, value_name = "IP-PORT")]
        addr: SocketAddr,
    },
    /// Print the server pool's gauges as JSON
    Stats {
        /// Server address
        #[arg(long, default_value = DEFAULT_ADDR, value_name = "IP-PORT")]
        addr: SocketAddr,
    },
}

fn connect(addr: SocketAddr) -> JobClient {
    JobClient::connect(addr).unwrap_or_else(|e| {
        eprintln!("Failed to connect to server: {}", e);
        exit(1);
    })
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish { topic, body, addr } => {
            if let Err(e) = connect(addr).publish(topic, body) {
                eprintln!("{}", e);
                exit(1);
            }
        }
        Commands::Ping { addr } => match connect(addr).ping() {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                eprintln!("{}", e);
                exit(1);
            }
        },
        Commands::Stats { addr } => {
            let stats = connect(addr).stats().and_then(|stats| {
                serde_json::to_string(&stats).map_err(jobpool::PoolError::from)
            });
            match stats {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("{}", e);
                    exit(1);
                }
            }
        }
    }
}
