use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use conditiond_rs::cli::run_batch;
use conditiond_rs::condition::{parse_with_limits, stringify};
use conditiond_rs::config::Config;
use conditiond_rs::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "conditiond.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve evaluations over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        listen: SocketAddr,
    },
    /// Evaluate a stream of {condition, context} messages
    Batch {
        /// Input file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Output file, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Print the effective configuration
    Config,
    /// Print the parsed tree of an expression
    Tree {
        /// The condition expression
        expression: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = Config::load(&args.config)?;
    config.validate()?;

    match args.command {
        Commands::Serve { listen } => {
            let state = Arc::new(AppState {
                evaluator: config.build_evaluator()?,
                limits: config.limits,
            });
            server::serve(listen, state).await?;
        }
        Commands::Batch { input, output } => {
            let evaluator = config.build_evaluator()?;

            let reader: Box<dyn io::BufRead> = if input == "-" {
                Box::new(io::stdin().lock())
            } else {
                let file = File::open(&input)
                    .with_context(|| format!("unable to open input file {}", input))?;
                Box::new(BufReader::new(file))
            };

            let writer: Box<dyn io::Write> = if output == "-" {
                Box::new(io::stdout().lock())
            } else {
                let file = File::create(&output)
                    .with_context(|| format!("unable to open output file {}", output))?;
                Box::new(BufWriter::new(file))
            };

            run_batch(&evaluator, &config.limits, reader, writer)?;
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
        }
        Commands::Tree { expression } => {
            let root = parse_with_limits(&expression, &config.limits)?;
            print!("{}", stringify(&root));
        }
    }

    Ok(())
}
