use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use tweetfreq::commands;
use tweetfreq::storage::{KvStore, RedisStore};

#[derive(Parser, Debug)]
#[command(
    name = "tweetfreq",
    version,
    about = "Analyze word and date frequency of Twitter timelines",
    long_about = "Retrieves a user's full timeline, derives word and date \
                  frequency statistics, and caches the report in a shared store"
)]
struct Cli {
    /// Redis connection URL for the shared cache
    #[arg(
        long,
        env = "TWEETFREQ_REDIS_URL",
        default_value = "redis://127.0.0.1:6379",
        global = true
    )]
    redis_url: String,

    /// Prefix for all keys in the shared store, to avoid naming conflicts
    #[arg(
        long,
        env = "TWEETFREQ_NAMESPACE",
        default_value = "tweetfreq",
        global = true
    )]
    namespace: String,

    /// Hours a completed report stays cached
    #[arg(
        long,
        env = "TWEETFREQ_CACHE_HOURS",
        default_value = "1",
        global = true
    )]
    cache_hours: u64,

    /// Twitter API bearer token (falls back to the token stored by init)
    #[arg(long, env = "TWEETFREQ_BEARER_TOKEN", global = true)]
    bearer_token: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obtain and store an application bearer token, then prime the rate
    /// limit counters
    Init {
        app_key: String,
        app_secret: String,
    },

    /// Run the analysis job for a user and print the cached report
    Analyze {
        /// Twitter username (with or without @ symbol)
        #[arg(required = true)]
        username: String,
    },

    /// Show the cached job state for a user, queueing it on first contact
    Status {
        /// Twitter username (with or without @ symbol)
        #[arg(required = true)]
        username: String,
    },

    /// Print a word frequency ranking for a user's timeline
    Words {
        /// Twitter username (with or without @ symbol)
        #[arg(required = true)]
        username: String,

        /// Inclusive minimum occurrence count
        #[arg(long)]
        minimum: Option<u64>,

        /// Inclusive maximum occurrence count
        #[arg(long)]
        maximum: Option<u64>,

        /// Maximum number of ranked words to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print per-day tweet counts for a user's timeline
    Dates {
        /// Twitter username (with or without @ symbol)
        #[arg(required = true)]
        username: String,

        /// Inclusive minimum date (YYYY-MM-DD)
        #[arg(long)]
        minimum: Option<String>,

        /// Inclusive maximum date (YYYY-MM-DD)
        #[arg(long)]
        maximum: Option<String>,

        /// Maximum number of dates to print
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Cli::parse();

    if args.verbose {
        debug!("Verbose mode enabled");
    }

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisStore::connect(&args.redis_url)
            .await
            .with_context(|| format!("Failed to connect to {url}", url = args.redis_url))?,
    );

    match args.command {
        Commands::Init {
            app_key,
            app_secret,
        } => commands::init::execute(&app_key, &app_secret, &kv, &args.namespace).await?,
        Commands::Analyze { username } => {
            commands::analyze::execute(
                &username,
                &kv,
                &args.namespace,
                args.cache_hours,
                args.bearer_token.as_deref(),
            )
            .await?
        }
        Commands::Status { username } => {
            commands::status::execute(&username, &kv, &args.namespace, args.cache_hours).await?
        }
        Commands::Words {
            username,
            minimum,
            maximum,
            limit,
        } => {
            commands::words::execute(
                &username,
                minimum,
                maximum,
                limit,
                &kv,
                &args.namespace,
                args.bearer_token.as_deref(),
            )
            .await?
        }
        Commands::Dates {
            username,
            minimum,
            maximum,
            limit,
        } => {
            commands::dates::execute(
                &username,
                minimum,
                maximum,
                limit,
                &kv,
                &args.namespace,
                args.bearer_token.as_deref(),
            )
            .await?
        }
    }

    Ok(())
}
