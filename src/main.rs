use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use feedwell::config::Config;
use feedwell::fetch::{FeedClient, FetchOptions};
use feedwell::normalize::{NormalizeOptions, PostProcessRule};

/// Get the config directory path (~/.config/feedwell/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("feedwell");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "feedwell",
    about = "Fetch feeds through a feed request service and print normalized articles"
)]
struct Args {
    /// Config file (defaults to ~/.config/feedwell/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a feed and print the raw service response
    Fetch {
        url: String,

        /// Ask the service to fetch the origin if nothing is cached
        #[arg(long)]
        execute: bool,

        /// Attempts for this call, overriding the config
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
    },
    /// Print every normalized article of a feed
    Articles {
        url: String,
        #[command(flatten)]
        normalize: NormalizeArgs,
    },
    /// Print the article with the given id
    Article {
        url: String,
        id: String,
        #[command(flatten)]
        normalize: NormalizeArgs,
    },
    /// Print one article chosen at random
    Random {
        url: String,
        #[command(flatten)]
        normalize: NormalizeArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct NormalizeArgs {
    /// IANA timezone for dates (e.g. Europe/Paris)
    #[arg(long, value_name = "TZ")]
    tz: Option<String>,

    /// strftime pattern for dates
    #[arg(long, value_name = "PATTERN")]
    date_format: Option<String>,

    /// Post-processing rule to apply (repeatable)
    #[arg(long = "rule", value_name = "TAG")]
    rules: Vec<PostProcessRule>,
}

impl NormalizeArgs {
    fn into_options(self, config: &Config) -> NormalizeOptions {
        let mut format_options = config.format_options();
        if self.tz.is_some() {
            format_options.date_timezone = self.tz;
        }
        if self.date_format.is_some() {
            format_options.date_format = self.date_format;
        }
        NormalizeOptions {
            format_options,
            use_parser_rules: self.rules,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn print_pending(url: &str) {
    eprintln!("Feed request for {} is pending; try again shortly.", url);
}

async fn run(client: FeedClient, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Fetch {
            url,
            execute,
            retries,
        } => {
            let options = FetchOptions {
                execute_if_not_cached: execute,
                retries,
            };
            match client
                .fetch(&url, options)
                .await
                .with_context(|| format!("Failed to fetch {}", url))?
            {
                Some(response) => print_json(&response)?,
                None => print_pending(&url),
            }
        }
        Command::Articles { url, normalize } => {
            let options = normalize.into_options(config);
            match client
                .fetch_feed_articles(&url, &options)
                .await
                .with_context(|| format!("Failed to load articles from {}", url))?
            {
                Some(articles) => print_json(&articles)?,
                None => print_pending(&url),
            }
        }
        Command::Article { url, id, normalize } => {
            let options = normalize.into_options(config);
            let article = client
                .fetch_feed_article(&url, &id, &options)
                .await
                .with_context(|| format!("Failed to load article {} from {}", id, url))?;
            print_json(&article)?;
        }
        Command::Random { url, normalize } => {
            let options = normalize.into_options(config);
            match client
                .fetch_random_feed_article(&url, &options)
                .await
                .with_context(|| format!("Failed to load articles from {}", url))?
            {
                Some(article) => print_json(&article)?,
                None => eprintln!("Feed {} has no articles.", url),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(config = ?config, "Using configuration");

    let client = config
        .build_client()
        .context("Failed to set up the fetch service client")?;

    run(client, &config, args.command).await
}
