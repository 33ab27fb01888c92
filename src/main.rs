// summary-sync command line.
// Reads one dashboard resource through the query cache and prints it as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

use summary_sync::api::{StoredSummaryFilter, SummarySource};
use summary_sync::queries::{feeds, guilds, health, prompts, schedules, summaries};
use summary_sync::{ApiClient, Config, Coordinator, QueryDescriptor, Result, telemetry};

#[derive(Parser, Debug)]
#[command(name = "summary-sync", version, about = "Summary bot dashboard client", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dashboard server URL, overriding the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Server health
    Health,
    /// Guilds the bot is installed in
    Guilds,
    /// One guild with its channels and config
    Guild { id: String },
    /// RSS/Atom feeds of a guild
    Feeds { guild: String },
    /// Summary schedules of a guild
    Schedules { guild: String },
    /// Stored summaries of a guild
    Summaries {
        guild: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        pinned: Option<bool>,
        #[arg(long)]
        archived: Option<bool>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value_t = SummarySource::All)]
        source: SummarySource,
    },
    /// Built-in prompts, or one category
    Prompts { category: Option<String> },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("summary-sync: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = telemetry::init(&config.logging) {
        eprintln!("summary-sync: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("summary-sync: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api = config.api.with_base_url(url.clone());
        config.validate()?;
    }
    Ok(config)
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let api = ApiClient::new(&config.api)?;
    let coordinator = Coordinator::start(config.cache.clone())?;

    let result = match command {
        Command::Health => show(&coordinator, &health::health(&api)).await,
        Command::Guilds => show(&coordinator, &guilds::guilds(&api)).await,
        Command::Guild { id } => show(&coordinator, &guilds::guild(&api, Some(&id))).await,
        Command::Feeds { guild } => show(&coordinator, &feeds::feeds(&api, Some(&guild))).await,
        Command::Schedules { guild } => {
            show(&coordinator, &schedules::schedules(&api, Some(&guild))).await
        }
        Command::Summaries {
            guild,
            page,
            limit,
            pinned,
            archived,
            tags,
            source,
        } => {
            let filter = StoredSummaryFilter {
                page,
                limit,
                pinned,
                archived,
                tags,
                source,
            };
            show(
                &coordinator,
                &summaries::stored_summaries(&api, Some(&guild), filter),
            )
            .await
        }
        Command::Prompts { category: None } => {
            show(&coordinator, &prompts::default_prompts(&api)).await
        }
        Command::Prompts {
            category: Some(category),
        } => show(&coordinator, &prompts::default_prompt(&api, Some(&category))).await,
    };

    coordinator.shutdown();
    result
}

/// Load the query through the cache and print its value.
async fn show<T>(coordinator: &Coordinator, query: &QueryDescriptor<T>) -> Result<()>
where
    T: Serialize + Send + Sync + 'static,
{
    let data = coordinator.fetch_query(query).await?;
    println!("{}", serde_json::to_string_pretty(data.as_ref())?);
    Ok(())
}
