use clap::Parser;
use recall::cli::{Cli, Commands};
use recall::config::Config;
use recall::logging;
use recall::memory::MemoryManager;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            let manager = MemoryManager::open(&config)?;
            let report = manager.rebuild().await?;
            info!(
                documents = report.documents,
                chunks = report.chunks,
                reused = report.reused_embeddings,
                "index rebuilt"
            );
        }
        Commands::Query(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            let manager = MemoryManager::open(&config)?;
            manager.load()?;
            let k = opts.limit.unwrap_or(config.retrieval.context_budget);
            let context = manager.context_for_query(&opts.query, opts.user, k).await;
            println!("{context}");
        }
        Commands::Remember(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            let manager = MemoryManager::open(&config)?;
            manager.load()?;
            manager
                .remember(opts.user, &opts.user_message, &opts.assistant_reply)
                .await;
        }
        Commands::Stats(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            let manager = MemoryManager::open(&config)?;
            println!("{}", serde_json::to_string_pretty(&manager.stats())?);
        }
        Commands::Config(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            match opts.action {
                recall::cli::ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                recall::cli::ConfigAction::Validate => {
                    info!("Configuration is valid");
                }
                recall::cli::ConfigAction::Init => {
                    Config::write_default(opts.config.as_deref().unwrap_or("recall.json"))?;
                    info!("Configuration file created");
                }
            }
        }
        Commands::Version => {
            println!("recall {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
