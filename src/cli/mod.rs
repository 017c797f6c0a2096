use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "recall", version, about = "Retrieval-augmented memory store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the index from the knowledge corpus.
    Build(BuildOpts),
    /// Print the grounding context assembled for a query.
    Query(QueryOpts),
    /// Append one user/assistant exchange to conversational memory.
    Remember(RememberOpts),
    /// Print index stats as JSON.
    Stats(StatsOpts),
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct BuildOpts {
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(clap::Args)]
pub struct QueryOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    pub query: String,
    /// Requesting user, scopes conversational memories.
    #[arg(short, long)]
    pub user: i64,
    /// Context budget; defaults to the configured value.
    #[arg(short = 'k', long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args)]
pub struct RememberOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long)]
    pub user: i64,
    pub user_message: String,
    pub assistant_reply: String,
}

#[derive(clap::Args)]
pub struct StatsOpts {
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}
