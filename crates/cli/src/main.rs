mod commands;
mod output;

use clap::{Parser, Subcommand};
use jobq::config::Config;
use jobq::db;
use jobq::jobs::JobStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobq", version, about = "Persistent priority queue of shell commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a command to the queue
    Add {
        /// The shell command to queue
        job_command: String,
        /// Priority 1-5 where 5 is the highest (default 3)
        #[arg(short, long)]
        priority: Option<i64>,
    },
    /// Remove a waiting entry from the queue
    Remove {
        job_id: i64,
    },
    /// Clear the whole queue (running jobs are kept)
    Clear {
        /// Must be set to really clear the queue
        #[arg(long)]
        force: bool,
    },
    /// Show queued and running jobs
    List {
        /// Machine readable output
        #[arg(long)]
        json: bool,
    },
    /// Repair stalled jobs and remove old finished ones
    Cleanup,
    /// Run the next waiting job in the foreground, if a slot is free
    Process,
    /// Run a single job from the queue (spawned by the runner)
    #[command(hide = true)]
    Run {
        job_id: i64,
    },
    /// The long-lived queue runner
    Runner,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    let pool = db::make_pool(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;
    let store = JobStore::new(pool);

    let exit_code = match cli.command {
        Commands::Add { job_command, priority } => {
            commands::add(&store, &cfg, &job_command, priority).await?
        }
        Commands::Remove { job_id } => commands::remove(&store, &cfg, job_id).await?,
        Commands::Clear { force } => commands::clear(&store, &cfg, force).await?,
        Commands::List { json } => commands::list(&store, &cfg, json).await?,
        Commands::Cleanup => commands::cleanup(&store, &cfg).await?,
        Commands::Process => commands::process(&store, &cfg).await?,
        Commands::Run { job_id } => commands::run(&store, &cfg, job_id).await?,
        Commands::Runner => commands::runner(&store, &cfg).await?,
    };

    std::process::exit(exit_code);
}
