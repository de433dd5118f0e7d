use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use run_tracker_lib::commands::{self, Command};
use run_tracker_lib::config::Config;
use run_tracker_lib::db;
use run_tracker_lib::models::UserId;
use run_tracker_lib::service::RunTracker;
use run_tracker_lib::store::SqliteStore;

#[derive(Parser)]
#[command(
  name = "run-tracker",
  about = "Personal running tracker",
  long_about = "Log and record runs, keep best times per challenge distance and get training insights."
)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// User whose runs to work with (overrides RUN_TRACKER_USER)
  #[arg(long, global = true)]
  user: Option<UserId>,

  /// Database URL override (overrides RUN_TRACKER_DATABASE_URL)
  #[arg(long, global = true)]
  database_url: Option<String>,
}

fn init_logging(fallback_filter: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();
  let config = Config::from_env()?;
  init_logging(&config.log_filter);

  let database_url = cli.database_url.unwrap_or(config.database_url);
  let user = cli.user.unwrap_or(config.user);

  let pool = db::initialize_db(&database_url).await?;
  let tracker = RunTracker::new(SqliteStore::new(pool.clone()));

  let output = commands::execute(cli.command, &tracker, &user).await;
  pool.close().await;

  println!("{}", output?);
  Ok(())
}
