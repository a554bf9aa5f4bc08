mod app;
mod config;
mod report;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relicalc::engine::{CalculateOptions, CalculationTier};
use relicalc::relic::{CalculationContext, RuntimeConditions};

#[derive(Parser, Debug)]
#[command(name = "relicalc")]
#[command(about = "Calculate the attack multiplier of a relic combination")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/relicalc/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// JSON relic catalog, overriding the configured source
  #[arg(long)]
  catalog: Option<PathBuf>,

  /// Relic id to include (repeatable)
  #[arg(short, long = "relic", required = true)]
  relics: Vec<String>,

  /// Enemy type being attacked
  #[arg(long)]
  enemy: Option<String>,

  /// Player health percentage
  #[arg(long)]
  health: Option<f64>,

  /// Current combo count
  #[arg(long, default_value_t = 0)]
  combo: u32,

  /// Whether this is the first hit
  #[arg(long)]
  first_hit: bool,

  /// Active environment (repeatable)
  #[arg(long = "env")]
  environments: Vec<String>,

  /// Night-time bonus
  #[arg(long)]
  night: bool,

  /// Active seasonal effect (repeatable)
  #[arg(long = "season")]
  seasons: Vec<String>,

  /// Active environment bonus (repeatable)
  #[arg(long = "bonus")]
  bonuses: Vec<String>,

  /// Use the offline tiers instead of the full pipeline
  #[arg(long)]
  offline: bool,

  /// Highest offline tier: fallback, basic, intermediate, advanced or full
  #[arg(long)]
  tier: Option<CalculationTier>,

  /// Include a step-by-step trace
  #[arg(long)]
  debug: bool,

  /// Print the result as JSON
  #[arg(long)]
  json: bool,

  /// Also log to stderr
  #[arg(short, long)]
  verbose: bool,
}

impl Args {
  fn conditions(&self) -> RuntimeConditions {
    RuntimeConditions {
      enemy_type: self.enemy.clone(),
      player_health: self.health,
      combo_count: self.combo,
      is_first_hit: self.first_hit,
      environments: self.environments.clone(),
    }
  }

  fn context(&self) -> Option<CalculationContext> {
    let context = CalculationContext {
      is_night: self.night,
      seasonal_effects: self.seasons.clone(),
      environment_bonuses: self.bonuses.clone(),
    };
    (context != CalculationContext::default()).then_some(context)
  }
}

/// File logging under the data dir; stderr too when `verbose`.
fn init_logging(verbose: bool) -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("relicalc");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let file_appender = tracing_appender::rolling::never(&log_dir, "relicalc.log");
  let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = EnvFilter::try_from_env("RELICALC_LOG")
    .unwrap_or_else(|_| EnvFilter::new("relicalc=info"));

  let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);
  let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.verbose)?;

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(tier) = args.tier {
    config.offline.max_tier = tier;
  }

  let app = app::App::new(&config, args.catalog.clone())?;
  app.start().await?;

  let conditions = args.conditions();
  let outcome = if args.offline {
    app.calculate_offline(&args.relics, &conditions).await
  } else {
    let options = CalculateOptions {
      debug: args.debug,
      ..CalculateOptions::default()
    };
    app
      .calculate(&args.relics, &conditions, args.context().as_ref(), options)
      .await
  };
  app.shutdown().await;
  let result = outcome?;

  if args.json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    println!("{}", report::render(&result));
  }

  Ok(())
}
