//! Grid Trading Bot Binary
//!
//! Runs the reconciliation engine against a Binance-style REST gateway,
//! or against the paper-trading gateway when dry-run is set.
//!
//! ## Setup
//!
//! 1. Write a `gridbot.toml`:
//!    ```toml
//!    [trading]
//!    symbol = "BTCUSDT"
//!    investment = 1000.0
//!    lower_bound = 50000.0
//!    upper_bound = 70000.0
//!    ```
//!
//! 2. Put credentials in a `.env` file (or the environment):
//!    ```
//!    GRID_API_KEY=...
//!    GRID_API_SECRET=...
//!    ```
//!
//! 3. Run the bot:
//!    ```bash
//!    cargo run --bin gridbot -- --config gridbot.toml --dry-run
//!    ```
//!
//! CLI flags override the file: `--symbol`, `--investment`, `--dry-run`,
//! and `--fresh` (ignore persisted state).

use std::env;

use log::{error, info, warn};

use gridbot::config::Settings;
use gridbot::grid::{OrderGateway, ReconcileEngine, StateStore};
use gridbot::market::{Credentials, PaperGateway, RestGateway};

struct CliArgs {
    config_path: String,
    symbol: Option<String>,
    investment: Option<f64>,
    dry_run: bool,
    fresh: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: gridbot [--config PATH] [--symbol SYMBOL] [--investment AMOUNT] [--dry-run] [--fresh]"
    );
    std::process::exit(2);
}

fn parse_args() -> CliArgs {
    let mut parsed = CliArgs {
        config_path: "gridbot".to_string(),
        symbol: None,
        investment: None,
        dry_run: false,
        fresh: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => parsed.config_path = path,
                None => usage(),
            },
            "--symbol" => match args.next() {
                Some(symbol) => parsed.symbol = Some(symbol),
                None => usage(),
            },
            "--investment" => match args.next().and_then(|v| v.parse::<f64>().ok()) {
                Some(amount) => parsed.investment = Some(amount),
                None => usage(),
            },
            "--dry-run" => parsed.dry_run = true,
            "--fresh" => parsed.fresh = true,
            _ => usage(),
        }
    }
    parsed
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    // Load .env before the config so credentials can come from it
    let dotenv_loaded = dotenvy::dotenv().ok();

    let mut settings = match Settings::new(&args.config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load config {:?}: {}", args.config_path, e);
            std::process::exit(1);
        }
    };

    // CLI overrides the file
    if let Some(symbol) = args.symbol {
        settings.trading.symbol = symbol;
    }
    if let Some(investment) = args.investment {
        settings.trading.investment = investment;
    }
    settings.trading.dry_run |= args.dry_run;
    settings.trading.ignore_saved_state |= args.fresh;

    // Credentials from the environment win over the file
    if let Ok(key) = env::var("GRID_API_KEY") {
        settings.api.key = key;
    }
    if let Ok(secret) = env::var("GRID_API_SECRET") {
        settings.api.secret = secret;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log.level.as_str()),
    )
    .init();

    match dotenv_loaded {
        Some(path) => info!("loaded environment from {}", path.display()),
        None => info!("no .env file found, using system environment"),
    }

    if let Err(e) = settings.validate() {
        error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("starting grid bot for {}", settings.trading.symbol);
    info!(
        "bounds [{}, {}], investment {}, rebalance every {}h",
        settings.trading.lower_bound,
        settings.trading.upper_bound,
        settings.trading.investment,
        settings.trading.rebalance_interval_hours
    );
    info!("state file: {:?}", settings.state_file());

    let mut rest = RestGateway::new(settings.api.base_url.clone(), settings.trading.symbol.clone());
    if !settings.api.key.is_empty() {
        rest = rest.with_credentials(Credentials {
            api_key: settings.api.key.clone(),
            api_secret: settings.api.secret.clone(),
        });
    }

    if settings.trading.dry_run {
        warn!("dry run: order execution is simulated, nothing reaches the exchange");
        run_engine(PaperGateway::new(rest), &settings).await;
    } else {
        info!("live trading via {}", settings.api.base_url);
        run_engine(rest, &settings).await;
    }
}

async fn run_engine<G: OrderGateway>(gateway: G, settings: &Settings) {
    let builder = match settings.grid_builder() {
        Ok(builder) => builder,
        Err(e) => {
            error!("invalid grid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let store = StateStore::new(settings.state_file());
    let mut engine = ReconcileEngine::new(settings.engine_config(), builder, gateway, store);

    if let Err(e) = engine.run().await {
        error!("engine terminated: {}", e);
        std::process::exit(1);
    }
}
