use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pi_monitor::{
    actors::{
        scheduler::{SchedulerHandle, SchedulerSettings},
        updates::{UpdatesHandle, UpdatesSettings},
    },
    alerts::{AlertDispatcher, NotificationFanout},
    commands::CommandHandler,
    config::Config,
    monitors::{evaluator::AlertEvaluator, source::SysinfoSource},
    telegram::TelegramClient,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// File with environment variables, loaded before reading the configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("pi_monitor", level), ("pi_monitor_bot", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            // a missing .env in the working directory is fine
            let _ = dotenv::dotenv();
        }
    }

    let config = Arc::new(Config::from_env()?);

    let client = TelegramClient::new(&config.api_url, &config.bot_token)?;
    let me = client
        .get_me()
        .await
        .context("failed to authorize bot")?;
    info!(
        "bot authorized on account {}",
        me.username.as_deref().unwrap_or("<unknown>")
    );

    if config.allowed_users.is_empty() {
        warn!("whitelist disabled: all users can use this bot");
    } else {
        info!("whitelist enabled: {} users allowed", config.allowed_users.len());
    }

    let source = Arc::new(SysinfoSource::new(config.disk_path.clone()));

    let scheduler = if config.should_start_scheduler() {
        let fanout = NotificationFanout::new(Arc::new(client.clone()), config.alerts.delivery_timeout);
        let dispatcher = AlertDispatcher::new(fanout, config.allowed_users.clone());
        let evaluator = AlertEvaluator::new(config.alerts.thresholds, config.alerts.cooldown);

        info!(
            "alert monitoring enabled (users: {}, interval: {:?})",
            config.allowed_users.len(),
            config.alerts.interval
        );
        Some(SchedulerHandle::spawn(
            evaluator,
            source.clone(),
            Arc::new(dispatcher),
            SchedulerSettings::from(&config.alerts),
        ))
    } else if config.alerts.enabled {
        warn!("alert enabled but ALLOWED_USERS not set - alerts disabled");
        None
    } else {
        info!("alert monitoring disabled (set ALERT_ENABLED=true to enable)");
        None
    };

    let updates = UpdatesHandle::spawn(
        client,
        CommandHandler::new(config.clone(), source),
        UpdatesSettings::default(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    updates.shutdown().await;
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    Ok(())
}
