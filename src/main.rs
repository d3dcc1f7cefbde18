use std::sync::Arc;

use anyhow::Context;

use intake_desk::channels::{Channel, CliChannel, TelegramChannel};
use intake_desk::config;
use intake_desk::intake::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let (config, script) = config::load().context("failed to load intake settings")?;

    let channel: Arc<dyn Channel> = match std::env::var("TELEGRAM_BOT_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            let telegram = TelegramChannel::new(token.trim().to_string());
            telegram
                .health_check()
                .await
                .context("Telegram bot token rejected")?;
            Arc::new(telegram)
        }
        _ => Arc::new(CliChannel::new()),
    };

    eprintln!("⚖️  Intake desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {}", channel.name());
    eprintln!(
        "   Ticket TTL: {}s, flood window: {}s",
        config.ticket_ttl.as_secs(),
        config.flood_ttl.as_secs()
    );
    eprintln!(
        "   Send pacing: {}ms + up to {}ms",
        config.send_delay.base.as_millis(),
        config.send_delay.jitter.as_millis()
    );
    match config.sweep_interval {
        Some(interval) => eprintln!("   Sweep: every {}s", interval.as_secs()),
        None => eprintln!("   Sweep: disabled"),
    }
    if let Some(path) = &config.script_path {
        eprintln!("   Script: {}", path.display());
    }
    eprintln!();

    let dispatcher = Arc::new(Dispatcher::from_config(&config, script, channel));
    dispatcher.run().await?;

    Ok(())
}
