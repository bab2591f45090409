use clap::Parser;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use stockwatch::api::yahoo::quote::YahooQuoteClient;
use stockwatch::config::Args;
use stockwatch::error::StockWatchError;
use stockwatch::monitor::{Monitor, QuoteFetcher, RetryPolicy, Shutdown};
use stockwatch::notify::{EmailNotifier, LogNotifier, Notifier, WebhookNotifier};
use stockwatch::ui::table::{LogSink, TableSink};
use stockwatch::ui::SnapshotSink;

#[tokio::main]
async fn main() -> ExitCode {
    // Configure logger
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("stockwatch", LevelFilter::Debug)
        .filter_module("reqwest", LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr) // Keep logs off the price table
        .init();

    let args = Args::parse();
    info!("Starting stockwatch...");

    match run(args).await {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("stockwatch stopped: {}", e);
            eprintln!("stockwatch: {}", e);
            if let StockWatchError::SymbolNotFound(_) = e {
                eprintln!("Check the symbol and exchange suffix (e.g. --suffix .SA) and try again.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), StockWatchError> {
    let settings = args.into_settings()?;
    let shutdown = Shutdown::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping...");
                shutdown.trigger();
            }
        }
    });

    let source = YahooQuoteClient::new(&settings.quote_url, settings.request_timeout)?;
    let feed = QuoteFetcher::new(source, RetryPolicy::default(), shutdown.clone());

    let mut notifier: Vec<Box<dyn Notifier>> = Vec::new();
    if let Some(url) = &settings.webhook_url {
        info!("Alerts will be posted to {}", url);
        notifier.push(Box::new(WebhookNotifier::new(url, settings.request_timeout)?));
    }
    if let Some(smtp) = settings.smtp.clone() {
        info!("Alerts will be e-mailed to {} via {}", smtp.recipient, smtp.host);
        notifier.push(Box::new(EmailNotifier::new(smtp, settings.request_timeout)));
    }
    if notifier.is_empty() {
        notifier.push(Box::new(LogNotifier));
    }

    let sink: Box<dyn SnapshotSink> = if settings.plain || !std::io::stdout().is_terminal() {
        Box::new(LogSink)
    } else {
        Box::new(TableSink::stdout(settings.instruments.len())?)
    };

    let mut monitor = Monitor::new(settings.instruments, feed, notifier, sink, shutdown)?
        .with_tick_interval(settings.tick_interval)
        .with_error_cooldown(settings.error_cooldown);

    if settings.check_symbols {
        monitor.check_symbols().await?;
    }

    match monitor.run().await {
        Err(StockWatchError::Cancelled) => Ok(()),
        result => result,
    }
}
