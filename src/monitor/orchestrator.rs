use super::fetcher::PriceFeed;
use super::shutdown::Shutdown;
use super::snapshot::{InstrumentRow, TickSnapshot};
use crate::analysis::alerts::{Alert, AlertEngine, Decision};
use crate::analysis::history::PriceHistory;
use crate::analysis::indicators::simple_moving_average;
use crate::config::InstrumentConfig;
use crate::error::StockWatchError;
use crate::notify::Notifier;
use crate::ui::SnapshotSink;
use chrono::Local;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopping,
    Stopped,
}

/// Everything the monitor tracks for one instrument.
#[derive(Debug)]
pub struct InstrumentState {
    config: Arc<InstrumentConfig>,
    engine: AlertEngine,
    history: PriceHistory,
    previous_price: Option<f64>,
    sma: f64,
    last_decision: Option<Decision>,
}

impl InstrumentState {
    fn new(config: Arc<InstrumentConfig>) -> Self {
        Self {
            engine: AlertEngine::new(Arc::clone(&config)),
            history: PriceHistory::new(config.history_len()),
            config,
            previous_price: None,
            sma: 0.0,
            last_decision: None,
        }
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn sma(&self) -> f64 {
        self.sma
    }

    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    fn row(&self, stale: bool) -> Option<InstrumentRow> {
        let price = self.history.latest()?;
        Some(InstrumentRow {
            symbol: self.config.symbol().to_string(),
            price,
            previous_price: self.previous_price,
            sma: self.sma,
            sell_price: self.config.sell_price(),
            buy_price: self.config.buy_price(),
            stale,
        })
    }
}

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub updated: Vec<String>,
    pub missing: Vec<String>,
    pub alerts: Vec<Alert>,
}

/// Polls prices on a fixed cadence and drives every instrument through its
/// alert engine. Sole owner of all per-instrument state.
pub struct Monitor<F, N, P> {
    feed: F,
    notifier: N,
    sink: P,
    instruments: Vec<InstrumentState>,
    index: HashMap<String, usize>,
    symbols: Vec<String>,
    tick_interval: Duration,
    error_cooldown: Duration,
    shutdown: Shutdown,
    state: MonitorState,
}

impl<F, N, P> Monitor<F, N, P>
where
    F: PriceFeed,
    N: Notifier,
    P: SnapshotSink,
{
    pub fn new(
        instruments: Vec<Arc<InstrumentConfig>>,
        feed: F,
        notifier: N,
        sink: P,
        shutdown: Shutdown,
    ) -> Result<Self, StockWatchError> {
        let mut index = HashMap::with_capacity(instruments.len());
        let mut states = Vec::with_capacity(instruments.len());
        for config in instruments {
            let symbol = config.symbol().to_string();
            if index.insert(symbol.clone(), states.len()).is_some() {
                return Err(StockWatchError::InvalidConfig(format!(
                    "{} is configured more than once",
                    symbol
                )));
            }
            states.push(InstrumentState::new(config));
        }
        let symbols = states.iter().map(|s| s.config.symbol().to_string()).collect();

        Ok(Self {
            feed,
            notifier,
            sink,
            instruments: states,
            index,
            symbols,
            tick_interval: DEFAULT_TICK_INTERVAL,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
            shutdown,
            state: MonitorState::Running,
        })
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_error_cooldown(mut self, cooldown: Duration) -> Self {
        self.error_cooldown = cooldown;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentState> {
        self.index.get(symbol).map(|&i| &self.instruments[i])
    }

    /// Resolves every configured symbol once; the first unknown one is returned
    /// as [`StockWatchError::SymbolNotFound`]. Shutdown ends the check quietly.
    pub async fn check_symbols(&self) -> Result<(), StockWatchError> {
        for symbol in &self.symbols {
            match self.feed.fetch_one(symbol).await {
                Ok(price) => info!("{} resolved at {:.2}", symbol, price),
                Err(StockWatchError::Cancelled) => {
                    info!("Symbol check interrupted by shutdown");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Ticks until shutdown is triggered or a fatal error occurs.
    pub async fn run(&mut self) -> Result<(), StockWatchError> {
        info!(
            "Monitoring {} instrument(s) every {}s: {}",
            self.symbols.len(),
            self.tick_interval.as_secs_f64(),
            self.symbols.join(", ")
        );
        self.state = MonitorState::Running;

        let result = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }

            let outcome = match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(StockWatchError::Panicked(panic_message(panic.as_ref()))),
            };

            match outcome {
                Ok(report) => debug!(
                    "Tick finished: {} updated, {} missing, {} alert(s)",
                    report.updated.len(),
                    report.missing.len(),
                    report.alerts.len()
                ),
                Err(StockWatchError::Cancelled) => break Ok(()),
                Err(e) if e.is_fatal() => {
                    error!("Fatal error, stopping monitor: {}", e);
                    self.shutdown.trigger();
                    break Err(e);
                }
                Err(e) => {
                    error!(
                        "Unexpected error in the monitoring loop, retrying in {}s: {}",
                        self.error_cooldown.as_secs(),
                        e
                    );
                    if !self.shutdown.sleep(self.error_cooldown).await {
                        break Ok(());
                    }
                    continue;
                }
            }

            if !self.shutdown.sleep(self.tick_interval).await {
                break Ok(());
            }
        };

        self.state = MonitorState::Stopping;
        info!("Monitor stopping");
        self.state = MonitorState::Stopped;
        result
    }

    /// One fetch, decide, notify and render cycle.
    pub async fn tick(&mut self) -> Result<TickReport, StockWatchError> {
        let prices = self.feed.fetch_all(&self.symbols).await?;
        let mut report = TickReport::default();

        for state in self.instruments.iter_mut() {
            let symbol = state.config.symbol();
            let Some(&price) = prices.get(symbol) else {
                report.missing.push(symbol.to_string());
                continue;
            };

            state.previous_price = state.history.latest();
            state.history.push(price);
            state.sma = simple_moving_average(state.history.iter(), state.config.sma_period());

            let decision = state.engine.decide(price);
            state.last_decision = Some(decision);
            if let Some(alert) = Alert::from_decision(decision, &state.config, price) {
                let subject = alert.subject();
                let body = alert.body();
                warn!("{}", subject);
                // Delivery is bounded by the notifier's own timeout, shutdown cuts it short.
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        warn!("Shutdown while delivering '{}', alert dropped", subject);
                        return Err(StockWatchError::Cancelled);
                    }
                    _ = self.notifier.send(&subject, &body) => {}
                }
                report.alerts.push(alert);
            }

            report.updated.push(symbol.to_string());
        }

        let snapshot = self.snapshot(&report.missing);
        self.sink.render(&snapshot);

        Ok(report)
    }

    fn snapshot(&self, missing: &[String]) -> TickSnapshot {
        let rows = self
            .instruments
            .iter()
            .filter_map(|state| {
                let stale = missing.iter().any(|m| m == state.config.symbol());
                state.row(stale)
            })
            .collect();

        TickSnapshot {
            taken_at: Local::now(),
            rows,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
