use crate::error::StockWatchError;
use clap::Parser;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SMA_PERIOD: usize = 5;
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Price history keeps this many indicator windows worth of samples.
pub const HISTORY_WINDOWS: usize = 2;

/// Thresholds and indicator window for one monitored instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    symbol: String,
    sell_price: f64,
    buy_price: f64,
    sma_period: usize,
}

impl InstrumentConfig {
    pub fn new(
        symbol: &str,
        sell_price: f64,
        buy_price: f64,
        sma_period: usize,
    ) -> Result<Self, StockWatchError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(StockWatchError::InvalidConfig(
                "symbol must not be empty".to_string(),
            ));
        }
        if !sell_price.is_finite() || !buy_price.is_finite() {
            return Err(StockWatchError::InvalidConfig(format!(
                "{}: thresholds must be finite numbers",
                symbol
            )));
        }
        if sell_price <= buy_price {
            return Err(StockWatchError::InvalidConfig(format!(
                "{}: sell price ({:.2}) must be greater than buy price ({:.2})",
                symbol, sell_price, buy_price
            )));
        }
        if sma_period == 0 {
            return Err(StockWatchError::InvalidConfig(format!(
                "{}: moving average period must be positive",
                symbol
            )));
        }

        Ok(Self {
            symbol,
            sell_price,
            buy_price,
            sma_period,
        })
    }

    /// Appends an exchange suffix such as `.SA` unless the symbol already carries it.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        let suffix = suffix.trim().to_uppercase();
        if !suffix.is_empty() && !self.symbol.ends_with(&suffix) {
            self.symbol.push_str(&suffix);
        }
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn sell_price(&self) -> f64 {
        self.sell_price
    }

    pub fn buy_price(&self) -> f64 {
        self.buy_price
    }

    pub fn sma_period(&self) -> usize {
        self.sma_period
    }

    pub fn history_len(&self) -> usize {
        self.sma_period * HISTORY_WINDOWS
    }
}

/// Parses `SYMBOL:SELL:BUY[:PERIOD]`.
impl FromStr for InstrumentConfig {
    type Err = StockWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(StockWatchError::InvalidConfig(format!(
                "'{}' should look like SYMBOL:SELL:BUY[:PERIOD]",
                s
            )));
        }

        let sell_price = parse_price(parts[1], "sell price")?;
        let buy_price = parse_price(parts[2], "buy price")?;
        let sma_period = match parts.get(3) {
            Some(p) => parse_period(p)?,
            None => DEFAULT_SMA_PERIOD,
        };

        InstrumentConfig::new(parts[0], sell_price, buy_price, sma_period)
    }
}

fn parse_price(raw: &str, what: &str) -> Result<f64, StockWatchError> {
    raw.parse::<f64>()
        .map_err(|e| StockWatchError::InvalidConfig(format!("invalid {} '{}': {}", what, raw, e)))
}

fn parse_period(raw: &str) -> Result<usize, StockWatchError> {
    raw.parse::<usize>().map_err(|e| {
        StockWatchError::InvalidConfig(format!("invalid moving average period '{}': {}", raw, e))
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "stockwatch",
    version,
    about = "Watches instrument prices and raises buy/sell alerts on threshold crossings"
)]
pub struct Args {
    /// Ticker to monitor, e.g. PETR4
    pub symbol: String,

    /// Alert to sell when the price reaches or exceeds this value
    pub sell_price: f64,

    /// Alert to buy when the price reaches or falls below this value
    pub buy_price: f64,

    /// Number of samples in the simple moving average
    #[arg(default_value_t = DEFAULT_SMA_PERIOD)]
    pub sma_period: usize,

    /// Additional instrument as SYMBOL:SELL:BUY[:PERIOD] (repeatable)
    #[arg(long = "watch", value_name = "INSTRUMENT")]
    pub watch: Vec<String>,

    /// Exchange suffix appended to every symbol, e.g. .SA
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Seconds between polling ticks
    #[arg(long, default_value_t = 2)]
    pub interval_secs: u64,

    /// Seconds to wait after an unexpected error before polling again
    #[arg(long, default_value_t = 60)]
    pub cooldown_secs: u64,

    /// Timeout for a single quote request, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Base URL of the quote service
    #[arg(long, default_value = crate::api::yahoo::quote::YAHOO_BASE_URL)]
    pub quote_url: String,

    /// Webhook receiving alert notifications as JSON
    #[arg(long, env = "STOCKWATCH_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// SMTP server used for e-mail alerts
    #[arg(long, env = "STOCKWATCH_SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP port (STARTTLS)
    #[arg(long, env = "STOCKWATCH_SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    /// SMTP login, also used as the sender address
    #[arg(long, env = "STOCKWATCH_SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "STOCKWATCH_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Recipient of e-mail alerts
    #[arg(long, env = "STOCKWATCH_EMAIL_TO")]
    pub email_to: Option<String>,

    /// Log snapshots instead of drawing the terminal table
    #[arg(long)]
    pub plain: bool,

    /// Resolve every symbol once before monitoring and stop on an unknown one
    #[arg(long)]
    pub check_symbols: bool,
}

/// Outgoing mail account for alert e-mails.
#[derive(Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Checked when an alert is sent, not at startup.
    pub password: Option<String>,
    pub recipient: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("recipient", &self.recipient)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub instruments: Vec<Arc<InstrumentConfig>>,
    pub tick_interval: Duration,
    pub error_cooldown: Duration,
    pub request_timeout: Duration,
    pub quote_url: String,
    pub webhook_url: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub plain: bool,
    pub check_symbols: bool,
}

impl Args {
    pub fn into_settings(self) -> Result<MonitorSettings, StockWatchError> {
        let mut configs = vec![InstrumentConfig::new(
            &self.symbol,
            self.sell_price,
            self.buy_price,
            self.sma_period,
        )?];
        for entry in &self.watch {
            configs.push(entry.parse()?);
        }

        let mut seen = HashSet::new();
        let mut instruments = Vec::with_capacity(configs.len());
        for config in configs {
            let config = config.with_suffix(&self.suffix);
            if !seen.insert(config.symbol().to_string()) {
                return Err(StockWatchError::InvalidConfig(format!(
                    "{} is configured more than once",
                    config.symbol()
                )));
            }
            instruments.push(Arc::new(config));
        }

        if self.interval_secs == 0 {
            return Err(StockWatchError::InvalidConfig(
                "polling interval must be at least one second".to_string(),
            ));
        }

        let smtp = self.smtp_settings()?;

        Ok(MonitorSettings {
            instruments,
            tick_interval: Duration::from_secs(self.interval_secs),
            error_cooldown: Duration::from_secs(self.cooldown_secs),
            request_timeout: Duration::from_secs(self.timeout_secs),
            quote_url: self.quote_url,
            webhook_url: self.webhook_url.filter(|url| !url.trim().is_empty()),
            smtp,
            plain: self.plain,
            check_symbols: self.check_symbols,
        })
    }

    /// E-mail alerts are enabled by `--smtp-host`, which then needs a login and a recipient.
    fn smtp_settings(&self) -> Result<Option<SmtpSettings>, StockWatchError> {
        let Some(host) = non_blank(&self.smtp_host) else {
            return Ok(None);
        };
        let username = non_blank(&self.smtp_user).ok_or_else(|| {
            StockWatchError::InvalidConfig("--smtp-user is required with --smtp-host".to_string())
        })?;
        let recipient = non_blank(&self.email_to).ok_or_else(|| {
            StockWatchError::InvalidConfig("--email-to is required with --smtp-host".to_string())
        })?;

        Ok(Some(SmtpSettings {
            host,
            port: self.smtp_port,
            username,
            password: non_blank(&self.smtp_password),
            recipient,
        }))
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_sell_price_below_buy_price() {
        let result = InstrumentConfig::new("PETR4", 10.0, 20.0, 5);
        assert!(matches!(result, Err(StockWatchError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_sell_price_equal_to_buy_price() {
        let result = InstrumentConfig::new("PETR4", 20.0, 20.0, 5);
        assert!(matches!(result, Err(StockWatchError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_period_and_empty_symbol() {
        assert!(InstrumentConfig::new("PETR4", 30.0, 20.0, 0).is_err());
        assert!(InstrumentConfig::new("  ", 30.0, 20.0, 5).is_err());
        assert!(InstrumentConfig::new("PETR4", f64::NAN, 20.0, 5).is_err());
    }

    #[test]
    fn accepts_valid_thresholds_and_normalizes_symbol() {
        let config = InstrumentConfig::new(" petr4 ", 30.0, 20.0, 5).unwrap();
        assert_eq!(config.symbol(), "PETR4");
        assert_eq!(config.history_len(), 10);
    }

    #[test]
    fn suffix_is_appended_once() {
        let config = InstrumentConfig::new("petr4", 30.0, 20.0, 5)
            .unwrap()
            .with_suffix(".sa");
        assert_eq!(config.symbol(), "PETR4.SA");
        assert_eq!(config.with_suffix(".SA").symbol(), "PETR4.SA");
    }

    #[test]
    fn parses_compact_instrument_form() {
        let config: InstrumentConfig = "vale3:70:65.5".parse().unwrap();
        assert_eq!(config.symbol(), "VALE3");
        assert_eq!(config.sell_price(), 70.0);
        assert_eq!(config.buy_price(), 65.5);
        assert_eq!(config.sma_period(), DEFAULT_SMA_PERIOD);

        let config: InstrumentConfig = "VALE3:70:65:12".parse().unwrap();
        assert_eq!(config.sma_period(), 12);

        assert!("VALE3:70".parse::<InstrumentConfig>().is_err());
        assert!("VALE3:abc:65".parse::<InstrumentConfig>().is_err());
    }

    #[test]
    fn builds_settings_from_command_line() {
        let args = Args::try_parse_from([
            "stockwatch",
            "petr4",
            "28.50",
            "27.50",
            "--watch",
            "VALE3:70:65:3",
            "--suffix",
            ".SA",
            "--interval-secs",
            "1",
        ])
        .unwrap();
        let settings = args.into_settings().unwrap();

        let symbols: Vec<&str> = settings.instruments.iter().map(|i| i.symbol()).collect();
        assert_eq!(symbols, vec!["PETR4.SA", "VALE3.SA"]);
        assert_eq!(settings.instruments[0].sma_period(), DEFAULT_SMA_PERIOD);
        assert_eq!(settings.instruments[1].sma_period(), 3);
        assert_eq!(settings.tick_interval, Duration::from_secs(1));
        assert_eq!(settings.error_cooldown, Duration::from_secs(60));
        assert!(settings.smtp.is_none());
    }

    #[test]
    fn smtp_settings_need_login_and_recipient() {
        let args = Args::try_parse_from([
            "stockwatch",
            "PETR4",
            "30",
            "25",
            "--smtp-host",
            "smtp.example.com",
            "--smtp-user",
            "alerts@example.com",
            "--email-to",
            "me@example.com",
        ])
        .unwrap();
        let smtp = args.into_settings().unwrap().smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(smtp.recipient, "me@example.com");

        let args = Args::try_parse_from([
            "stockwatch",
            "PETR4",
            "30",
            "25",
            "--smtp-host",
            "smtp.example.com",
        ])
        .unwrap();
        assert!(matches!(
            args.into_settings(),
            Err(StockWatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn smtp_password_is_redacted_in_debug_output() {
        let smtp = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "alerts@example.com".to_string(),
            password: Some("hunter2".to_string()),
            recipient: "me@example.com".to_string(),
        };
        let debug = format!("{:?}", smtp);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("smtp.example.com"));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let args = Args::try_parse_from(["stockwatch", "PETR4", "30", "25", "--watch", "petr4:31:26"])
            .unwrap();
        assert!(matches!(
            args.into_settings(),
            Err(StockWatchError::InvalidConfig(_))
        ));
    }
}
