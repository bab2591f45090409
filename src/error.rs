use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockWatchError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Symbol '{0}' is invalid or was not found")]
    SymbolNotFound(String),

    #[error("Quote service error (status {status}): {message}")]
    QuoteService { status: u16, message: String },

    #[error("Quote service rejected the session: {0}")]
    Unauthorized(String),

    #[error("Webhook responded with status {0}")]
    WebhookStatus(u16),

    #[error("SMTP error: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("E-mail message error: {0}")]
    EmailError(#[from] lettre::error::Error),

    #[error("Invalid e-mail address: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("Secret '{0}' is not configured")]
    MissingSecret(String),

    #[error("Tick panicked: {0}")]
    Panicked(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled by shutdown")]
    Cancelled,
}

impl StockWatchError {
    /// Errors worth another attempt: network trouble, server-side failures,
    /// throttling, an expired session and bodies that could not be read.
    pub fn is_retryable(&self) -> bool {
        match self {
            StockWatchError::HttpError(_)
            | StockWatchError::JsonError(_)
            | StockWatchError::IoError(_)
            | StockWatchError::Unauthorized(_) => true,
            StockWatchError::QuoteService { status, .. } => *status >= 500 || *status == 429,
            StockWatchError::SymbolNotFound(_)
            | StockWatchError::WebhookStatus(_)
            | StockWatchError::SmtpError(_)
            | StockWatchError::EmailError(_)
            | StockWatchError::AddressError(_)
            | StockWatchError::MissingSecret(_)
            | StockWatchError::Panicked(_)
            | StockWatchError::InvalidConfig(_)
            | StockWatchError::Cancelled => false,
        }
    }

    /// A misconfigured instrument can never resolve, so monitoring stops.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StockWatchError::SymbolNotFound(_))
    }
}
