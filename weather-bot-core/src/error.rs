//! Error types for each stage of the forecast pipeline.

use thiserror::Error;

/// Failures talking to the weather provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS failure, refused connection, timeout or an interrupted body.
    #[error("Connection to weather provider failed: {0}")]
    ConnectionFailed(String),

    #[error("Weather provider returned status code {0}")]
    IncorrectStatusCode(u16),

    #[error("Cannot decode weather provider response (status {status}): {reason}")]
    CannotDecodeResponse { status: u16, reason: String },
}

/// Failures of the coordinate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or is busy. Retryable.
    #[error("Coordinate storage unreachable: {0}")]
    Connection(String),

    /// Schema or integrity failure. Not retryable.
    #[error("Coordinate storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Connection(err.to_string())
            }
            _ => Self::Storage(err.to_string()),
        }
    }
}

/// Failures turning forecast rows into text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Forecast contains no rows")]
    EmptyForecast,

    #[error("Unknown wind direction code {0}")]
    Lookup(i64),
}

/// Everything that can go wrong while answering a user.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("No location known for user {0}")]
    NoLocationKnown(i64),

    #[error("Coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ForecastError {
    /// Text shown to the chat user instead of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoLocationKnown(_) => {
                "Please share your location first, then pick a forecast from the menu.".to_string()
            }
            Self::InvalidCoordinates { .. } => {
                "That location does not look right. Please share it again.".to_string()
            }
            Self::Fetch(FetchError::ConnectionFailed(_)) => {
                "Could not reach the weather service. Please try again later.".to_string()
            }
            Self::Fetch(FetchError::IncorrectStatusCode(_)) => {
                "The weather service is unavailable right now.".to_string()
            }
            Self::Fetch(FetchError::CannotDecodeResponse { .. }) => {
                "The weather service sent a response we could not read.".to_string()
            }
            Self::Store(StoreError::Connection(_)) => {
                "Location storage is temporarily unavailable. Please try again later.".to_string()
            }
            Self::Store(StoreError::Storage(_)) => {
                "Something went wrong while looking up your location.".to_string()
            }
            Self::Render(RenderError::EmptyForecast) => {
                "No forecast data is available for your location right now.".to_string()
            }
            Self::Render(RenderError::Lookup(_)) => {
                "Something went wrong while preparing the forecast.".to_string()
            }
        }
    }

    /// Whether re-sending the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch(FetchError::ConnectionFailed(_)) | Self::Store(StoreError::Connection(_))
        )
    }
}
