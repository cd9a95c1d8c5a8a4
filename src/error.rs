use thiserror::Error;

use crate::models::BookingStep;

/// Ошибки доменной логики записи.
#[derive(Debug, Error, PartialEq)]
pub enum BookingError {
    #[error("malformed input: '{0}'")]
    Malformed(String),

    #[error("invalid calendar date: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("no active booking for chat {0}")]
    NoActiveBooking(i64),

    #[error("cannot set {field} while booking is at step {step:?}")]
    OutOfOrder { field: &'static str, step: BookingStep },

    #[error("invalid position {position}, chat has {len} appointments")]
    InvalidPosition { position: usize, len: usize },

    #[error("unknown employee '{0}'")]
    UnknownEmployee(String),

    #[error("unknown service '{0}'")]
    UnknownService(String),
}

impl From<chrono::ParseError> for BookingError {
    fn from(err: chrono::ParseError) -> Self {
        BookingError::Malformed(err.to_string())
    }
}

/// Ошибки загрузки конфигурации.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config has no employees")]
    Empty,

    #[error("name '{0}' does not fit into 64 bytes of callback data")]
    NameTooLong(String),
}
