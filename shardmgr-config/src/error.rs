use thiserror::Error;

/// Errors raised while parsing or validating configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid store connection string: {0}")]
    InvalidConnectionString(String),

    #[error("connection string is missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}
