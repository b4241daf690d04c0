use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] store::StorageError),
    #[error("api error: {0}")]
    Api(#[from] store::ApiError),
    #[error("terminal error: {0}")]
    Terminal(String),
    /// A store action reported failure; holds the store's message.
    #[error("{0}")]
    Action(String),
}
