use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid filter directive {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("logger already installed for this process")]
    AlreadyInstalled,
}

pub type LogResult<T> = Result<T, LogError>;
