use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not signed in. Run `covera login` first.")]
    NotSignedIn,

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),

    #[error("{}", .0)]
    Client(#[from] covera_core::ClientError),

    #[error("{}", .0)]
    Aggregation(#[from] covera_core::aggregation::AggregationError),
}

impl Error {
    /// Whether the failure means the stored session is gone.
    pub fn needs_login(&self) -> bool {
        match self {
            Error::NotSignedIn => true,
            Error::Client(e) => e.is_terminal_session(),
            Error::Aggregation(e) => e.client_error().is_terminal_session(),
            _ => false,
        }
    }

    /// Whether retrying the same command later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Client(e) => e.is_transient(),
            Error::Aggregation(e) => e.client_error().is_transient(),
            _ => false,
        }
    }
}
