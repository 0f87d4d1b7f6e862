use thiserror::Error;

/// Everything that can go wrong talking to the exchange. These are values,
/// never panics: callers decide between retrying, latching and logging.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status {status} for {context}: {body}")]
    Status {
        status: u16,
        context: String,
        body: String,
    },

    #[error("unexpected content-type `{0}`")]
    UnexpectedContentType(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("response for {0} carried no `data` payload")]
    MissingData(String),
}
