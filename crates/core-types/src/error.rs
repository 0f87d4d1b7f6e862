use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown symbol state `{0}`, expected `stop`, `pause` or `track`")]
    UnknownState(String),

    #[error("Calculation error: {0}")]
    Calculation(String),
}
