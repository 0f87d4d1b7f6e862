use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("API client error: {0}")]
    Api(#[from] api_client::error::ApiError),

    #[error("Database error: {0}")]
    Db(#[from] database::DbError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] indicators::IndicatorError),

    #[error("Symbol '{0}' is not registered in the engine.")]
    UnknownSymbol(String),
}
