use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("case record has no numero_cnj")]
    MissingCaseNumber,

    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
