use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearningError {
    #[error("store unreachable: {0}")]
    Connectivity(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("no outcome data in the requested window")]
    NoData,
}
