use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// Another writer holds the database lock and the busy timeout elapsed.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl SQLError {
    /// True when retrying the same work later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SQLError::Busy(_))
    }
}
