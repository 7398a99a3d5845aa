use thiserror::Error;

pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rule {index}: unknown field '{field}'")]
    UnknownField { index: usize, field: String },

    #[error("Rule {index}: operand '{operand}' is not a valid {cast}")]
    BadOperand {
        index: usize,
        operand: String,
        cast: &'static str,
    },

    #[error("Rule {index}: {message}")]
    RuleValidation { index: usize, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ForgeError {
    /// True for errors caused by a bad rule definition, which map to a
    /// request error at the API boundary rather than a server fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ForgeError::UnknownField { .. }
                | ForgeError::BadOperand { .. }
                | ForgeError::RuleValidation { .. }
        )
    }
}
