use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?} in {context}")]
    ShapeError {
        expected: Vec<usize>,
        got: Vec<usize>,
        context: String,
    },

    #[error("Empty population: {0}")]
    EmptyPopulation(String),

    #[error("Degenerate variance: {0}")]
    DegenerateVariance(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
