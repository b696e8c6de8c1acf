use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Population size must be positive, got {0}")]
    InvalidPopulation(usize),

    #[error("Time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),
}

pub type Result<T> = std::result::Result<T, EngineError>;
