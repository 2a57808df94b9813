use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("unknown addressing method: {0}")]
    UnknownAddressingMethod(String),

    #[error("unknown balancing algorithm: {0}")]
    UnknownAlgorithm(String),
}
