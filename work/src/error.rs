use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("difficulty {0} out of range (1..=64)")]
    DifficultyOutOfRange(u32),

    #[error("invalid hasher parameters: {0}")]
    HasherParams(String),

    #[error("validator pool shut down")]
    PoolClosed,
}
