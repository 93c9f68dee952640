use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("token error: {0}")]
    Token(#[from] spigot_crypto::TokenError),

    #[error("work error: {0}")]
    Work(#[from] spigot_work::WorkError),

    #[error("store error: {0}")]
    Store(#[from] spigot_store::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),

    #[error("claim execution failed: {0}")]
    Claim(String),
}
