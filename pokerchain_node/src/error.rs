use pokerchain_core::{GameId, PokerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("game {0} already exists")]
    GameExists(GameId),
    #[error("game {id} is halted: {reason}")]
    GameHalted { id: GameId, reason: String },
    #[error(transparent)]
    Engine(#[from] PokerError),
    #[error("invalid node config: {0}")]
    Config(#[from] serde_json::Error),
}

impl NodeError {
    /// 引擎缺陷导致的错误，对应的桌已被停止
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Engine(e) if e.is_fatal())
    }
}
