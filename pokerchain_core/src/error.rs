use crate::state::{Action, Chips, SeatId};
use thiserror::Error;

/// 引擎自身的缺陷。出现任何一种都会让这张桌停止处理，而不是当作普通的请求被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("deck underflow: requested {requested} cards, {remaining} remain")]
    DeckUnderflow { requested: usize, remaining: usize },
    #[error("shuffle seed must be 32 bytes, got {len}")]
    MalformedSeed { len: usize },
    #[error("pot of {amount} chips has no eligible seat")]
    EmptyPotEligibility { amount: Chips },
    #[error("turn integrity: {0}")]
    TurnIntegrity(String),
    #[error("chip conservation: expected {expected} on table, found {actual}")]
    ChipConservation { expected: Chips, actual: Chips },
    #[error("seat {seat} stack {stack} cannot cover {amount}")]
    StackUnderflow { seat: SeatId, stack: Chips, amount: Chips },
    #[error("crediting {amount} to seat {seat} with stack {stack} overflows")]
    StackOverflow { seat: SeatId, stack: Chips, amount: Chips },
    #[error("card {0} dealt twice in one hand")]
    DuplicateCard(String),
    #[error("showdown reached with {cards} community cards")]
    IncompleteBoard { cards: usize },
    #[error("hand record missing while game is in progress")]
    MissingHand,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PokerError {
    // --- 参数校验 ---
    #[error("invalid game configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    // --- 入座 ---
    #[error("seat {0} does not exist")]
    NoSuchSeat(SeatId),
    #[error("seat {0} is taken")]
    SeatTaken(SeatId),
    #[error("{0} is already seated")]
    AlreadySeated(String),
    #[error("buy-in {amount} outside [{min}, {max}]")]
    BuyInOutOfRange { amount: Chips, min: Chips, max: Chips },
    #[error("game is not accepting players")]
    GameNotJoinable,
    #[error("{0} is not seated at this game")]
    NotSeated(String),
    #[error("cannot leave while contending the current hand")]
    NotEligibleToLeave,
    #[error("top-up is only allowed between hands or while sitting out")]
    TopUpNotAllowed,
    #[error("top-up of {amount} would exceed the max buy-in {max}")]
    TopUpOutOfRange { amount: Chips, max: Chips },
    #[error("{amount} more chips would overflow the table ledger")]
    ChipOverflow { amount: Chips },
    #[error("already sitting out")]
    AlreadySittingOut,
    #[error("not sitting out")]
    NotSittingOut,

    // --- 行动 ---
    #[error("game is not in progress")]
    GameNotInProgress,
    #[error("a hand is already in progress")]
    HandInProgress,
    #[error("{funded} funded players seated, {required} needed to deal")]
    NotEnoughPlayers { funded: usize, required: usize },
    #[error("it is not seat {0}'s turn")]
    NotPlayersTurn(SeatId),
    #[error("illegal action {action} for amount {amount}: {reason}")]
    IllegalAction { action: Action, amount: Chips, reason: String },
    #[error("timeout not elapsed: {elapsed_ms}ms of {timeout_ms}ms")]
    TimeoutNotElapsed { elapsed_ms: i64, timeout_ms: i64 },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl PokerError {
    /// 是否为引擎缺陷（需要停桌，而不只是拒绝请求）
    pub fn is_fatal(&self) -> bool {
        matches!(self, PokerError::Invariant(_))
    }

    pub(crate) fn illegal(action: Action, amount: Chips, reason: impl Into<String>) -> Self {
        PokerError::IllegalAction { action, amount, reason: reason.into() }
    }
}
