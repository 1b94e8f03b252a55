use crate::state::{Action, ActionKind, Address, Chips, GameConfig, GameId, Payout, Round, SeatId};
use serde::{Deserialize, Serialize};

// --- 请求 ---
// 复制层排好序后逐条交给引擎的交易内容。行动座位总是由签名身份推出，不由请求携带。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// 创建一张新桌
    CreateGame {
        min_buy_in: Chips,
        max_buy_in: Chips,
        min_players: usize,
        max_players: usize,
        small_blind: Chips,
        big_blind: Chips,
        action_timeout_seconds: u64,
        game_type: String,
    },
    /// 选一个座位坐下并买入
    JoinGame { game_id: GameId, seat: SeatId, buy_in: Chips },
    /// 轮到自己时执行的游戏动作
    PerformAction { game_id: GameId, action: Action, amount: Chips },
    /// 离开座位，退还剩余筹码
    LeaveGame { game_id: GameId },
    /// 两局之间补充筹码
    TopUp { game_id: GameId, amount: Chips },
    /// 任何人都可以提交：替超时的座位过牌或弃牌
    ForceTimeout { game_id: GameId, seat: SeatId },
    /// 暂离，保留座位和筹码
    SitOut { game_id: GameId },
    /// 结束暂离
    SitIn { game_id: GameId },
    /// 牌桌停在 Waiting 但人数已够时，入座玩家手动开下一局
    NewHand { game_id: GameId },
}

impl Request {
    /// `CreateGame` 以外的请求都指向一张已存在的桌
    pub fn game_id(&self) -> Option<&str> {
        match self {
            Request::CreateGame { .. } => None,
            Request::JoinGame { game_id, .. }
            | Request::PerformAction { game_id, .. }
            | Request::LeaveGame { game_id }
            | Request::TopUp { game_id, .. }
            | Request::ForceTimeout { game_id, .. }
            | Request::SitOut { game_id }
            | Request::SitIn { game_id }
            | Request::NewHand { game_id } => Some(game_id.as_str()),
        }
    }
}

/// 一条已排序、已验证签名的交易
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub sender: Address,
    pub request: Request,
}

// --- 事件 ---
// 每次成功的状态转换都会产生事件，交给外部广播层。
// 事件名和属性名是外部消费者依赖的兼容面，不要随意改动。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameCreated {
        game_id: GameId,
        creator: Address,
        config: GameConfig,
        block_height: u64,
    },
    PlayerJoined {
        game_id: GameId,
        player: Address,
        seat: SeatId,
        buy_in: Chips,
    },
    PlayerLeft {
        game_id: GameId,
        player: Address,
        seat: SeatId,
        refund_amount: Chips,
    },
    PlayerToppedUp {
        game_id: GameId,
        player: Address,
        seat: SeatId,
        amount: Chips,
        new_stack: Chips,
    },
    PlayerSatOut {
        game_id: GameId,
        player: Address,
        seat: SeatId,
    },
    PlayerSatIn {
        game_id: GameId,
        player: Address,
        seat: SeatId,
    },
    HandStarted {
        game_id: GameId,
        hand_number: u64,
        block_height: u64,
        /// 洗牌种子（十六进制）
        deck_seed: String,
        /// 洗好的整副牌顺序的哈希，用于事后审计
        deck_hash: String,
        dealer: SeatId,
    },
    /// 一次行动被接受
    GameStateUpdated {
        game_id: GameId,
        seat: SeatId,
        action: ActionKind,
        amount: Chips,
        round: Round,
        next_to_act: Option<SeatId>,
        action_count: u64,
        hand_number: u64,
    },
    HandSettled {
        game_id: GameId,
        hand_number: u64,
        payouts: Vec<Payout>,
    },
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GameCreated { .. } => "game_created",
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::PlayerLeft { .. } => "player_left",
            GameEvent::PlayerToppedUp { .. } => "player_topped_up",
            GameEvent::PlayerSatOut { .. } => "player_sat_out",
            GameEvent::PlayerSatIn { .. } => "player_sat_in",
            GameEvent::HandStarted { .. } => "hand_started",
            GameEvent::GameStateUpdated { .. } => "game_state_updated",
            GameEvent::HandSettled { .. } => "hand_settled",
        }
    }

    /// 按固定顺序渲染成 (键, 值) 字符串对，即广播层消费的形式
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        match self {
            GameEvent::GameCreated { game_id, creator, config, block_height } => vec![
                ("game_id", game_id.clone()),
                ("creator", creator.clone()),
                ("min_buy_in", config.min_buy_in.to_string()),
                ("max_buy_in", config.max_buy_in.to_string()),
                ("min_players", config.min_players.to_string()),
                ("max_players", config.max_players.to_string()),
                ("small_blind", config.small_blind.to_string()),
                ("big_blind", config.big_blind.to_string()),
                ("timeout", config.timeout_secs.to_string()),
                ("game_type", config.game_type.to_string()),
                ("block_height", block_height.to_string()),
            ],
            GameEvent::PlayerJoined { game_id, player, seat, buy_in } => vec![
                ("game_id", game_id.clone()),
                ("player", player.clone()),
                ("seat", seat.to_string()),
                ("buy_in", buy_in.to_string()),
            ],
            GameEvent::PlayerLeft { game_id, player, seat, refund_amount } => vec![
                ("game_id", game_id.clone()),
                ("player", player.clone()),
                ("seat", seat.to_string()),
                ("refund_amount", refund_amount.to_string()),
            ],
            GameEvent::PlayerToppedUp { game_id, player, seat, amount, new_stack } => vec![
                ("game_id", game_id.clone()),
                ("player", player.clone()),
                ("seat", seat.to_string()),
                ("amount", amount.to_string()),
                ("new_stack", new_stack.to_string()),
            ],
            GameEvent::PlayerSatOut { game_id, player, seat } | GameEvent::PlayerSatIn { game_id, player, seat } => {
                vec![("game_id", game_id.clone()), ("player", player.clone()), ("seat", seat.to_string())]
            }
            GameEvent::HandStarted { game_id, hand_number, block_height, deck_seed, deck_hash, dealer } => vec![
                ("game_id", game_id.clone()),
                ("hand_number", hand_number.to_string()),
                ("block_height", block_height.to_string()),
                ("deck_seed", deck_seed.clone()),
                ("deck_hash", deck_hash.clone()),
                ("dealer", dealer.to_string()),
            ],
            GameEvent::GameStateUpdated {
                game_id,
                seat,
                action,
                amount,
                round,
                next_to_act,
                action_count,
                hand_number,
            } => vec![
                ("game_id", game_id.clone()),
                ("seat", seat.to_string()),
                ("action", action.to_string()),
                ("amount", amount.to_string()),
                ("round", round.to_string()),
                // 本局结束时没有下一个行动者，属性保留但为空
                ("next_to_act", next_to_act.map(|s| s.to_string()).unwrap_or_default()),
                ("action_count", action_count.to_string()),
                ("hand_number", hand_number.to_string()),
            ],
            GameEvent::HandSettled { game_id, hand_number, payouts } => vec![
                ("game_id", game_id.clone()),
                ("hand_number", hand_number.to_string()),
                (
                    "payouts",
                    payouts.iter().map(|p| format!("{}:{}", p.seat, p.amount)).collect::<Vec<_>>().join(","),
                ),
            ],
        }
    }
}
