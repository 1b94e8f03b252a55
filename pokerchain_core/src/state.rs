use crate::card::{Card, HandRank};
use crate::deck::Deck;
use crate::error::{InvariantViolation, PokerError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub type Chips = u64;
pub type SeatId = usize;
pub type Address = String;
pub type GameId = String;

/// 复制层提供的、各副本一致的区块数据。
/// 引擎唯一的“当前时间”和唯一的随机来源。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub height: u64,
    /// 区块时间，Unix 毫秒
    pub time_ms: i64,
    /// 该区块所基于的应用状态哈希，创世时可为空
    #[serde(default)]
    pub app_hash: Vec<u8>,
}

// --- 配置 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    Cash,
    SitAndGo,
    Tournament,
}

impl FromStr for GameType {
    type Err = PokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(GameType::Cash),
            "sit-and-go" => Ok(GameType::SitAndGo),
            "tournament" => Ok(GameType::Tournament),
            other => Err(PokerError::InvalidConfig(format!("unknown game type {:?}", other))),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            GameType::Cash => "cash",
            GameType::SitAndGo => "sit-and-go",
            GameType::Tournament => "tournament",
        })
    }
}

/// 所有牌桌配置都必须满足的上下限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLimits {
    pub min_players: usize,
    pub max_players: usize,
    pub min_timeout_secs: u64,
    pub max_timeout_secs: u64,
    /// 单个座位买入的上限；`max_players * max_buy_in` 必须放得进 `u64`
    pub max_buy_in: Chips,
}

impl Default for TableLimits {
    fn default() -> Self {
        TableLimits {
            min_players: 2,
            max_players: 9,
            min_timeout_secs: 1,
            max_timeout_secs: 3600,
            max_buy_in: 1_000_000_000_000_000,
        }
    }
}

/// 牌桌参数，创建后不再改变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub min_players: usize,
    pub max_players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub timeout_secs: u64,
    pub game_type: GameType,
}

impl GameConfig {
    pub fn validate(&self, limits: &TableLimits) -> Result<(), PokerError> {
        let invalid = |reason: String| Err(PokerError::InvalidConfig(reason));
        if self.min_players < limits.min_players.max(2) {
            return invalid(format!("min_players {} below {}", self.min_players, limits.min_players.max(2)));
        }
        if self.max_players > limits.max_players {
            return invalid(format!("max_players {} above {}", self.max_players, limits.max_players));
        }
        if self.min_players > self.max_players {
            return invalid(format!("min_players {} exceeds max_players {}", self.min_players, self.max_players));
        }
        if self.small_blind == 0 || self.small_blind > self.big_blind {
            return invalid(format!("blinds {}/{} must satisfy 0 < small <= big", self.small_blind, self.big_blind));
        }
        if self.min_buy_in < self.big_blind || self.min_buy_in > self.max_buy_in {
            return invalid(format!(
                "buy-in range [{}, {}] must start at or above the big blind {}",
                self.min_buy_in, self.max_buy_in, self.big_blind
            ));
        }
        if self.max_buy_in > limits.max_buy_in {
            return invalid(format!("max_buy_in {} above {}", self.max_buy_in, limits.max_buy_in));
        }
        if self.max_buy_in.checked_mul(self.max_players as Chips).is_none() {
            return invalid(format!("{} seats of {} chips overflow the chip counter", self.max_players, self.max_buy_in));
        }
        if self.timeout_secs < limits.min_timeout_secs || self.timeout_secs > limits.max_timeout_secs {
            return invalid(format!(
                "timeout {}s outside [{}, {}]",
                self.timeout_secs, limits.min_timeout_secs, limits.max_timeout_secs
            ));
        }
        Ok(())
    }

    pub fn timeout_ms(&self) -> i64 {
        i64::try_from(self.timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

// --- 座位 ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SeatStatus {
    Empty,
    /// 已发牌且还能行动
    Active,
    Folded,
    AllIn,
    /// 已入座，但没有被发进当前这一局（或正在等第一局）
    SittingOut,
    /// 弃牌后离开，本局结束时座位才清空
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub index: SeatId,
    pub occupant: Option<Address>,
    pub stack: Chips,
    pub status: SeatStatus,
    /// 玩家主动暂离：保留座位和筹码，但不被发进新的一局
    #[serde(default)]
    pub away: bool,
}

impl Seat {
    pub fn empty(index: SeatId) -> Self {
        Seat { index, occupant: None, stack: 0, status: SeatStatus::Empty, away: false }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some() && self.status != SeatStatus::Left
    }

    /// 已入座、有筹码且没有暂离，可以被发进下一局
    pub fn is_funded(&self) -> bool {
        self.is_occupied() && self.stack > 0 && !self.away
    }

    /// 在当前这一局中且没有弃牌
    pub fn is_contending(&self) -> bool {
        matches!(self.status, SeatStatus::Active | SeatStatus::AllIn)
    }
}

// --- 牌局 ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Round {
    Ante,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Round::Ante => "ante",
            Round::PreFlop => "preflop",
            Round::Flop => "flop",
            Round::Turn => "turn",
            Round::River => "river",
            Round::Showdown => "showdown",
        })
    }
}

/// 座位可以提交的行动，封闭集合，所有使用处都穷举匹配
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl Action {
    pub const ALL: [Action; 6] =
        [Action::Fold, Action::Check, Action::Call, Action::Bet, Action::Raise, Action::AllIn];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Bet => "bet",
            Action::Raise => "raise",
            Action::AllIn => "all-in",
        })
    }
}

impl FromStr for Action {
    type Err = PokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.to_string() == s)
            .ok_or(PokerError::UnknownAction(s.to_string()))
    }
}

/// 行动日志记录的内容：强制盲注或座位的行动
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    PostSmallBlind,
    PostBigBlind,
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl From<Action> for ActionKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Fold => ActionKind::Fold,
            Action::Check => ActionKind::Check,
            Action::Call => ActionKind::Call,
            Action::Bet => ActionKind::Bet,
            Action::Raise => ActionKind::Raise,
            Action::AllIn => ActionKind::AllIn,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ActionKind::PostSmallBlind => "post-small-blind",
            ActionKind::PostBigBlind => "post-big-blind",
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Bet => "bet",
            ActionKind::Raise => "raise",
            ActionKind::AllIn => "all-in",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// 由引擎按整场游戏的行动计数分配
    pub seq: u64,
    pub seat: SeatId,
    pub kind: ActionKind,
    /// 这一条从座位筹码移入底池的数量
    pub amount: Chips,
    pub round: Round,
    #[serde(default)]
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: Chips,
    /// 座位号升序
    pub eligible: Vec<SeatId>,
}

/// 从洗牌到派彩的一局。按座位的 Vec 都以座位号为下标。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    pub number: u64,
    pub round: Round,
    /// 洗牌种子的十六进制，便于审计
    pub seed: String,
    pub deck: Deck,
    pub burned: Vec<Card>,
    pub community: Vec<Card>,
    pub hole_cards: Vec<Vec<Card>>,
    pub dealer: SeatId,
    pub small_blind: SeatId,
    pub big_blind: SeatId,
    /// 本轮最高下注额，即每个座位要跟平的数额
    pub current_bet: Chips,
    /// 在 `current_bet` 之上的最小加注幅度
    pub min_raise: Chips,
    pub round_bets: Vec<Chips>,
    pub total_bets: Vec<Chips>,
    /// 本轮开始或上次完整加注之后是否行动过
    pub acted: Vec<bool>,
    pub pots: Vec<Pot>,
    pub next_to_act: Option<SeatId>,
    pub actions: Vec<ActionRecord>,
}

impl Hand {
    pub fn pot_total(&self) -> Chips {
        self.pots.iter().fold(0, |total: Chips, p| total.saturating_add(p.amount))
    }

    /// 发到座位手里或桌面上的所有牌
    pub fn dealt_cards(&self) -> Vec<Card> {
        self.hole_cards.iter().flatten().chain(self.community.iter()).copied().collect()
    }
}

// --- 结果 ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub seat: SeatId,
    pub amount: Chips,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedHand {
    pub seat: SeatId,
    pub cards: Vec<Card>,
    pub rank: HandRank,
}

/// 上一局的结果摘要，牌局记录清空后仍然保留
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandResult {
    pub hand_number: u64,
    pub community: Vec<Card>,
    /// 没有摊牌就结束时为空
    pub revealed: Vec<RevealedHand>,
    pub payouts: Vec<Payout>,
}

// --- 游戏 ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Closed,
}

/// 整场游戏中带上桌和带离桌的筹码
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipLedger {
    pub total_buy_ins: Chips,
    pub total_cashed_out: Chips,
}

impl ChipLedger {
    pub fn expected_on_table(&self) -> Chips {
        self.total_buy_ins.saturating_sub(self.total_cashed_out)
    }
}

/// 被复制的游戏记录，每次成功的状态转换都整体替换它
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub creator: Address,
    pub config: GameConfig,
    pub seats: Vec<Seat>,
    pub status: GameStatus,
    pub hand: Option<Hand>,
    /// 已开过的局数，进行中的一局就是这个局号
    pub hand_number: u64,
    /// 整场游戏记录的行动数，行动日志序号由此而来
    pub action_count: u64,
    /// 最近一局的庄家位
    pub dealer: Option<SeatId>,
    pub ledger: ChipLedger,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_action_at: i64,
    pub last_result: Option<HandResult>,
    /// 因不变量被破坏而停止处理时设置
    #[serde(default)]
    pub halted: Option<String>,
}

impl Game {
    pub fn seat_of(&self, identity: &str) -> Option<SeatId> {
        self.seats
            .iter()
            .find(|seat| seat.is_occupied() && seat.occupant.as_deref() == Some(identity))
            .map(|seat| seat.index)
    }

    pub fn next_to_act(&self) -> Option<SeatId> {
        self.hand.as_ref().and_then(|hand| hand.next_to_act)
    }

    /// 桌上的筹码总数。账本放得进 `u64` 时这里不会饱和，饱和后必然和账本对不上。
    pub fn chips_on_table(&self) -> Chips {
        let stacks = self.seats.iter().fold(0, |total: Chips, s| total.saturating_add(s.stack));
        stacks.saturating_add(self.hand.as_ref().map_or(0, Hand::pot_total))
    }

    pub fn check_chip_conservation(&self) -> Result<(), InvariantViolation> {
        let expected = self.ledger.expected_on_table();
        let actual = self.chips_on_table();
        if expected != actual || self.ledger.total_cashed_out > self.ledger.total_buy_ins {
            return Err(InvariantViolation::ChipConservation { expected, actual });
        }
        Ok(())
    }

    pub fn check_turn_integrity(&self) -> Result<(), InvariantViolation> {
        if let Some(seat) = self.next_to_act() {
            let status = self.seats.get(seat).map(|s| s.status);
            if status != Some(SeatStatus::Active) {
                return Err(InvariantViolation::TurnIntegrity(format!(
                    "next-to-act seat {} has status {:?}",
                    seat, status
                )));
            }
        }
        Ok(())
    }

    /// 记录的规范字节
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // 只有普通结构体和 Vec，JSON 编码是确定的
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn state_hash(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_bytes()))
    }

    /// 某个观察者能看到的记录副本：移除其他座位的底牌和未发的牌。
    /// 摊牌亮出的牌通过 `last_result` 仍然可见。
    pub fn for_viewer(&self, viewer: Option<&str>) -> Self {
        let mut view = self.clone();
        let viewer_seat = viewer.and_then(|v| self.seat_of(v));
        if let Some(hand) = view.hand.as_mut() {
            hand.deck = Deck::hidden();
            for (seat, cards) in hand.hole_cards.iter_mut().enumerate() {
                if Some(seat) != viewer_seat {
                    cards.clear();
                }
            }
        }
        view
    }
}
