use crate::betting::{self, LegalAction};
use crate::card::{evaluate, HandRank};
use crate::error::{InvariantViolation, PokerError};
use crate::message::GameEvent;
use crate::pot::settle;
use crate::state::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

/// 一次请求最多连续发几局（全员在盲注里全下时会自动跑完一局又开下一局）。
/// 达到上限时牌桌停在 Waiting，由下一次 `new_hand` 或座位变动继续。
pub const MAX_CHAINED_HANDS: usize = 16;

/// 一次成功状态转换的结果：新的游戏记录，以及按发生顺序排列的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub game: Game,
    pub events: Vec<GameEvent>,
}

/// `"0x" + hex(keccak256(creator || height || time_ms || sequence))`
///
/// `sequence` 是副本上已有的游戏数量，保证同一区块内同一创建者的多张桌也不重复。
pub fn derive_game_id(creator: &str, meta: &BlockMeta, sequence: u64) -> GameId {
    let mut hasher = Keccak256::new();
    hasher.update(creator.as_bytes());
    hasher.update(meta.height.to_be_bytes());
    hasher.update(meta.time_ms.to_be_bytes());
    hasher.update(sequence.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// 空桌：所有座位为空，状态 Waiting
pub fn new_game(id: GameId, creator: Address, config: GameConfig, created_at: i64) -> Game {
    let seats = (0..config.max_players).map(Seat::empty).collect();
    Game {
        id,
        creator,
        config,
        seats,
        status: GameStatus::Waiting,
        hand: None,
        hand_number: 0,
        action_count: 0,
        dealer: None,
        ledger: ChipLedger::default(),
        created_at,
        updated_at: created_at,
        last_action_at: created_at,
        last_result: None,
        halted: None,
    }
}

// --- 对外操作 ---
// 每个操作都在一份拷贝上执行，失败时原记录保持不变。

pub fn create_game(
    id: GameId,
    creator: &str,
    config: GameConfig,
    limits: &TableLimits,
    meta: &BlockMeta,
) -> Result<Transition, PokerError> {
    config.validate(limits)?;
    let game = new_game(id, creator.to_string(), config, meta.time_ms);
    let events = vec![GameEvent::GameCreated {
        game_id: game.id.clone(),
        creator: game.creator.clone(),
        config: game.config.clone(),
        block_height: meta.height,
    }];
    seal(game, events, meta)
}

/// 入座；人数凑够时在同一次转换里开出第一局
pub fn join_game(
    game: &Game,
    identity: &str,
    seat: SeatId,
    buy_in: Chips,
    meta: &BlockMeta,
) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    next.join(seat, identity, buy_in)?;
    let mut events = vec![GameEvent::PlayerJoined {
        game_id: next.id.clone(),
        player: identity.to_string(),
        seat,
        buy_in,
    }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

pub fn leave_game(game: &Game, identity: &str, meta: &BlockMeta) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    let (seat, refund_amount) = next.leave(identity)?;
    let mut events = vec![GameEvent::PlayerLeft {
        game_id: next.id.clone(),
        player: identity.to_string(),
        seat,
        refund_amount,
    }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

pub fn top_up(game: &Game, identity: &str, amount: Chips, meta: &BlockMeta) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    let (seat, new_stack) = next.top_up(identity, amount)?;
    let mut events = vec![GameEvent::PlayerToppedUp {
        game_id: next.id.clone(),
        player: identity.to_string(),
        seat,
        amount,
        new_stack,
    }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

/// 暂离；已被发进当前这一局时，本局结束后才生效
pub fn sit_out(game: &Game, identity: &str, meta: &BlockMeta) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    let seat = next.sit_out(identity)?;
    let mut events =
        vec![GameEvent::PlayerSatOut { game_id: next.id.clone(), player: identity.to_string(), seat }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

/// 结束暂离；人数因此凑够时立即开局
pub fn sit_in(game: &Game, identity: &str, meta: &BlockMeta) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    let seat = next.sit_in(identity)?;
    let mut events =
        vec![GameEvent::PlayerSatIn { game_id: next.id.clone(), player: identity.to_string(), seat }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

/// 入座玩家手动开局
///
/// 只在牌桌处于 Waiting 且有筹码、未暂离的玩家不少于 `min_players` 时可用，
/// 用来继续一张因连发上限而停下的桌。
pub fn new_hand(game: &Game, identity: &str, meta: &BlockMeta) -> Result<Transition, PokerError> {
    match game.status {
        GameStatus::Closed => return Err(PokerError::GameNotJoinable),
        GameStatus::InProgress => return Err(PokerError::HandInProgress),
        GameStatus::Waiting => {}
    }
    game.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
    let (funded, required) = (game.funded_players(), game.config.min_players);
    if funded < required {
        return Err(PokerError::NotEnoughPlayers { funded, required });
    }

    let mut next = game.clone();
    let mut events = Vec::new();
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

/// 执行调用者自己座位的行动
///
/// 本局因此结束时，在同一次转换里完成结算，并在人数足够时开下一局。
pub fn perform_action(
    game: &Game,
    identity: &str,
    action: Action,
    amount: Chips,
    meta: &BlockMeta,
) -> Result<Transition, PokerError> {
    if game.status != GameStatus::InProgress {
        return Err(PokerError::GameNotInProgress);
    }
    let seat = game.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
    act(game, seat, action, amount, false, meta)
}

/// 替超时的座位行动：能过牌就过牌，否则弃牌
///
/// 超时只按区块时间计算，必须严格超过配置的时长。
pub fn force_timeout(game: &Game, seat: SeatId, meta: &BlockMeta) -> Result<Transition, PokerError> {
    if game.status != GameStatus::InProgress {
        return Err(PokerError::GameNotInProgress);
    }
    if game.next_to_act() != Some(seat) {
        return Err(PokerError::NotPlayersTurn(seat));
    }
    let elapsed_ms = meta.time_ms.saturating_sub(game.last_action_at);
    let timeout_ms = game.config.timeout_ms();
    if elapsed_ms <= timeout_ms {
        return Err(PokerError::TimeoutNotElapsed { elapsed_ms, timeout_ms });
    }
    let action = betting::timeout_action(game, seat);
    act(game, seat, action, 0, true, meta)
}

// --- 内部流程 ---

fn act(
    game: &Game,
    seat: SeatId,
    action: Action,
    amount: Chips,
    timed_out: bool,
    meta: &BlockMeta,
) -> Result<Transition, PokerError> {
    let mut next = game.clone();
    let record = betting::apply_action(&mut next, seat, action, amount, timed_out)?;
    next.last_action_at = meta.time_ms;

    let hand = next.hand.as_ref().ok_or(InvariantViolation::MissingHand)?;
    let mut events = vec![GameEvent::GameStateUpdated {
        game_id: next.id.clone(),
        seat,
        action: record.kind,
        amount: record.amount,
        round: record.round,
        next_to_act: hand.next_to_act,
        action_count: next.action_count,
        hand_number: hand.number,
    }];
    play_on(&mut next, meta, &mut events)?;
    seal(next, events, meta)
}

/// 结算已经结束的一局，然后在人数足够时继续开局，直到有人需要行动
fn play_on(game: &mut Game, meta: &BlockMeta, events: &mut Vec<GameEvent>) -> Result<(), PokerError> {
    play_on_capped(game, meta, events, MAX_CHAINED_HANDS)
}

fn play_on_capped(
    game: &mut Game,
    meta: &BlockMeta,
    events: &mut Vec<GameEvent>,
    max_hands: usize,
) -> Result<(), PokerError> {
    if game.status == GameStatus::Closed {
        return Ok(());
    }
    let mut dealt = 0;
    loop {
        let hand_over = game.hand.as_ref().map(|hand| hand.next_to_act.is_none());
        match hand_over {
            Some(false) => return Ok(()),
            Some(true) => {
                let result = finish_hand(game)?;
                events.push(GameEvent::HandSettled {
                    game_id: game.id.clone(),
                    hand_number: result.hand_number,
                    payouts: result.payouts.clone(),
                });
                game.last_result = Some(result);
            }
            None => {}
        }

        if dealt == max_hands || game.funded_players() < game.config.min_players {
            game.status = GameStatus::Waiting;
            return Ok(());
        }
        game.status = GameStatus::InProgress;
        betting::start_hand(game, meta)?;
        dealt += 1;

        let hand = game.hand.as_ref().ok_or(InvariantViolation::MissingHand)?;
        events.push(GameEvent::HandStarted {
            game_id: game.id.clone(),
            hand_number: hand.number,
            block_height: meta.height,
            deck_seed: hand.seed.clone(),
            deck_hash: hand.deck.order_hash(),
            dealer: hand.dealer,
        });
    }
}

/// 处理摊牌并派彩
///
/// - 只剩一个争夺者时他拿走全部底池，不亮牌。
/// - 否则为每个争夺者评估最大牌型，交给 `settle` 逐池分配。
/// - 结束后 `Left` 的座位清空，其余入座玩家回到 `SittingOut` 等待下一局。
fn finish_hand(game: &mut Game) -> Result<HandResult, PokerError> {
    let hand = game.hand.take().ok_or(InvariantViolation::MissingHand)?;
    let contenders: Vec<SeatId> = game.seats.iter().filter(|s| s.is_contending()).map(|s| s.index).collect();

    let (payouts, revealed) = if let [winner] = contenders.as_slice() {
        (vec![Payout { seat: *winner, amount: hand.pot_total() }], Vec::new())
    } else {
        if hand.community.len() != 5 {
            return Err(InvariantViolation::IncompleteBoard { cards: hand.community.len() }.into());
        }
        let revealed: Vec<RevealedHand> = contenders
            .iter()
            .map(|&seat| RevealedHand {
                seat,
                cards: hand.hole_cards[seat].clone(),
                rank: evaluate(&hand.hole_cards[seat], &hand.community),
            })
            .collect();
        let evaluations: Vec<(SeatId, HandRank)> = revealed.iter().map(|r| (r.seat, r.rank.clone())).collect();
        (settle(&hand.pots, &evaluations)?, revealed)
    };

    for payout in &payouts {
        game.credit(payout.seat, payout.amount)?;
    }
    for seat in game.seats.iter_mut() {
        if seat.status == SeatStatus::Left {
            *seat = Seat::empty(seat.index);
        } else if seat.occupant.is_some() {
            seat.status = SeatStatus::SittingOut;
        }
    }
    debug!("第 {} 局结算完成: {:?}", hand.number, payouts);

    Ok(HandResult { hand_number: hand.number, community: hand.community, revealed, payouts })
}

/// 检查所有不变量，全部成立才产出新记录
fn seal(mut game: Game, events: Vec<GameEvent>, meta: &BlockMeta) -> Result<Transition, PokerError> {
    game.updated_at = meta.time_ms;
    game.check_chip_conservation()?;
    game.check_turn_integrity()?;
    check_deck_integrity(&game)?;
    Ok(Transition { game, events })
}

fn check_deck_integrity(game: &Game) -> Result<(), InvariantViolation> {
    let Some(hand) = game.hand.as_ref() else {
        return Ok(());
    };
    let mut dealt = hand.dealt_cards();
    dealt.sort();
    match dealt.windows(2).find(|pair| pair[0] == pair[1]) {
        Some(pair) => Err(InvariantViolation::DuplicateCard(pair[0].to_string())),
        None => Ok(()),
    }
}

// --- 只读视图 ---

/// 给某个观察者看的游戏状态：隐藏别人的底牌和未发的牌
pub fn game_view(game: &Game, viewer: Option<&str>) -> Game {
    game.for_viewer(viewer)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalActionsView {
    pub game_id: GameId,
    pub seat: SeatId,
    pub address: Address,
    pub actions: Vec<LegalAction>,
}

/// 当前行动者的可选行动；没有人需要行动时为 `None`
pub fn legal_actions_view(game: &Game) -> Option<LegalActionsView> {
    let seat = game.next_to_act()?;
    Some(LegalActionsView {
        game_id: game.id.clone(),
        seat,
        address: game.seats[seat].occupant.clone().unwrap_or_default(),
        actions: betting::legal_actions(game, seat),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextPlayerToAct {
    pub seat: SeatId,
    pub address: Address,
    pub stack: Chips,
    /// 本局到目前为止的总投入
    pub sum_of_bets: Chips,
    pub status: SeatStatus,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
}

pub fn next_player_to_act(game: &Game) -> Option<NextPlayerToAct> {
    let hand = game.hand.as_ref()?;
    let seat = hand.next_to_act?;
    let occupant = game.seats.get(seat)?;
    Some(NextPlayerToAct {
        seat,
        address: occupant.occupant.clone().unwrap_or_default(),
        stack: occupant.stack,
        sum_of_bets: hand.total_bets[seat],
        status: occupant.status,
        is_dealer: hand.dealer == seat,
        is_small_blind: hand.small_blind == seat,
        is_big_blind: hand.big_blind == seat,
    })
}
