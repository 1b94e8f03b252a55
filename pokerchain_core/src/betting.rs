use crate::deck::{Deck, ShuffleSeed};
use crate::error::{InvariantViolation, PokerError};
use crate::pot::{build_side_pots, Contribution};
use crate::state::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 一个可选行动及其金额范围（均为闭区间）
///
/// `bet`/`raise`/`all-in` 的金额是行动后本轮的总下注额，`call` 是需要补的筹码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAction {
    pub action: Action,
    pub min: Chips,
    pub max: Chips,
}

impl LegalAction {
    fn fixed(action: Action, amount: Chips) -> Self {
        LegalAction { action, min: amount, max: amount }
    }
}

// --- 辅助函数 ---

/// 从 `from` 的下一个座位开始顺时针绕一圈，最后回到 `from` 自己
fn clockwise(seat_count: usize, from: SeatId) -> impl Iterator<Item = SeatId> {
    (1..=seat_count).map(move |i| (from + i) % seat_count)
}

fn count_status(seats: &[Seat], status: SeatStatus) -> usize {
    seats.iter().filter(|s| s.status == status).count()
}

fn contending(seats: &[Seat]) -> usize {
    seats.iter().filter(|s| s.is_contending()).count()
}

/// 座位是否还欠一次行动
///
/// Active 且（本轮还没行动过，或下注额低于跟注额）。
/// 唯一剩下的 Active 座位如果已经跟平，就不再需要行动。
fn owes_action(seats: &[Seat], hand: &Hand, seat: SeatId) -> bool {
    if seats[seat].status != SeatStatus::Active {
        return false;
    }
    let matched = hand.round_bets[seat] >= hand.current_bet;
    if matched && count_status(seats, SeatStatus::Active) == 1 {
        return false;
    }
    !hand.acted[seat] || !matched
}

fn next_owing(seats: &[Seat], hand: &Hand, from: SeatId) -> Option<SeatId> {
    clockwise(seats.len(), from).find(|&seat| owes_action(seats, hand, seat))
}

/// 按每个座位本局的总投入重建主池和边池
fn rebuild_pots(game: &mut Game) -> Result<(), InvariantViolation> {
    let Game { seats, hand, .. } = game;
    let hand = hand.as_mut().ok_or(InvariantViolation::MissingHand)?;
    let contributions: Vec<Contribution> = seats
        .iter()
        .map(|s| Contribution {
            seat: s.index,
            amount: hand.total_bets[s.index],
            folded: !s.is_contending(),
            all_in: s.status == SeatStatus::AllIn,
        })
        .collect();
    hand.pots = build_side_pots(&contributions)?;
    Ok(())
}

/// 烧一张牌，再发 `n` 张公共牌
fn deal_board(hand: &mut Hand, n: usize) -> Result<(), InvariantViolation> {
    let burn = hand.deck.deal_one()?;
    hand.burned.push(burn);
    let cards = hand.deck.deal(n)?;
    hand.community.extend(cards);
    Ok(())
}

// --- 核心流程 ---

/// 开始新的一局
///
/// - 参与者：已入座、有筹码的座位，按座位号顺序。
/// - 庄家按钮顺时针轮转到下一个参与者；两人桌时庄家就是小盲。
/// - 用区块数据、游戏 ID 和局号洗牌，从庄家左手边开始每人一张、发两轮底牌。
/// - 在 Ante 阶段下大小盲（筹码不足则全下），然后进入 PreFlop。
pub fn start_hand(game: &mut Game, meta: &BlockMeta) -> Result<(), PokerError> {
    let participants: Vec<SeatId> = game.seats.iter().filter(|s| s.is_funded()).map(|s| s.index).collect();
    if participants.len() < 2 {
        return Err(InvariantViolation::TurnIntegrity(format!(
            "cannot deal a hand to {} players",
            participants.len()
        ))
        .into());
    }

    let seat_count = game.seats.len();
    let next_participant =
        |from: SeatId| clockwise(seat_count, from).find(|s| participants.contains(s)).unwrap_or(from);
    let dealer = match game.dealer {
        Some(previous) => next_participant(previous),
        None => participants[0],
    };
    let (small_blind, big_blind) = if participants.len() == 2 {
        (dealer, next_participant(dealer))
    } else {
        let sb = next_participant(dealer);
        (sb, next_participant(sb))
    };

    game.hand_number += 1;
    let number = game.hand_number;
    let seed = ShuffleSeed::derive(meta, &game.id, number);
    let mut deck = Deck::shuffled(&seed);

    let mut hole_cards = vec![Vec::with_capacity(2); seat_count];
    let deal_order: Vec<SeatId> = clockwise(seat_count, dealer).filter(|s| participants.contains(s)).collect();
    for _ in 0..2 {
        for &seat in &deal_order {
            hole_cards[seat].push(deck.deal_one()?);
        }
    }
    for &seat in &participants {
        game.seats[seat].status = SeatStatus::Active;
    }

    let (small, big) = (game.config.small_blind, game.config.big_blind);
    game.dealer = Some(dealer);
    game.hand = Some(Hand {
        number,
        round: Round::Ante,
        seed: seed.to_hex(),
        deck,
        burned: Vec::new(),
        community: Vec::new(),
        hole_cards,
        dealer,
        small_blind,
        big_blind,
        current_bet: 0,
        min_raise: big,
        round_bets: vec![0; seat_count],
        total_bets: vec![0; seat_count],
        acted: vec![false; seat_count],
        pots: Vec::new(),
        next_to_act: None,
        actions: Vec::new(),
    });

    post_blind(game, small_blind, small, ActionKind::PostSmallBlind)?;
    post_blind(game, big_blind, big, ActionKind::PostBigBlind)?;
    if let Some(hand) = game.hand.as_mut() {
        hand.round = Round::PreFlop;
        hand.current_bet = big;
        hand.min_raise = big;
    }
    game.last_action_at = meta.time_ms;
    rebuild_pots(game)?;

    debug!("第 {} 局开始: 庄家 {}, 小盲 {}, 大盲 {}, 种子 {}", number, dealer, small_blind, big_blind, seed.to_hex());
    progress(game, big_blind)
}

fn post_blind(game: &mut Game, seat: SeatId, blind: Chips, kind: ActionKind) -> Result<(), PokerError> {
    let amount = blind.min(game.seats[seat].stack);
    game.debit(seat, amount)?;
    if game.seats[seat].stack == 0 {
        game.seats[seat].status = SeatStatus::AllIn;
    }
    game.action_count += 1;
    let seq = game.action_count;
    let hand = game.hand.as_mut().ok_or(InvariantViolation::MissingHand)?;
    hand.round_bets[seat] += amount;
    hand.total_bets[seat] += amount;
    hand.actions.push(ActionRecord { seq, seat, kind, amount, round: Round::Ante, timed_out: false });
    Ok(())
}

/// 计算轮到行动的座位当前可选的行动
///
/// 不是该座位的回合时返回空列表。
pub fn legal_actions(game: &Game, seat: SeatId) -> Vec<LegalAction> {
    let Some(hand) = game.hand.as_ref() else {
        return Vec::new();
    };
    let Some(stack) = game.seats.get(seat).filter(|s| s.status == SeatStatus::Active).map(|s| s.stack) else {
        return Vec::new();
    };
    if hand.next_to_act != Some(seat) {
        return Vec::new();
    }

    let street_bet = hand.round_bets[seat];
    let to_call = hand.current_bet;
    let owed = to_call.saturating_sub(street_bet);
    let all_in_to = street_bet + stack;
    // 自上次完整加注以来没行动过
    let reopened = !hand.acted[seat];
    let opponent_can_respond =
        game.seats.iter().any(|s| s.index != seat && s.status == SeatStatus::Active);
    let big_blind = game.config.big_blind;

    let mut legal = vec![LegalAction::fixed(Action::Fold, 0)];
    if owed == 0 {
        legal.push(LegalAction::fixed(Action::Check, 0));
    } else {
        legal.push(LegalAction::fixed(Action::Call, owed.min(stack)));
    }
    if to_call == 0 && opponent_can_respond && stack >= big_blind {
        legal.push(LegalAction { action: Action::Bet, min: street_bet + big_blind, max: all_in_to });
    }
    if to_call > 0 && reopened && opponent_can_respond && all_in_to >= to_call + hand.min_raise {
        legal.push(LegalAction { action: Action::Raise, min: to_call + hand.min_raise, max: all_in_to });
    }
    if stack <= owed || (opponent_can_respond && (to_call == 0 || reopened)) {
        legal.push(LegalAction::fixed(Action::AllIn, all_in_to));
    }
    legal
}

/// 超时时替座位做的行动：能过牌就过牌，否则弃牌
pub fn timeout_action(game: &Game, seat: SeatId) -> Action {
    if legal_actions(game, seat).iter().any(|l| l.action == Action::Check) {
        Action::Check
    } else {
        Action::Fold
    }
}

/// 处理单个座位的行动
///
/// 1. 只接受 `legal_actions` 给出的行动；金额按约定归一化。
/// 2. 超过上限的下注/加注被截到全下；正好用光筹码的行动记为 `all-in`。
/// 3. 加注幅度不小于最小加注额时为完整加注，重新打开其他座位的行动权；
///    不足的全下加注不会重新打开已行动座位的加注权。
/// 4. 记录日志、重建底池，然后推进回合。
pub fn apply_action(
    game: &mut Game,
    seat: SeatId,
    action: Action,
    amount: Chips,
    timed_out: bool,
) -> Result<ActionRecord, PokerError> {
    let hand = game.hand.as_ref().ok_or(PokerError::GameNotInProgress)?;
    if hand.next_to_act != Some(seat) {
        return Err(PokerError::NotPlayersTurn(seat));
    }
    let bounds = legal_actions(game, seat)
        .into_iter()
        .find(|l| l.action == action)
        .ok_or_else(|| PokerError::illegal(action, amount, "not available to this seat now"))?;

    let street_bet = hand.round_bets[seat];
    let all_in_to = street_bet + game.seats[seat].stack;
    let (kind, to) = match action {
        Action::Fold | Action::Check => {
            if amount != 0 {
                return Err(PokerError::illegal(action, amount, "takes no amount"));
            }
            (ActionKind::from(action), street_bet)
        }
        Action::Call => {
            if amount != 0 && amount != bounds.min {
                return Err(PokerError::illegal(action, amount, format!("call amount is {}", bounds.min)));
            }
            let to = street_bet + bounds.min;
            (if to == all_in_to { ActionKind::AllIn } else { ActionKind::Call }, to)
        }
        Action::Bet | Action::Raise => {
            let to = amount.min(bounds.max);
            if to < bounds.min {
                return Err(PokerError::illegal(action, amount, format!("minimum is {}", bounds.min)));
            }
            (if to == all_in_to { ActionKind::AllIn } else { ActionKind::from(action) }, to)
        }
        Action::AllIn => {
            if amount != 0 && amount != all_in_to {
                return Err(PokerError::illegal(action, amount, format!("all-in amount is {}", all_in_to)));
            }
            (ActionKind::AllIn, all_in_to)
        }
    };

    let paid = to - street_bet;
    game.debit(seat, paid)?;
    let Game { seats, hand, action_count, .. } = game;
    let hand = hand.as_mut().ok_or(InvariantViolation::MissingHand)?;

    if action == Action::Fold {
        seats[seat].status = SeatStatus::Folded;
    } else if seats[seat].stack == 0 {
        seats[seat].status = SeatStatus::AllIn;
    }
    hand.round_bets[seat] = to;
    hand.total_bets[seat] += paid;

    if to > hand.current_bet {
        let increment = to - hand.current_bet;
        if increment >= hand.min_raise {
            hand.min_raise = increment;
            for (other, acted) in hand.acted.iter_mut().enumerate() {
                if other != seat {
                    *acted = false;
                }
            }
        }
        hand.current_bet = to;
    }
    hand.acted[seat] = true;

    *action_count += 1;
    let record = ActionRecord { seq: *action_count, seat, kind, amount: paid, round: hand.round, timed_out };
    hand.actions.push(record.clone());

    rebuild_pots(game)?;
    progress(game, seat)?;
    Ok(record)
}

/// 推进行动权
///
/// - 只剩一个未弃牌座位：本局直接结束（next_to_act 为空）。
/// - 否则交给 `from` 之后顺时针第一个还欠行动的座位。
/// - 没有人欠行动时本轮结束：清空本轮下注，发下一条街，从庄家左手边重新开始。
///   Active 座位不足两个时不再下注，直接把剩下的公共牌发完进入摊牌。
fn progress(game: &mut Game, from: SeatId) -> Result<(), PokerError> {
    let big_blind = game.config.big_blind;
    let Game { seats, hand, .. } = game;
    let hand = hand.as_mut().ok_or(InvariantViolation::MissingHand)?;

    if contending(seats) <= 1 {
        hand.next_to_act = None;
        return Ok(());
    }
    if let Some(next) = next_owing(seats, hand, from) {
        hand.next_to_act = Some(next);
        return Ok(());
    }

    loop {
        hand.round_bets.iter_mut().for_each(|b| *b = 0);
        hand.acted.iter_mut().for_each(|a| *a = false);
        hand.current_bet = 0;
        hand.min_raise = big_blind;

        let next_round = match hand.round {
            Round::Ante | Round::PreFlop => Round::Flop,
            Round::Flop => Round::Turn,
            Round::Turn => Round::River,
            Round::River | Round::Showdown => Round::Showdown,
        };
        match next_round {
            Round::Flop => deal_board(hand, 3)?,
            Round::Turn | Round::River => deal_board(hand, 1)?,
            Round::Ante | Round::PreFlop | Round::Showdown => {}
        }
        hand.round = next_round;
        debug!("第 {} 局进入 {}，公共牌 {} 张", hand.number, next_round, hand.community.len());

        if next_round == Round::Showdown {
            hand.next_to_act = None;
            return Ok(());
        }
        let dealer = hand.dealer;
        if let Some(next) = next_owing(seats, hand, dealer) {
            hand.next_to_act = Some(next);
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::new_game;

    fn meta() -> BlockMeta {
        BlockMeta { height: 42, time_ms: 1_700_000_000_000, app_hash: vec![7; 32] }
    }

    fn setup_table(stacks: &[Chips]) -> Game {
        let config = GameConfig {
            min_buy_in: 100,
            max_buy_in: 1000,
            min_players: 2,
            max_players: 6,
            small_blind: 5,
            big_blind: 10,
            timeout_secs: 30,
            game_type: GameType::Cash,
        };
        let mut game = new_game("0xtable".into(), "creator".into(), config, 0);
        for (i, &stack) in stacks.iter().enumerate() {
            game.join(i, &format!("p{}", i), stack).unwrap();
        }
        game.status = GameStatus::InProgress;
        start_hand(&mut game, &meta()).unwrap();
        game
    }

    fn hand(game: &Game) -> &Hand {
        game.hand.as_ref().unwrap()
    }

    fn act(game: &mut Game, seat: SeatId, action: Action, amount: Chips) -> ActionRecord {
        apply_action(game, seat, action, amount, false).unwrap()
    }

    #[test]
    fn test_heads_up_dealer_posts_small_blind_and_acts_first() {
        let game = setup_table(&[1000, 1000]);
        let h = hand(&game);
        assert_eq!((h.dealer, h.small_blind, h.big_blind), (0, 0, 1));
        assert_eq!(h.round, Round::PreFlop);
        assert_eq!(h.next_to_act, Some(0));
        assert_eq!(h.round_bets[..2], [5, 10]);
        assert_eq!(h.pot_total(), 15);
        assert_eq!(h.actions.iter().map(|a| a.kind).collect::<Vec<_>>(), [
            ActionKind::PostSmallBlind,
            ActionKind::PostBigBlind
        ]);
        assert!(h.actions.iter().all(|a| a.round == Round::Ante));

        assert_eq!(legal_actions(&game, 0), vec![
            LegalAction { action: Action::Fold, min: 0, max: 0 },
            LegalAction { action: Action::Call, min: 5, max: 5 },
            LegalAction { action: Action::Raise, min: 20, max: 1000 },
            LegalAction { action: Action::AllIn, min: 1000, max: 1000 },
        ]);
        assert!(legal_actions(&game, 1).is_empty());
        game.check_chip_conservation().unwrap();
    }

    #[test]
    fn test_three_handed_positions_and_deal() {
        let game = setup_table(&[500, 500, 500]);
        let h = hand(&game);
        assert_eq!((h.dealer, h.small_blind, h.big_blind), (0, 1, 2));
        assert_eq!(h.next_to_act, Some(0));
        for seat in 0..3 {
            assert_eq!(h.hole_cards[seat].len(), 2);
        }
        assert!(h.hole_cards[3].is_empty());
        assert_eq!(h.deck.remaining(), 52 - 6);
        // 从庄家左手边开始发：小盲拿到第一张
        assert_eq!(h.hole_cards[1][0], h.deck.dealt()[0]);
    }

    #[test]
    fn test_big_blind_gets_the_option() {
        let mut game = setup_table(&[500, 500, 500]);
        act(&mut game, 0, Action::Call, 0);
        act(&mut game, 1, Action::Call, 5);
        assert_eq!(hand(&game).next_to_act, Some(2));
        let options: Vec<Action> = legal_actions(&game, 2).iter().map(|l| l.action).collect();
        assert_eq!(options, vec![Action::Fold, Action::Check, Action::Raise, Action::AllIn]);

        act(&mut game, 2, Action::Check, 0);
        let h = hand(&game);
        assert_eq!(h.round, Round::Flop);
        assert_eq!(h.community.len(), 3);
        assert_eq!(h.burned.len(), 1);
        assert_eq!(h.current_bet, 0);
        assert_eq!(h.next_to_act, Some(1));
        assert_eq!(h.pot_total(), 30);
    }

    #[test]
    fn test_full_raise_sets_min_raise_and_reopens_action() {
        let mut game = setup_table(&[1000, 1000, 1000]);
        act(&mut game, 0, Action::Raise, 40);
        assert_eq!(hand(&game).min_raise, 30);
        act(&mut game, 1, Action::Call, 0);
        act(&mut game, 2, Action::Raise, 100);
        let h = hand(&game);
        assert_eq!((h.current_bet, h.min_raise), (100, 60));
        assert_eq!(h.next_to_act, Some(0));

        let raise = legal_actions(&game, 0).into_iter().find(|l| l.action == Action::Raise).unwrap();
        assert_eq!((raise.min, raise.max), (160, 1000));
        assert!(matches!(
            apply_action(&mut game, 0, Action::Raise, 150, false),
            Err(PokerError::IllegalAction { .. })
        ));
    }

    #[test]
    fn test_short_all_in_does_not_reopen_raising() {
        let mut game = setup_table(&[1000, 150, 1000]);
        act(&mut game, 0, Action::Raise, 100);
        let short = act(&mut game, 1, Action::AllIn, 0);
        assert_eq!((short.kind, short.amount), (ActionKind::AllIn, 145));
        assert_eq!(hand(&game).current_bet, 150);
        assert_eq!(hand(&game).min_raise, 90);

        // 大盲还没行动过，仍可加注
        assert!(legal_actions(&game, 2).iter().any(|l| l.action == Action::Raise));
        act(&mut game, 2, Action::Call, 0);

        let options: Vec<Action> = legal_actions(&game, 0).iter().map(|l| l.action).collect();
        assert_eq!(options, vec![Action::Fold, Action::Call]);
        act(&mut game, 0, Action::Call, 50);

        let h = hand(&game);
        assert_eq!(h.round, Round::Flop);
        assert_eq!(h.next_to_act, Some(2));
        assert_eq!(h.pots, vec![
            Pot { amount: 450, eligible: vec![0, 1, 2] }
        ]);
    }

    #[test]
    fn test_oversized_bet_is_capped_and_recorded_as_all_in() {
        let mut game = setup_table(&[1000, 1000]);
        act(&mut game, 0, Action::Call, 0);
        act(&mut game, 1, Action::Check, 0);
        let record = act(&mut game, 1, Action::Bet, 5000);
        assert_eq!((record.kind, record.amount), (ActionKind::AllIn, 990));
        assert_eq!(game.seats[1].status, SeatStatus::AllIn);
        assert_eq!(game.seats[1].stack, 0);

        // 对手已无法再回应，不能再加注
        let options: Vec<Action> = legal_actions(&game, 0).iter().map(|l| l.action).collect();
        assert_eq!(options, vec![Action::Fold, Action::Call, Action::AllIn]);
    }

    #[test]
    fn test_rejects_out_of_turn_and_illegal_amounts() {
        let mut game = setup_table(&[1000, 1000]);
        assert_eq!(apply_action(&mut game, 1, Action::Call, 0, false), Err(PokerError::NotPlayersTurn(1)));
        assert!(matches!(
            apply_action(&mut game, 0, Action::Check, 0, false),
            Err(PokerError::IllegalAction { action: Action::Check, .. })
        ));
        assert!(matches!(
            apply_action(&mut game, 0, Action::Call, 7, false),
            Err(PokerError::IllegalAction { action: Action::Call, .. })
        ));
        assert!(matches!(
            apply_action(&mut game, 0, Action::Bet, 100, false),
            Err(PokerError::IllegalAction { action: Action::Bet, .. })
        ));
    }

    #[test]
    fn test_all_in_and_call_runs_out_the_board() {
        let mut game = setup_table(&[1000, 1000]);
        act(&mut game, 0, Action::AllIn, 0);
        let call = act(&mut game, 1, Action::Call, 0);
        assert_eq!(call.kind, ActionKind::AllIn);

        let h = hand(&game);
        assert_eq!(h.round, Round::Showdown);
        assert_eq!(h.next_to_act, None);
        assert_eq!(h.community.len(), 5);
        assert_eq!(h.burned.len(), 3);
        assert_eq!(h.pots, vec![Pot { amount: 2000, eligible: vec![0, 1] }]);
    }

    #[test]
    fn test_fold_leaves_a_single_contender() {
        let mut game = setup_table(&[1000, 1000, 1000]);
        act(&mut game, 0, Action::Fold, 0);
        act(&mut game, 1, Action::Fold, 0);
        let h = hand(&game);
        assert_eq!(h.next_to_act, None);
        assert_eq!(h.round, Round::PreFlop);
        assert_eq!(h.pots, vec![Pot { amount: 15, eligible: vec![2] }]);
    }

    #[test]
    fn test_timeout_prefers_check_over_fold() {
        let mut game = setup_table(&[1000, 1000]);
        assert_eq!(timeout_action(&game, 0), Action::Fold);
        act(&mut game, 0, Action::Call, 0);
        assert_eq!(timeout_action(&game, 1), Action::Check);
    }

    #[test]
    fn test_sequence_numbers_follow_game_action_count() {
        let mut game = setup_table(&[1000, 1000]);
        let record = act(&mut game, 0, Action::Call, 0);
        assert_eq!(record.seq, 3);
        assert_eq!(game.action_count, 3);
        let seqs: Vec<u64> = hand(&game).actions.iter().map(|a| a.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
