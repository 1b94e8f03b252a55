use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- 核心数据结构 ---

/// 花色，声明顺序即标准牌序
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

/// 点数。派生的 `Ord` 让 A 最大；A-2-3-4-5 的顺子由评估函数单独处理。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

    fn letter(self) -> char {
        match self {
            Suit::Club => 'C',
            Suit::Diamond => 'D',
            Suit::Heart => 'H',
            Suit::Spade => 'S',
        }
    }
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];

    fn letter(self) -> char {
        match self {
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        }
    }
}

/// 一张扑克牌
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }
}

/// 最佳五张牌的牌型
///
/// 1. 变体从小到大声明，派生的 `Ord` 可以直接比较牌型大小。
/// 2. 每个变体带上同牌型内比大小所需的全部点数（对子、三条、踢脚……）。
///    比较结果为 `Equal` 的两手牌平分底池。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Serialize, Deserialize)]
pub enum HandRank {
    HighCard(Rank, Rank, Rank, Rank, Rank),
    OnePair(Rank, Rank, Rank, Rank),
    TwoPair(Rank, Rank, Rank),
    ThreeOfAKind(Rank, Rank, Rank),
    Straight(Rank),                      // 顺子最大的那张
    Flush(Rank, Rank, Rank, Rank, Rank),
    FullHouse(Rank, Rank),               // (三条, 对子)
    FourOfAKind(Rank, Rank),             // (四条, 踢脚)
    StraightFlush(Rank),
    RoyalFlush,
}

// --- 显示与解析 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// 助记符：点数在前、花色在后，如 `AC`、`TD`、`7H`
impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid card mnemonic: {0:?}")]
pub struct ParseCardError(pub String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let mut chars = upper.chars();
        let (Some(r), Some(su), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ParseCardError(s.to_string()));
        };
        let rank = Rank::ALL.into_iter().find(|rank| rank.letter() == r);
        let suit = Suit::ALL.into_iter().find(|suit| suit.letter() == su);
        match (rank, suit) {
            (Some(rank), Some(suit)) => Ok(Card { rank, suit }),
            _ => Err(ParseCardError(s.to_string())),
        }
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandRank::HighCard(r1, ..) => write!(f, "high card ({})", r1),
            HandRank::OnePair(r1, ..) => write!(f, "one pair ({})", r1),
            HandRank::TwoPair(r1, r2, ..) => write!(f, "two pair ({},{})", r1, r2),
            HandRank::ThreeOfAKind(r1, ..) => write!(f, "three of a kind ({})", r1),
            HandRank::Straight(r1) => write!(f, "straight ({} high)", r1),
            HandRank::Flush(r1, ..) => write!(f, "flush ({} high)", r1),
            HandRank::FullHouse(r1, r2) => write!(f, "full house ({} over {})", r1, r2),
            HandRank::FourOfAKind(r1, ..) => write!(f, "four of a kind ({})", r1),
            HandRank::StraightFlush(r1) => write!(f, "straight flush ({} high)", r1),
            HandRank::RoyalFlush => write!(f, "royal flush"),
        }
    }
}

/// 按标准顺序排列的 52 张牌：梅花、方块、红桃、黑桃，每种花色从 2 到 A
pub fn canonical_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in &Rank::ALL {
            deck.push(Card { rank, suit });
        }
    }
    deck
}

// --- 牌力评估 ---

/// 用底牌加公共牌评估一个座位的牌力
pub fn evaluate(hole_cards: &[Card], board_cards: &[Card]) -> HandRank {
    let mut all_cards = Vec::with_capacity(hole_cards.len() + board_cards.len());
    all_cards.extend_from_slice(hole_cards);
    all_cards.extend_from_slice(board_cards);
    find_best_hand(&all_cards)
}

/// 从 5 到 7 张牌中找出最大的五张组合
///
/// # Panics
/// 牌数少于 5 或多于 7 时 panic。
pub fn find_best_hand(all_cards: &[Card]) -> HandRank {
    let card_count = all_cards.len();
    assert!((5..=7).contains(&card_count), "hand evaluation needs 5 to 7 cards");

    if card_count == 5 {
        return evaluate_5_card_hand(all_cards);
    }

    // 穷举所有五张组合，贪心剪枝会漏掉顺子和同花
    get_combinations(all_cards, 5)
        .iter()
        .map(|hand| evaluate_5_card_hand(hand))
        .fold(evaluate_5_card_hand(&all_cards[..5]), |best, rank| best.max(rank))
}

fn evaluate_5_card_hand(hand: &[Card]) -> HandRank {
    assert_eq!(hand.len(), 5, "five cards expected");

    let mut cards = hand.to_vec();
    cards.sort_by(|a, b| b.rank.cmp(&a.rank));
    let ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();

    let is_flush = cards.windows(2).all(|w| w[0].suit == w[1].suit);

    let is_wheel = ranks == [Rank::Ace, Rank::Five, Rank::Four, Rank::Three, Rank::Two];
    let is_straight = is_wheel || ranks.windows(2).all(|w| w[0] as u8 == w[1] as u8 + 1);

    let high_card = if is_wheel { Rank::Five } else { ranks[0] };

    if is_straight && is_flush {
        return if high_card == Rank::Ace {
            HandRank::RoyalFlush
        } else {
            HandRank::StraightFlush(high_card)
        };
    }

    // 用定长数组统计点数，再按 (张数, 点数) 降序排列
    let mut counts = [0u8; 13];
    for rank in &ranks {
        counts[*rank as usize] += 1;
    }
    let mut sorted_counts: Vec<(u8, Rank)> = Rank::ALL
        .iter()
        .filter(|r| counts[**r as usize] > 0)
        .map(|r| (counts[*r as usize], *r))
        .collect();
    sorted_counts.sort_by(|a, b| b.cmp(a));

    match sorted_counts[0].0 {
        4 => HandRank::FourOfAKind(sorted_counts[0].1, sorted_counts[1].1),
        3 => {
            if sorted_counts[1].0 == 2 {
                HandRank::FullHouse(sorted_counts[0].1, sorted_counts[1].1)
            } else {
                HandRank::ThreeOfAKind(sorted_counts[0].1, sorted_counts[1].1, sorted_counts[2].1)
            }
        }
        2 => {
            if sorted_counts[1].0 == 2 {
                HandRank::TwoPair(sorted_counts[0].1, sorted_counts[1].1, sorted_counts[2].1)
            } else {
                HandRank::OnePair(
                    sorted_counts[0].1,
                    sorted_counts[1].1,
                    sorted_counts[2].1,
                    sorted_counts[3].1,
                )
            }
        }
        _ => {
            if is_flush {
                HandRank::Flush(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4])
            } else if is_straight {
                HandRank::Straight(high_card)
            } else {
                HandRank::HighCard(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4])
            }
        }
    }
}

/// `data` 中所有大小为 `k` 的组合，按下标字典序
fn get_combinations<T: Clone>(data: &[T], k: usize) -> Vec<Vec<T>> {
    if k == 0 {
        return vec![vec![]];
    }
    if data.len() < k {
        return vec![];
    }

    let mut result = vec![];
    let (first, rest) = data.split_at(1);

    let mut combinations_with_first = get_combinations(rest, k - 1);
    for combo in &mut combinations_with_first {
        combo.insert(0, first[0].clone());
    }
    result.append(&mut combinations_with_first);

    if data.len() > k {
        let mut combinations_without_first = get_combinations(rest, k);
        result.append(&mut combinations_without_first);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use Rank::*;
    use Suit::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    // --- 五张牌型 ---
    #[test]
    fn test_royal_flush() {
        let hand = [card(Ten, Spade), card(Ace, Spade), card(Queen, Spade), card(King, Spade), card(Jack, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::RoyalFlush);
    }

    #[test]
    fn test_straight_flush() {
        let hand = [card(Nine, Heart), card(Ten, Heart), card(Eight, Heart), card(Jack, Heart), card(Seven, Heart)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::StraightFlush(Jack));
    }

    #[test]
    fn test_ace_low_straight_flush() {
        let hand = [card(Ace, Club), card(Two, Club), card(Three, Club), card(Four, Club), card(Five, Club)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::StraightFlush(Five));
    }

    #[test]
    fn test_four_of_a_kind() {
        let hand = [card(Ace, Spade), card(Ace, Heart), card(Ace, Diamond), card(Ace, Club), card(King, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::FourOfAKind(Ace, King));
    }

    #[test]
    fn test_full_house() {
        let hand = [card(King, Spade), card(King, Heart), card(King, Diamond), card(Queen, Club), card(Queen, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::FullHouse(King, Queen));
    }

    #[test]
    fn test_flush() {
        let hand = [card(Two, Diamond), card(Five, Diamond), card(Eight, Diamond), card(Jack, Diamond), card(Ace, Diamond)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::Flush(Ace, Jack, Eight, Five, Two));
    }

    #[test]
    fn test_ace_low_straight() {
        let hand = [card(Ace, Spade), card(Two, Heart), card(Three, Diamond), card(Four, Club), card(Five, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::Straight(Five));
    }

    #[test]
    fn test_two_pair_and_kicker() {
        let hand = [card(Jack, Spade), card(Jack, Heart), card(Nine, Diamond), card(Nine, Club), card(Ten, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::TwoPair(Jack, Nine, Ten));
    }

    #[test]
    fn test_high_card() {
        let hand = [card(King, Spade), card(Queen, Heart), card(Jack, Diamond), card(Nine, Club), card(Seven, Spade)];
        assert_eq!(evaluate_5_card_hand(&hand), HandRank::HighCard(King, Queen, Jack, Nine, Seven));
    }

    // --- 七选五 ---

    #[test]
    fn test_best_hand_from_seven_is_flush() {
        let hole = [card(Ace, Heart), card(King, Heart)];
        let board = [card(Ten, Heart), card(Two, Heart), card(Five, Heart), card(Ace, Spade), card(Ten, Club)];
        assert_eq!(evaluate(&hole, &board), HandRank::Flush(Ace, King, Ten, Five, Two));
    }

    #[test]
    fn test_best_hand_from_seven_plays_the_board() {
        let hole = [card(Two, Spade), card(Two, Heart)];
        let board = [card(Ten, Club), card(Jack, Diamond), card(Queen, Heart), card(King, Spade), card(Ace, Club)];
        assert_eq!(evaluate(&hole, &board), HandRank::Straight(Ace));
    }

    #[test]
    fn test_trips_on_board_full_house_beats_kickers() {
        let board = [card(Nine, Club), card(Nine, Diamond), card(Nine, Heart), card(Four, Spade), card(Two, Club)];
        let full_house = evaluate(&[card(Four, Club), card(Three, Heart)], &board);
        let trips_with_kickers = evaluate(&[card(Ace, Club), card(King, Heart)], &board);
        assert_eq!(full_house, HandRank::FullHouse(Nine, Four));
        assert_eq!(trips_with_kickers, HandRank::ThreeOfAKind(Nine, Ace, King));
        assert!(full_house > trips_with_kickers);
    }

    #[test]
    fn test_identical_best_hands_tie() {
        let board = [card(Ace, Club), card(King, Diamond), card(Queen, Heart), card(Jack, Spade), card(Ten, Club)];
        let a = evaluate(&[card(Two, Club), card(Three, Heart)], &board);
        let b = evaluate(&[card(Four, Diamond), card(Five, Spade)], &board);
        assert_eq!(a.cmp(&b), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_rank_comparison() {
        assert!(HandRank::RoyalFlush > HandRank::StraightFlush(King));
        assert!(HandRank::StraightFlush(Five) > HandRank::FourOfAKind(Ace, King));
        assert!(HandRank::FullHouse(King, Two) > HandRank::FullHouse(Queen, Ace));
        assert!(HandRank::Flush(King, Jack, Ten, Five, Two) > HandRank::Flush(Queen, Jack, Ten, Five, Two));
        assert!(HandRank::Straight(Six) > HandRank::Straight(Five));
        assert!(HandRank::OnePair(Two, Five, Four, Three) > HandRank::HighCard(Ace, King, Queen, Jack, Nine));
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(card(Ace, Club).to_string(), "AC");
        assert_eq!(card(Ten, Diamond).to_string(), "TD");
        assert_eq!("7h".parse::<Card>(), Ok(card(Seven, Heart)));
        assert!("1S".parse::<Card>().is_err());
        assert!("ACE".parse::<Card>().is_err());
    }

    #[test]
    fn test_canonical_deck_is_52_distinct_cards() {
        let deck = canonical_deck();
        assert_eq!(deck.len(), 52);
        let mut sorted = deck.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 52);
        assert_eq!(deck[0], card(Two, Club));
        assert_eq!(deck[51], card(Ace, Spade));
    }
}
