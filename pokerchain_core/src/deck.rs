use crate::card::{canonical_deck, Card};
use crate::error::InvariantViolation;
use crate::state::BlockMeta;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const DOMAIN_SHUFFLE_SEED: &[u8] = b"pokerchain/shuffle/seed/v1";

/// 一局洗牌用的 32 字节种子
///
/// 只由各副本一致的数据（区块数据、游戏 ID、局号）生成，所有副本得到同一个排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleSeed([u8; 32]);

impl ShuffleSeed {
    pub fn derive(meta: &BlockMeta, game_id: &str, hand_number: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_SHUFFLE_SEED);
        hasher.update(meta.height.to_be_bytes());
        hasher.update(meta.time_ms.to_be_bytes());
        write_bytes(&mut hasher, &meta.app_hash);
        write_bytes(&mut hasher, game_id.as_bytes());
        hasher.update(hand_number.to_be_bytes());
        ShuffleSeed(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvariantViolation> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InvariantViolation::MalformedSeed { len: bytes.len() })?;
        Ok(ShuffleSeed(seed))
    }

    pub fn from_hex(s: &str) -> Result<Self, InvariantViolation> {
        let bytes = hex::decode(s).map_err(|_| InvariantViolation::MalformedSeed { len: s.len() / 2 })?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// 确定性字节流：`SHA-256(seed || counter)` 逐块输出，counter 从 0 开始
struct SeedStream {
    seed: [u8; 32],
    counter: u64,
    block: [u8; 32],
    offset: usize,
}

impl SeedStream {
    fn new(seed: &ShuffleSeed) -> Self {
        SeedStream { seed: seed.0, counter: 0, block: [0; 32], offset: 32 }
    }

    fn next_u32(&mut self) -> u32 {
        let mut word = [0u8; 4];
        for byte in &mut word {
            if self.offset == self.block.len() {
                let mut hasher = Sha256::new();
                hasher.update(self.seed);
                hasher.update(self.counter.to_be_bytes());
                self.block = hasher.finalize().into();
                self.counter += 1;
                self.offset = 0;
            }
            *byte = self.block[self.offset];
            self.offset += 1;
        }
        u32::from_be_bytes(word)
    }

    /// 拒绝采样，从 `0..bound` 均匀取值
    fn below(&mut self, bound: u32) -> u32 {
        let zone = u32::MAX - (u32::MAX % bound);
        loop {
            let x = self.next_u32();
            if x < zone {
                return x % bound;
            }
        }
    }
}

/// 打乱标准 52 张牌，结果只取决于种子
pub fn shuffle(seed: &ShuffleSeed) -> Vec<Card> {
    let mut cards = canonical_deck();
    let mut stream = SeedStream::new(seed);
    for i in (1..cards.len()).rev() {
        let j = stream.below(i as u32 + 1) as usize;
        cards.swap(i, j);
    }
    cards
}

/// 洗好的一副牌和下一张要发的位置
///
/// 序列化为助记符列表，下一张牌用方括号标出，如 `"AC-2C-[3C]-..."`；发完的牌没有方括号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Deck {
    cards: Vec<Card>,
    top: usize,
}

impl Deck {
    pub fn shuffled(seed: &ShuffleSeed) -> Self {
        Deck { cards: shuffle(seed), top: 0 }
    }

    /// 公开视图里隐藏牌堆时用的空占位
    pub fn hidden() -> Self {
        Deck { cards: Vec::new(), top: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.top
    }

    /// 已经发出的牌，按发牌顺序
    pub fn dealt(&self) -> &[Card] {
        &self.cards[..self.top]
    }

    pub fn undealt(&self) -> &[Card] {
        &self.cards[self.top..]
    }

    /// 取出接下来的 `n` 张牌。要的比剩下的多说明引擎有缺陷。
    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, InvariantViolation> {
        if n > self.remaining() {
            return Err(InvariantViolation::DeckUnderflow { requested: n, remaining: self.remaining() });
        }
        let cards = self.cards[self.top..self.top + n].to_vec();
        self.top += n;
        Ok(cards)
    }

    pub fn deal_one(&mut self) -> Result<Card, InvariantViolation> {
        let mut cards = self.deal(1)?;
        cards.pop().ok_or(InvariantViolation::DeckUnderflow { requested: 1, remaining: 0 })
    }

    /// 整副牌洗后顺序的 SHA-256，公布出来便于审计
    pub fn order_hash(&self) -> String {
        let order: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        hex::encode(Sha256::digest(order.join("-").as_bytes()))
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, card) in self.cards.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            if i == self.top {
                write!(f, "[{}]", card)?;
            } else {
                write!(f, "{}", card)?;
            }
        }
        Ok(())
    }
}

impl From<Deck> for String {
    fn from(deck: Deck) -> Self {
        deck.to_string()
    }
}

impl TryFrom<String> for Deck {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Ok(Deck::hidden());
        }
        let mut cards = Vec::with_capacity(52);
        let mut top = None;
        for (i, token) in s.split('-').enumerate() {
            let mnemonic = match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                Some(inner) => {
                    if top.replace(i).is_some() {
                        return Err(format!("deck marks more than one top card: {}", s));
                    }
                    inner
                }
                None => token,
            };
            let card: Card = mnemonic.parse().map_err(|e| format!("card {}: {}", i, e))?;
            cards.push(card);
        }
        let mut sorted = cards.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != cards.len() {
            return Err("deck contains duplicate cards".to_string());
        }
        let top = top.unwrap_or(cards.len());
        Ok(Deck { cards, top })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(height: u64) -> BlockMeta {
        BlockMeta { height, time_ms: 1_700_000_000_000, app_hash: vec![0xab; 32] }
    }

    #[test]
    fn shuffle_is_a_pure_function_of_the_seed() {
        let seed = ShuffleSeed::derive(&meta(10), "0xgame", 1);
        assert_eq!(shuffle(&seed), shuffle(&seed));
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_canonical_deck() {
        let seed = ShuffleSeed::derive(&meta(10), "0xgame", 1);
        let mut cards = shuffle(&seed);
        assert_ne!(cards, canonical_deck());
        cards.sort();
        let mut canonical = canonical_deck();
        canonical.sort();
        assert_eq!(cards, canonical);
    }

    #[test]
    fn seed_depends_on_every_input() {
        let base = ShuffleSeed::derive(&meta(10), "0xgame", 1);
        assert_ne!(base, ShuffleSeed::derive(&meta(11), "0xgame", 1));
        assert_ne!(base, ShuffleSeed::derive(&meta(10), "0xother", 1));
        assert_ne!(base, ShuffleSeed::derive(&meta(10), "0xgame", 2));
        let mut other_hash = meta(10);
        other_hash.app_hash = vec![0xcd; 32];
        assert_ne!(base, ShuffleSeed::derive(&other_hash, "0xgame", 1));
    }

    #[test]
    fn malformed_seed_length_is_rejected() {
        assert_eq!(
            ShuffleSeed::from_bytes(&[0u8; 31]),
            Err(InvariantViolation::MalformedSeed { len: 31 })
        );
        let seed = ShuffleSeed::derive(&meta(3), "0xgame", 7);
        assert_eq!(ShuffleSeed::from_hex(&seed.to_hex()), Ok(seed));
    }

    #[test]
    fn dealing_past_the_end_is_an_invariant_violation() {
        let mut deck = Deck::shuffled(&ShuffleSeed::derive(&meta(1), "0xgame", 1));
        let first = deck.deal(50).expect("50 of 52");
        assert_eq!(first.len(), 50);
        assert_eq!(deck.remaining(), 2);
        assert_eq!(
            deck.deal(3),
            Err(InvariantViolation::DeckUnderflow { requested: 3, remaining: 2 })
        );
        assert_eq!(deck.remaining(), 2);
    }

    #[test]
    fn deck_string_marks_the_next_card() {
        let mut deck = Deck::shuffled(&ShuffleSeed::derive(&meta(1), "0xgame", 1));
        deck.deal(2).expect("two cards");
        let encoded = deck.to_string();
        let third = deck.undealt()[0];
        assert!(encoded.contains(&format!("[{}]", third)));
        assert_eq!(encoded.split('-').count(), 52);

        let decoded = Deck::try_from(encoded).expect("round trip");
        assert_eq!(decoded, deck);
        assert!(Deck::try_from("AC-AC".to_string()).is_err());
    }
}
