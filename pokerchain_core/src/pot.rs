use crate::card::HandRank;
use crate::error::InvariantViolation;
use crate::state::{Chips, Payout, Pot, SeatId};
use std::collections::BTreeMap;

/// 一个座位在本局中的总投入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub seat: SeatId,
    pub amount: Chips,
    pub folded: bool,
    pub all_in: bool,
}

/// 按全下金额切分主池和边池
///
/// 1. 切分点：每个未弃牌全下座位的投入额，最后加上所有投入中的最大值。
/// 2. 每个切分点收取各座位在 (上一切分点, 本切分点] 区间内的投入。
/// 3. 资格：未弃牌且投入达到本切分点的座位；最后一层只要求超过上一切分点。
///
/// 金额为 0 的池被丢弃；有金额却没有任何资格座位的池是引擎缺陷。
pub fn build_side_pots(contributions: &[Contribution]) -> Result<Vec<Pot>, InvariantViolation> {
    let top = contributions.iter().map(|c| c.amount).max().unwrap_or(0);
    let mut levels: Vec<Chips> = contributions
        .iter()
        .filter(|c| c.all_in && !c.folded && c.amount > 0)
        .map(|c| c.amount)
        .chain(std::iter::once(top))
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut floor = 0;
    for (i, &level) in levels.iter().enumerate() {
        if level <= floor {
            continue;
        }
        let is_last = i + 1 == levels.len();
        let amount: Chips = contributions.iter().map(|c| c.amount.min(level).saturating_sub(floor)).sum();
        let mut eligible: Vec<SeatId> = contributions
            .iter()
            .filter(|c| !c.folded && if is_last { c.amount > floor } else { c.amount >= level })
            .map(|c| c.seat)
            .collect();
        eligible.sort_unstable();

        if amount > 0 {
            if eligible.is_empty() {
                return Err(InvariantViolation::EmptyPotEligibility { amount });
            }
            pots.push(Pot { amount, eligible });
        }
        floor = level;
    }
    Ok(pots)
}

/// 摊牌结算
///
/// 每个池由资格座位中牌力最大者平分；只有一个资格座位时无需比牌。
/// 除不尽的筹码按座位号从小到大逐个发给并列的赢家。
/// 返回的派彩按座位号升序合并。
pub fn settle(pots: &[Pot], evaluations: &[(SeatId, HandRank)]) -> Result<Vec<Payout>, InvariantViolation> {
    let mut totals: BTreeMap<SeatId, Chips> = BTreeMap::new();

    for pot in pots {
        let winners: Vec<SeatId> = if let [only] = pot.eligible.as_slice() {
            vec![*only]
        } else {
            let ranked: Vec<(SeatId, &HandRank)> = pot
                .eligible
                .iter()
                .filter_map(|seat| evaluations.iter().find(|(s, _)| s == seat).map(|(s, r)| (*s, r)))
                .collect();
            match ranked.iter().map(|(_, r)| *r).max() {
                Some(best) => ranked.iter().filter(|(_, r)| *r == best).map(|(s, _)| *s).collect(),
                None => Vec::new(),
            }
        };
        if winners.is_empty() {
            return Err(InvariantViolation::EmptyPotEligibility { amount: pot.amount });
        }

        // winners 继承了 eligible 的升序
        let share = pot.amount / winners.len() as Chips;
        let remainder = (pot.amount % winners.len() as Chips) as usize;
        for (i, seat) in winners.iter().enumerate() {
            let odd_chip = if i < remainder { 1 } else { 0 };
            *totals.entry(*seat).or_default() += share + odd_chip;
        }
    }

    Ok(totals.into_iter().filter(|(_, amount)| *amount > 0).map(|(seat, amount)| Payout { seat, amount }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rank;

    fn c(seat: SeatId, amount: Chips, folded: bool, all_in: bool) -> Contribution {
        Contribution { seat, amount, folded, all_in }
    }

    #[test]
    fn all_in_stacks_of_100_500_500_make_main_and_side_pot() {
        let pots = build_side_pots(&[c(0, 100, false, true), c(1, 500, false, true), c(2, 500, false, true)]).unwrap();
        assert_eq!(
            pots,
            vec![
                Pot { amount: 300, eligible: vec![0, 1, 2] },
                Pot { amount: 800, eligible: vec![1, 2] },
            ]
        );
    }

    #[test]
    fn folded_chips_stay_in_the_pot_without_eligibility() {
        let pots = build_side_pots(&[c(0, 50, true, false), c(1, 200, false, false), c(2, 200, false, false)]).unwrap();
        assert_eq!(pots, vec![Pot { amount: 450, eligible: vec![1, 2] }]);
    }

    #[test]
    fn uncalled_excess_forms_its_own_pot() {
        let pots = build_side_pots(&[c(0, 100, false, true), c(1, 300, false, false), c(2, 100, true, false)]).unwrap();
        assert_eq!(
            pots,
            vec![
                Pot { amount: 300, eligible: vec![0, 1] },
                Pot { amount: 200, eligible: vec![1] },
            ]
        );
    }

    #[test]
    fn no_contributions_no_pots() {
        assert!(build_side_pots(&[c(0, 0, false, false), c(1, 0, false, false)]).unwrap().is_empty());
    }

    #[test]
    fn pot_without_eligible_seat_is_fatal() {
        assert_eq!(
            build_side_pots(&[c(0, 40, true, false), c(1, 40, true, false)]),
            Err(InvariantViolation::EmptyPotEligibility { amount: 80 })
        );
    }

    #[test]
    fn side_pot_goes_to_best_eligible_hand() {
        let pots = vec![Pot { amount: 300, eligible: vec![0, 1, 2] }, Pot { amount: 800, eligible: vec![1, 2] }];
        let evals = vec![
            (0, HandRank::Flush(Rank::Ace, Rank::Jack, Rank::Nine, Rank::Five, Rank::Two)),
            (1, HandRank::OnePair(Rank::King, Rank::Ace, Rank::Queen, Rank::Two)),
            (2, HandRank::TwoPair(Rank::Four, Rank::Three, Rank::Ace)),
        ];
        assert_eq!(
            settle(&pots, &evals).unwrap(),
            vec![Payout { seat: 0, amount: 300 }, Payout { seat: 2, amount: 800 }]
        );
    }

    #[test]
    fn odd_chip_goes_to_earliest_seat() {
        let pots = vec![Pot { amount: 25, eligible: vec![1, 3, 4] }];
        let tie = HandRank::Straight(Rank::Ten);
        let evals = vec![(4, tie.clone()), (1, tie.clone()), (3, tie)];
        assert_eq!(
            settle(&pots, &evals).unwrap(),
            vec![
                Payout { seat: 1, amount: 9 },
                Payout { seat: 3, amount: 8 },
                Payout { seat: 4, amount: 8 },
            ]
        );
    }

    #[test]
    fn single_eligible_seat_wins_without_evaluation() {
        let pots = vec![Pot { amount: 70, eligible: vec![2] }];
        assert_eq!(settle(&pots, &[]).unwrap(), vec![Payout { seat: 2, amount: 70 }]);
    }
}
