use crate::error::{InvariantViolation, PokerError};
use crate::state::*;

// --- 座位与筹码账本 ---

impl Game {
    /// 已入座且有筹码、可被发进下一局的人数
    pub fn funded_players(&self) -> usize {
        self.seats.iter().filter(|s| s.is_funded()).count()
    }

    /// 入座并买入
    ///
    /// - 游戏关闭时不可加入；座位号越界、已被占用或身份已在别的座位上时失败。
    /// - 买入额必须落在 `[min_buy_in, max_buy_in]` 内。
    /// - 新入座的玩家总是 `SittingOut`，由开局逻辑把他发进下一局。
    pub fn join(&mut self, seat: SeatId, identity: &str, buy_in: Chips) -> Result<(), PokerError> {
        if self.status == GameStatus::Closed {
            return Err(PokerError::GameNotJoinable);
        }
        let status = self.seats.get(seat).map(|s| s.status).ok_or(PokerError::NoSuchSeat(seat))?;
        if status != SeatStatus::Empty {
            return Err(PokerError::SeatTaken(seat));
        }
        if self.seat_of(identity).is_some() {
            return Err(PokerError::AlreadySeated(identity.to_string()));
        }
        let (min, max) = (self.config.min_buy_in, self.config.max_buy_in);
        if buy_in < min || buy_in > max {
            return Err(PokerError::BuyInOutOfRange { amount: buy_in, min, max });
        }
        let total_buy_ins =
            self.ledger.total_buy_ins.checked_add(buy_in).ok_or(PokerError::ChipOverflow { amount: buy_in })?;

        self.seats[seat] = Seat {
            index: seat,
            occupant: Some(identity.to_string()),
            stack: buy_in,
            status: SeatStatus::SittingOut,
            away: false,
        };
        self.ledger.total_buy_ins = total_buy_ins;
        Ok(())
    }

    /// 离座，返回 (座位号, 退还的筹码)
    ///
    /// 仍在争夺当前底池的座位（Active / AllIn）不能离开。
    /// 已弃牌的座位离开后标记为 `Left`，等本局结束再清空。
    pub fn leave(&mut self, identity: &str) -> Result<(SeatId, Chips), PokerError> {
        let index = self.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
        let seat = &mut self.seats[index];
        if seat.is_contending() {
            return Err(PokerError::NotEligibleToLeave);
        }

        let refund = seat.stack;
        seat.stack = 0;
        if seat.status == SeatStatus::Folded {
            seat.status = SeatStatus::Left;
        } else {
            *seat = Seat::empty(index);
        }
        self.ledger.total_cashed_out += refund;
        Ok((index, refund))
    }

    /// 补充筹码，返回 (座位号, 补充后的筹码量)
    ///
    /// 只允许在座位没有被发进正在进行的一局时补充，补充后不得超过最大买入。
    pub fn top_up(&mut self, identity: &str, amount: Chips) -> Result<(SeatId, Chips), PokerError> {
        let index = self.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
        let max = self.config.max_buy_in;
        let seat = &mut self.seats[index];
        if seat.status != SeatStatus::SittingOut {
            return Err(PokerError::TopUpNotAllowed);
        }
        let new_stack = match seat.stack.checked_add(amount) {
            Some(stack) if amount > 0 && stack <= max => stack,
            _ => return Err(PokerError::TopUpOutOfRange { amount, max }),
        };
        let total_buy_ins =
            self.ledger.total_buy_ins.checked_add(amount).ok_or(PokerError::ChipOverflow { amount })?;

        seat.stack = new_stack;
        self.ledger.total_buy_ins = total_buy_ins;
        Ok((index, new_stack))
    }

    /// 暂离，返回座位号
    ///
    /// 座位和筹码都保留，只是不再被发进新的一局。已经被发进当前这一局的话，
    /// 本局照常打完，结束后才生效。
    pub fn sit_out(&mut self, identity: &str) -> Result<SeatId, PokerError> {
        let index = self.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
        let seat = &mut self.seats[index];
        if seat.away {
            return Err(PokerError::AlreadySittingOut);
        }
        seat.away = true;
        Ok(index)
    }

    /// 结束暂离，从下一局开始重新发牌
    pub fn sit_in(&mut self, identity: &str) -> Result<SeatId, PokerError> {
        let index = self.seat_of(identity).ok_or_else(|| PokerError::NotSeated(identity.to_string()))?;
        let seat = &mut self.seats[index];
        if !seat.away {
            return Err(PokerError::NotSittingOut);
        }
        seat.away = false;
        Ok(index)
    }

    /// 从座位筹码中扣除；扣成负数说明引擎自身有缺陷
    pub fn debit(&mut self, seat: SeatId, amount: Chips) -> Result<(), InvariantViolation> {
        let stack = self.seats.get(seat).map_or(0, |s| s.stack);
        if amount > stack {
            return Err(InvariantViolation::StackUnderflow { seat, stack, amount });
        }
        self.seats[seat].stack -= amount;
        Ok(())
    }

    pub fn credit(&mut self, seat: SeatId, amount: Chips) -> Result<(), InvariantViolation> {
        let Some(s) = self.seats.get_mut(seat) else {
            return Err(InvariantViolation::StackUnderflow { seat, stack: 0, amount });
        };
        s.stack = s
            .stack
            .checked_add(amount)
            .ok_or(InvariantViolation::StackOverflow { seat, stack: s.stack, amount })?;
        Ok(())
    }
}
