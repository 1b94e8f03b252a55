//! # 链上德州扑克确定性引擎
//!
//! 这个 `core` crate 包含牌桌记录的全部状态转换：洗牌与牌力评估、
//! 座位与筹码账本、下注回合状态机、边池与结算，以及对外的请求和事件定义。
//! 所有输入只来自当前游戏记录、请求内容和区块数据：不读时钟、不用系统随机数、
//! 不遍历无序容器，因此每个副本对同一串请求都得出完全相同的结果。

mod betting;
mod card;
mod deck;
mod engine;
mod error;
mod message;
mod pot;
mod seats;
mod state;


pub use betting::*;
pub use card::*;
pub use deck::*;
pub use engine::*;
pub use error::*;
pub use message::*;
pub use pot::*;
pub use state::*;
