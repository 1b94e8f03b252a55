//! # 节点侧的牌桌托管
//!
//! 把复制层排好序的交易逐条交给 `pokerchain_core` 引擎：
//! 读出游戏记录、执行状态转换、写回新记录，把事件交给广播层，
//! 遇到引擎缺陷时停止那张桌。只读查询直接读存储。

mod config;
mod error;
mod keeper;
mod store;

pub use config::*;
pub use error::*;
pub use keeper::*;
pub use store::*;
