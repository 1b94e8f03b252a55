use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::store::GameStore;
use pokerchain_core::{
    BlockMeta, Game, GameConfig, GameEvent, GameId, GameStatus, GameType, LegalActionsView, NextPlayerToAct,
    PokerError, Request, Transition, Tx,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 一个已排序的区块：元数据加上按共识顺序排列的交易
#[derive(Debug, Clone)]
pub struct Block {
    pub meta: BlockMeta,
    pub txs: Vec<Tx>,
}

/// 交给广播层的事件，带上产生它的区块高度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub block_height: u64,
    pub event: GameEvent,
}

/// 节点里的牌桌托管者
///
/// 每条交易都是：读记录 -> 引擎转换 -> 写回 -> 发事件。
/// 同一张桌的请求由复制层保证串行送达，这里不再加锁。
pub struct Keeper<S: GameStore> {
    store: S,
    config: NodeConfig,
    events: mpsc::UnboundedSender<BlockEvent>,
}

impl<S: GameStore> Keeper<S> {
    /// 创建托管者，同时返回事件的接收端
    pub fn new(store: S, config: NodeConfig) -> (Self, mpsc::UnboundedReceiver<BlockEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Keeper { store, config, events }, rx)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 执行一条交易，成功时返回它作用的游戏 ID
    ///
    /// 被拒绝的请求不改动任何记录。引擎报告不变量被破坏时，
    /// 请求前的记录会以 `Closed` 状态和停止原因写回，之后对这张桌的请求一律拒绝。
    pub fn deliver(&self, tx: &Tx, meta: &BlockMeta) -> Result<GameId, NodeError> {
        let result = match tx.request.game_id() {
            None => self.create(tx, meta),
            Some(id) => self.update(id, tx, meta),
        };
        match &result {
            Ok(id) => info!("区块 {}: {} 的请求 {:?} 已执行, 游戏 {}", meta.height, tx.sender, tx.request, id),
            Err(e) if e.is_fatal() => {}
            Err(e) => warn!("区块 {}: 拒绝 {} 的请求 {:?}: {}", meta.height, tx.sender, tx.request, e),
        }
        result
    }

    /// 依次执行区块里的全部交易，返回每条交易的结果
    pub fn deliver_block(&self, block: &Block) -> Vec<Result<GameId, NodeError>> {
        debug!("开始处理区块 {}，共 {} 条交易", block.meta.height, block.txs.len());
        block.txs.iter().map(|tx| self.deliver(tx, &block.meta)).collect()
    }

    fn create(&self, tx: &Tx, meta: &BlockMeta) -> Result<GameId, NodeError> {
        let Request::CreateGame {
            min_buy_in,
            max_buy_in,
            min_players,
            max_players,
            small_blind,
            big_blind,
            action_timeout_seconds,
            game_type,
        } = &tx.request
        else {
            return Err(PokerError::InvalidConfig("not a create_game request".to_string()).into());
        };
        let game_type: GameType = game_type.parse()?;
        let config = GameConfig {
            min_buy_in: *min_buy_in,
            max_buy_in: *max_buy_in,
            min_players: *min_players,
            max_players: *max_players,
            small_blind: *small_blind,
            big_blind: *big_blind,
            timeout_secs: *action_timeout_seconds,
            game_type,
        };

        let id = pokerchain_core::derive_game_id(&tx.sender, meta, self.store.len() as u64);
        if self.store.contains(&id) {
            return Err(NodeError::GameExists(id));
        }
        let transition = pokerchain_core::create_game(id.clone(), &tx.sender, config, &self.config.limits, meta)?;
        self.commit(transition, meta);
        Ok(id)
    }

    fn update(&self, id: &str, tx: &Tx, meta: &BlockMeta) -> Result<GameId, NodeError> {
        let game = self.store.get(id).ok_or_else(|| NodeError::GameNotFound(id.to_string()))?;
        if let Some(reason) = &game.halted {
            return Err(NodeError::GameHalted { id: game.id.clone(), reason: reason.clone() });
        }

        let sender = tx.sender.as_str();
        let outcome = match &tx.request {
            Request::JoinGame { seat, buy_in, .. } => pokerchain_core::join_game(&game, sender, *seat, *buy_in, meta),
            Request::PerformAction { action, amount, .. } => {
                pokerchain_core::perform_action(&game, sender, *action, *amount, meta)
            }
            Request::LeaveGame { .. } => pokerchain_core::leave_game(&game, sender, meta),
            Request::TopUp { amount, .. } => pokerchain_core::top_up(&game, sender, *amount, meta),
            Request::ForceTimeout { seat, .. } => pokerchain_core::force_timeout(&game, *seat, meta),
            Request::SitOut { .. } => pokerchain_core::sit_out(&game, sender, meta),
            Request::SitIn { .. } => pokerchain_core::sit_in(&game, sender, meta),
            Request::NewHand { .. } => pokerchain_core::new_hand(&game, sender, meta),
            Request::CreateGame { .. } => return Err(NodeError::GameExists(game.id)),
        };

        match outcome {
            Ok(transition) => {
                self.commit(transition, meta);
                Ok(game.id)
            }
            Err(e) if e.is_fatal() => {
                self.halt(game, &e, meta);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn commit(&self, transition: Transition, meta: &BlockMeta) {
        let Transition { game, events } = transition;
        debug!("游戏 {} 写回，状态哈希 {}", game.id, game.state_hash());
        self.store.put(game);
        for event in events {
            let event = BlockEvent { block_height: meta.height, event };
            if self.events.send(event).is_err() {
                debug!("事件接收端已关闭，丢弃事件");
            }
        }
    }

    /// 引擎自身出错：丢弃这次的输出，停止这张桌
    fn halt(&self, mut game: Game, err: &PokerError, meta: &BlockMeta) {
        error!("区块 {}: 游戏 {} 出现不变量错误，已停止: {}", meta.height, game.id, err);
        game.status = GameStatus::Closed;
        game.halted = Some(err.to_string());
        game.updated_at = meta.time_ms;
        self.store.put(game);
    }

    // --- 只读查询 ---

    /// 游戏状态；`viewer` 只能看到自己的底牌
    pub fn game_state(&self, id: &str, viewer: Option<&str>) -> Result<Game, NodeError> {
        let game = self.load(id)?;
        Ok(pokerchain_core::game_view(&game, viewer))
    }

    pub fn legal_actions(&self, id: &str) -> Result<Option<LegalActionsView>, NodeError> {
        Ok(pokerchain_core::legal_actions_view(&self.load(id)?))
    }

    pub fn next_player_to_act(&self, id: &str) -> Result<Option<NextPlayerToAct>, NodeError> {
        Ok(pokerchain_core::next_player_to_act(&self.load(id)?))
    }

    pub fn list_games(&self) -> Vec<GameId> {
        self.store.ids()
    }

    pub fn state_hash(&self, id: &str) -> Result<String, NodeError> {
        Ok(self.load(id)?.state_hash())
    }

    fn load(&self, id: &str) -> Result<Game, NodeError> {
        self.store.get(id).ok_or_else(|| NodeError::GameNotFound(id.to_string()))
    }
}

impl<S: GameStore + 'static> Keeper<S> {
    /// 持续消费复制层送来的区块，直到通道关闭
    pub async fn run(self: Arc<Self>, mut blocks: mpsc::Receiver<Block>) {
        while let Some(block) = blocks.recv().await {
            let results = self.deliver_block(&block);
            let rejected = results.iter().filter(|r| r.is_err()).count();
            debug!("区块 {} 处理完毕，{} 条交易被拒绝", block.meta.height, rejected);
        }
        info!("区块通道已关闭，停止处理");
    }
}
