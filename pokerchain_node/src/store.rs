use dashmap::DashMap;
use pokerchain_core::{Game, GameId};

/// 游戏记录的存取接口，真实节点背后是链上 KV 存储
pub trait GameStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Game>;
    fn put(&self, game: Game);
    fn contains(&self, id: &str) -> bool;
    fn len(&self) -> usize;
    /// 所有游戏 ID，升序
    fn ids(&self) -> Vec<GameId>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 内存实现。不同游戏之间互不影响，按游戏 ID 分片加锁即可。
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: DashMap<GameId, Game>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn get(&self, id: &str) -> Option<Game> {
        self.games.get(id).map(|entry| entry.value().clone())
    }

    fn put(&self, game: Game) {
        self.games.insert(game.id.clone(), game);
    }

    fn contains(&self, id: &str) -> bool {
        self.games.contains_key(id)
    }

    fn len(&self) -> usize {
        self.games.len()
    }

    fn ids(&self) -> Vec<GameId> {
        // DashMap 的遍历顺序不确定，对外一律排序
        let mut ids: Vec<GameId> = self.games.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }
}
