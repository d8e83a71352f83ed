use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按 key 串行化的异步锁集合
///
/// 每个 key (resource_id / payment_id) 一把 `tokio::sync::Mutex`，
/// 不同 key 之间互不阻塞。守卫可以跨 `.await` 持有 (网关调用)。
/// 最后一个持有者释放时条目随之移除，集合大小只取决于并发中的 key。
///
/// 锁顺序：resource → payment，绝不反向获取。
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// 持有中的 key 锁，drop 时释放并在无人等待时移除条目
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取 key 对应的锁，等待直到持有
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // DashMap 分片锁必须在 await 之前释放
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // 持有者与等待者各持一份 Arc；只剩 map 自己那份时才移除。
        // 克隆和移除都在同一分片锁内完成，不会丢掉别人正在等的锁。
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
