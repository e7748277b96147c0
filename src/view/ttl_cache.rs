// ==========================================
// 课程排班系统 - TTL 缓存
// ==========================================
// 职责: 键 → (写入时间, 值) 的进程内缓存，过期条目视为未命中
// 约束: 读只取共享读锁；写入/失效后写者胜
// 约束: 计算期间发生失效时，计算结果不写回（陈旧成员关系不跨越一次变更）
// ==========================================

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// 默认有效期: 10 分钟
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

struct Entry<V> {
    inserted_at: Instant,
    value: Arc<V>,
}

struct CacheState<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// 每键失效代数，invalidate 时递增
    generations: HashMap<K, u64>,
    /// 全量清空代数，clear 时递增
    epoch: u64,
}

impl<K: Eq + Hash, V> CacheState<K, V> {
    fn stamp(&self, key: &K) -> (u64, u64) {
        (self.epoch, self.generations.get(key).copied().unwrap_or(0))
    }
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    state: RwLock<CacheState<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                generations: HashMap::new(),
                epoch: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<K, V>> {
        match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<K, V>> {
        match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 读取未过期的值
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.read()
            .entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.write().entries.insert(
            key,
            Entry {
                inserted_at: Instant::now(),
                value: Arc::clone(&value),
            },
        );
        value
    }

    /// 命中则返回缓存值，否则计算并写入
    ///
    /// 计算期间不持有锁。若计算期间该键被失效（或缓存被清空），
    /// 结果只返回给调用方，不写回缓存
    pub fn get_or_try_insert_with<E, F>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let stamp = {
            let state = self.read();
            if let Some(hit) = state
                .entries
                .get(&key)
                .filter(|e| e.inserted_at.elapsed() < self.ttl)
            {
                return Ok(Arc::clone(&hit.value));
            }
            state.stamp(&key)
        };

        let value = Arc::new(compute()?);

        let mut state = self.write();
        if state.stamp(&key) == stamp {
            state.entries.insert(
                key,
                Entry {
                    inserted_at: Instant::now(),
                    value: Arc::clone(&value),
                },
            );
        } else {
            tracing::debug!("计算期间缓存键已失效，结果不写回");
        }
        Ok(value)
    }

    /// 失效指定键，返回是否存在
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = self.write();
        *state.generations.entry(key.clone()).or_insert(0) += 1;
        state.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.epoch += 1;
        state.entries.clear();
    }

    /// 当前条目数（含已过期但未清理的）
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::thread;

    #[test]
    fn test_hit_skips_compute() {
        let cache: TtlCache<&str, i32> = TtlCache::default();
        let calls = Cell::new(0);
        let compute = || -> Result<i32, ()> {
            calls.set(calls.get() + 1);
            Ok(42)
        };

        assert_eq!(*cache.get_or_try_insert_with("k", compute).unwrap(), 42);
        assert_eq!(*cache.get_or_try_insert_with("k", compute).unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache: TtlCache<u8, &str> = TtlCache::new(Duration::from_millis(20));
        cache.insert(1, "v");
        assert!(cache.get(&1).is_some());
        thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn test_invalidate_and_errors_not_cached() {
        let cache: TtlCache<u8, i32> = TtlCache::default();
        cache.insert(1, 10);
        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));

        let err: Result<Arc<i32>, &str> = cache.get_or_try_insert_with(2, || Err("boom"));
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_during_compute_skips_write_back() {
        let cache: TtlCache<u8, i32> = TtlCache::default();

        // 计算读到旧状态，期间发生一次失效
        let stale = cache
            .get_or_try_insert_with(1, || -> Result<i32, ()> {
                cache.invalidate(&1);
                Ok(1)
            })
            .unwrap();
        assert_eq!(*stale, 1);
        assert!(cache.get(&1).is_none());

        // 下一次未命中正常写回
        let fresh = cache.get_or_try_insert_with(1, || -> Result<i32, ()> { Ok(2) }).unwrap();
        assert_eq!(*fresh, 2);
        assert_eq!(cache.get(&1).map(|v| *v), Some(2));
    }

    #[test]
    fn test_clear_during_compute_skips_write_back() {
        let cache: TtlCache<u8, i32> = TtlCache::default();
        cache
            .get_or_try_insert_with(7, || -> Result<i32, ()> {
                cache.clear();
                Ok(7)
            })
            .unwrap();
        assert!(cache.is_empty());

        // 其他键的失效不影响本键写回
        cache
            .get_or_try_insert_with(8, || -> Result<i32, ()> {
                cache.invalidate(&9);
                Ok(8)
            })
            .unwrap();
        assert_eq!(cache.len(), 1);
    }
}
