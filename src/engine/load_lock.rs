// ==========================================
// 课程排班系统 - 月度负载键锁
// ==========================================
// 职责: 同一 (staff, year, month) 键同时至多一个重算在途
// 策略: 一次性获取全部请求键（全有或全无），避免加锁顺序死锁
//       不相交的键集合可以并行
// ==========================================

use crate::domain::types::LoadKey;
use crate::engine::error::{RosterError, RosterResult};
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Default)]
struct LockState {
    held: Mutex<HashSet<LoadKey>>,
    released: Condvar,
}

/// 负载键锁注册表（可克隆，克隆共享同一状态）
#[derive(Debug, Clone, Default)]
pub struct LoadLockRegistry {
    state: Arc<LockState>,
}

impl LoadLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 阻塞直到所有键空闲，然后一次性持有
    ///
    /// # 参数
    /// - `keys`: 需要持有的键（允许重复，自动去重）
    ///
    /// # 返回
    /// - `LoadLockGuard`: drop 时释放全部键
    pub fn acquire<I>(&self, keys: I) -> RosterResult<LoadLockGuard>
    where
        I: IntoIterator<Item = LoadKey>,
    {
        let wanted: HashSet<LoadKey> = keys.into_iter().collect();

        let mut held = self
            .state
            .held
            .lock()
            .map_err(|e| RosterError::PersistenceFailure(format!("负载键锁已损坏: {}", e)))?;
        while wanted.iter().any(|k| held.contains(k)) {
            held = self
                .state
                .released
                .wait(held)
                .map_err(|e| RosterError::PersistenceFailure(format!("负载键锁已损坏: {}", e)))?;
        }
        held.extend(wanted.iter().copied());

        tracing::trace!(key_count = wanted.len(), "负载键已获取");

        Ok(LoadLockGuard {
            state: Arc::clone(&self.state),
            keys: wanted,
        })
    }

    /// 键当前是否被持有
    pub fn is_held(&self, key: &LoadKey) -> bool {
        match self.state.held.lock() {
            Ok(held) => held.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }
}

/// 持有中的负载键集合
#[derive(Debug)]
pub struct LoadLockGuard {
    state: Arc<LockState>,
    keys: HashSet<LoadKey>,
}

impl LoadLockGuard {
    pub fn keys(&self) -> &HashSet<LoadKey> {
        &self.keys
    }

    pub fn covers(&self, key: &LoadKey) -> bool {
        self.keys.contains(key)
    }
}

impl Drop for LoadLockGuard {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut held = match self.state.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.state.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::YearMonth;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn key(staff_id: i64, month: u32) -> LoadKey {
        LoadKey::new(staff_id, YearMonth::new(2026, month).unwrap())
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = LoadLockRegistry::new();
        {
            let guard = registry.acquire([key(1, 3), key(1, 3), key(2, 3)]).unwrap();
            assert_eq!(guard.keys().len(), 2);
            assert!(registry.is_held(&key(1, 3)));
        }
        assert!(!registry.is_held(&key(1, 3)));
        assert!(!registry.is_held(&key(2, 3)));
    }

    #[test]
    fn test_disjoint_keys_do_not_block() {
        let registry = LoadLockRegistry::new();
        let _a = registry.acquire([key(1, 3)]).unwrap();
        let b = registry.acquire([key(1, 4), key(2, 3)]).unwrap();
        assert!(b.covers(&key(2, 3)));
    }

    #[test]
    fn test_same_key_is_serialized() {
        let registry = LoadLockRegistry::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    let _guard = registry.acquire([key(1, 3)]).unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
