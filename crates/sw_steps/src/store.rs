//! 续体存储特征与内存实现

use std::collections::HashMap;

use parking_lot::Mutex;

use sw_core::{Result, StepError, StepKey, StepsConfig};

use crate::continuation::Continuation;

/// 续体存储
///
/// 每个键最多保存一个续体。存储只存在于进程内，续体不可序列化。
/// 方法均为同步调用，以便 `wait_for` 在被外部取消 (future 被丢弃) 时
/// 也能在 `Drop` 中确定地清理自己的键。
pub trait StepStore<E>: Send + Sync {
    /// 插入或替换键上的续体 (后写入者胜出)
    fn set(&self, key: StepKey, step: Continuation<E>) -> Result<()>;

    /// 原子地取出并移除键上的续体；未登记时返回 `None`
    fn pop(&self, key: &StepKey) -> Option<Continuation<E>>;

    /// 逐个取出并移除当前全部续体
    ///
    /// 迭代是惰性的，不可重启；迭代期间新写入的续体不保证被看到。
    fn drain(&self) -> Box<dyn Iterator<Item = Continuation<E>> + '_>;

    /// 当前登记的续体数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 仅当键上的续体满足条件时取出
    ///
    /// 默认实现先 `pop` 再写回，非原子；内存实现覆盖为原子操作。
    fn pop_if(
        &self,
        key: &StepKey,
        predicate: &dyn Fn(&Continuation<E>) -> bool,
    ) -> Option<Continuation<E>> {
        let step = self.pop(key)?;
        if predicate(&step) {
            return Some(step);
        }
        if let Err(err) = self.set(key.clone(), step) {
            tracing::warn!(%key, error = %err, "Failed to restore continuation");
        }
        None
    }
}

/// 内存续体存储
///
/// `capacity` 为 0 时不限容量；有界时新键在存满后被拒绝，替换已有键总是成功。
pub struct MemoryStepStore<E> {
    steps: Mutex<HashMap<StepKey, Continuation<E>>>,
    capacity: usize,
}

impl<E> MemoryStepStore<E> {
    /// 创建不限容量的存储
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// 创建有界存储
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// 按配置创建
    pub fn from_config(config: &StepsConfig) -> Self {
        Self::with_capacity(config.store_capacity)
    }

    /// 容量 (0 表示不限)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前登记的全部键
    pub fn keys(&self) -> Vec<StepKey> {
        self.steps.lock().keys().cloned().collect()
    }
}

impl<E> Default for MemoryStepStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send> StepStore<E> for MemoryStepStore<E> {
    fn set(&self, key: StepKey, step: Continuation<E>) -> Result<()> {
        let mut steps = self.steps.lock();

        if self.capacity > 0 && steps.len() >= self.capacity && !steps.contains_key(&key) {
            return Err(StepError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let kind = step.kind();
        if let Some(previous) = steps.insert(key.clone(), step) {
            tracing::debug!(%key, previous = previous.kind(), next = kind, "Continuation replaced");
        } else {
            tracing::debug!(%key, kind, "Continuation registered");
        }
        Ok(())
    }

    fn pop(&self, key: &StepKey) -> Option<Continuation<E>> {
        self.steps.lock().remove(key)
    }

    fn drain(&self) -> Box<dyn Iterator<Item = Continuation<E>> + '_> {
        Box::new(Drain {
            store: self,
            keys: self.keys().into_iter(),
        })
    }

    fn len(&self) -> usize {
        self.steps.lock().len()
    }

    fn pop_if(
        &self,
        key: &StepKey,
        predicate: &dyn Fn(&Continuation<E>) -> bool,
    ) -> Option<Continuation<E>> {
        let mut steps = self.steps.lock();
        let matched = steps.get(key).is_some_and(|step| predicate(step));
        if matched {
            steps.remove(key)
        } else {
            None
        }
    }
}

/// 惰性清空迭代器：对快照中的每个键执行一次 `pop`
struct Drain<'a, E> {
    store: &'a MemoryStepStore<E>,
    keys: std::vec::IntoIter<StepKey>,
}

impl<E: Send> Iterator for Drain<'_, E> {
    type Item = Continuation<E>;

    fn next(&mut self) -> Option<Self::Item> {
        // 已被并发 pop 的键直接跳过
        for key in self.keys.by_ref() {
            if let Some(step) = self.store.pop(&key) {
                return Some(step);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::continuation::StepCallback;
    use crate::suspension::Suspension;

    fn callback() -> Continuation<u32> {
        Continuation::Callback(StepCallback::new(|_: u32| async { Ok(()) }))
    }

    #[test]
    fn test_set_and_pop() {
        let store = MemoryStepStore::<u32>::new();
        store.set(StepKey::from(1), callback()).unwrap();
        assert_eq!(store.len(), 1);

        assert!(store.pop(&StepKey::from(1)).is_some());
        assert!(store.pop(&StepKey::from(1)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStepStore::<u32>::new();
        let first = Suspension::<u32>::new();
        let second = Suspension::<u32>::new();
        store.set(StepKey::from(1), first.clone().into()).unwrap();
        store.set(StepKey::from(1), second.clone().into()).unwrap();

        let step = store.pop(&StepKey::from(1)).unwrap();
        assert!(step.holds(&second));
        assert!(!step.holds(&first));
        assert!(first.is_pending());
    }

    #[test]
    fn test_capacity() {
        let store = MemoryStepStore::<u32>::with_capacity(1);
        store.set(StepKey::from(1), callback()).unwrap();
        store.set(StepKey::from(1), callback()).unwrap();

        let err = store.set(StepKey::from(2), callback()).unwrap_err();
        assert!(matches!(err, StepError::CapacityExceeded { capacity: 1 }));
    }

    #[test]
    fn test_drain_empties_store() {
        let store = MemoryStepStore::<u32>::new();
        for id in 0..5 {
            store.set(StepKey::from(id), callback()).unwrap();
        }

        let mut drain = store.drain();
        assert!(drain.next().is_some());
        let rest = drain.count();
        assert_eq!(rest, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_pop_if_keeps_other_entries() {
        let store = MemoryStepStore::<u32>::new();
        let mine = Suspension::<u32>::new();
        store.set(StepKey::from(9), callback()).unwrap();

        assert!(store.pop_if(&StepKey::from(9), &|step| step.holds(&mine)).is_none());
        assert_eq!(store.len(), 1);

        store.set(StepKey::from(9), mine.clone().into()).unwrap();
        assert!(store.pop_if(&StepKey::from(9), &|step| step.holds(&mine)).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_pop_single_winner() {
        let store = Arc::new(MemoryStepStore::<u32>::new());
        store.set(StepKey::from(3), callback()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.pop(&StepKey::from(3)).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
