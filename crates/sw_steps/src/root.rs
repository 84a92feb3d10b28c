//! 进程级根注册表
//!
//! 仅供最外层组装代码使用；库内部一律显式传递 [`StepRegistry`]。
//! 每种更新类型各有一个根注册表，首次访问时以默认配置惰性创建。
//! 替换根注册表是全局配置变更，应在启动阶段完成。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::registry::StepRegistry;
use crate::store::StepStore;

type RootMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

static ROOTS: Lazy<RwLock<RootMap>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// 获取更新类型 `E` 的根注册表
pub fn root<E: Send + 'static>() -> StepRegistry<E> {
    if let Some(registry) = ROOTS
        .read()
        .get(&TypeId::of::<E>())
        .and_then(|entry| entry.downcast_ref::<StepRegistry<E>>())
    {
        return registry.clone();
    }

    let mut roots = ROOTS.write();
    let entry = roots
        .entry(TypeId::of::<E>())
        .or_insert_with(|| Box::new(StepRegistry::<E>::default()));
    match entry.downcast_ref::<StepRegistry<E>>() {
        Some(registry) => registry.clone(),
        None => {
            let registry = StepRegistry::<E>::default();
            *entry = Box::new(registry.clone());
            registry
        }
    }
}

/// 安装自定义根注册表，之后的 [`root`] 调用都返回它
pub fn install_root<E: Send + 'static>(registry: StepRegistry<E>) {
    tracing::info!(
        event_type = std::any::type_name::<E>(),
        "Root step registry installed"
    );
    ROOTS.write().insert(TypeId::of::<E>(), Box::new(registry));
}

/// 替换根注册表的存储，沿用当前根注册表的配置
pub fn change_root_store<E: Send + 'static>(store: Arc<dyn StepStore<E>>) {
    let config = root::<E>().config().clone();
    install_root(StepRegistry::new(store, config));
}
