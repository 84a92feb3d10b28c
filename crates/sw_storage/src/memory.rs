//! 内存状态存储

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use sw_core::{Result, StepKey};

use crate::base::{StateContext, StateStorage, Tables};

/// 内存状态存储，适合开发环境或不需要持久化的小型应用
#[derive(Debug, Default)]
pub struct MemoryStateStorage {
    tables: RwLock<Tables>,
}

impl MemoryStateStorage {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存状态的用户数
    pub async fn state_count(&self) -> usize {
        self.tables.read().await.states.len()
    }
}

#[async_trait]
impl StateStorage for MemoryStateStorage {
    async fn set_state(
        &self,
        user: &StepKey,
        state: &str,
        callback: Option<&str>,
        chat_id: Option<StepKey>,
    ) -> Result<()> {
        self.tables
            .write()
            .await
            .set_state(user, state, callback, chat_id);
        tracing::debug!(%user, state, "State set");
        Ok(())
    }

    async fn get_state(&self, user: &StepKey) -> Result<Option<StateContext>> {
        Ok(self.tables.read().await.states.get(user).cloned())
    }

    async fn delete_state(&self, user: &StepKey) -> Result<Option<StateContext>> {
        Ok(self.tables.write().await.states.remove(user))
    }

    async fn set_data(&self, user: &StepKey, data: Value) -> Result<()> {
        self.tables.write().await.set_data(user, data)
    }

    async fn get_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>> {
        Ok(self.tables.read().await.data.get(user).cloned())
    }

    async fn update_data(&self, user: &StepKey, data: Value) -> Result<()> {
        self.tables.write().await.update_data(user, data)
    }

    async fn delete_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>> {
        Ok(self.tables.write().await.data.remove(user))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sw_core::StepError;

    use super::*;

    #[tokio::test]
    async fn test_state_lifecycle() {
        let storage = MemoryStateStorage::new();
        let user = StepKey::from(10);

        assert!(storage.get_state(&user).await.unwrap().is_none());

        storage
            .set_state(&user, "ASK_AGE", Some("ask_age"), Some(StepKey::from(-500)))
            .await
            .unwrap();
        let context = storage.get_state(&user).await.unwrap().unwrap();
        assert_eq!(context.current_state, "ASK_AGE");
        assert_eq!(context.callback.as_deref(), Some("ask_age"));
        assert_eq!(context.chat_id, StepKey::from(-500));
        assert_eq!(storage.state_count().await, 1);

        let removed = storage.delete_state(&user).await.unwrap();
        assert_eq!(removed, Some(context));
        assert!(storage.delete_state(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_data_is_copied_out() {
        let storage = MemoryStateStorage::new();
        let user = StepKey::from("web:alice");
        storage.set_data(&user, json!({"name": "Alice"})).await.unwrap();

        let mut copy = storage.get_data(&user).await.unwrap().unwrap();
        copy.insert("name".to_string(), json!("Mallory"));

        let stored = storage.get_data(&user).await.unwrap().unwrap();
        assert_eq!(stored["name"], json!("Alice"));
    }

    #[tokio::test]
    async fn test_update_and_delete_data() {
        let storage = MemoryStateStorage::new();
        let user = StepKey::from(3);

        storage.update_data(&user, json!({"age": 25})).await.unwrap();
        storage.update_data(&user, json!({"name": "John"})).await.unwrap();
        let data = storage.delete_data(&user).await.unwrap().unwrap();
        assert_eq!(Value::Object(data), json!({"age": 25, "name": "John"}));
        assert!(storage.get_data(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_object_data_rejected() {
        let storage = MemoryStateStorage::new();
        let err = storage
            .set_data(&StepKey::from(1), json!("just text"))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidArgument(_)));

        let err = storage
            .update_data(&StepKey::from(1), json!(7))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidArgument(_)));
    }
}
