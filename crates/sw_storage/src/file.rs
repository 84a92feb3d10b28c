//! JSON 文件状态存储

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use sw_core::{Result, StepKey};

use crate::base::{Records, StateContext, StateStorage, Tables};

/// 文件状态存储
///
/// 全部记录保存在一个 JSON 文件中，每次写操作后整体落盘 (先写临时文件再重命名)。
/// 回调只以名称保存。
#[derive(Debug)]
pub struct FileStateStorage {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl FileStateStorage {
    /// 打开存储文件，不存在时从空记录开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Tables::default(),
            Ok(bytes) => {
                let records: Records = serde_json::from_slice(&bytes)?;
                Tables::from_records(records)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            path = %path.display(),
            states = tables.states.len(),
            "File state storage opened"
        );

        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    /// 存储文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 先落盘再替换内存记录；落盘失败时内存保持原样
    async fn commit(&self, tables: &mut Tables, next: Tables) -> Result<()> {
        if let Err(err) = self.persist(&next).await {
            tracing::warn!(path = %self.path.display(), error = %err, "Failed to persist state storage");
            return Err(err);
        }
        *tables = next;
        Ok(())
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&tables.to_records())?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStorage for FileStateStorage {
    async fn set_state(
        &self,
        user: &StepKey,
        state: &str,
        callback: Option<&str>,
        chat_id: Option<StepKey>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        next.set_state(user, state, callback, chat_id);
        self.commit(&mut tables, next).await
    }

    async fn get_state(&self, user: &StepKey) -> Result<Option<StateContext>> {
        Ok(self.tables.read().await.states.get(user).cloned())
    }

    async fn delete_state(&self, user: &StepKey) -> Result<Option<StateContext>> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        let removed = next.states.remove(user);
        if removed.is_some() {
            self.commit(&mut tables, next).await?;
        }
        Ok(removed)
    }

    async fn set_data(&self, user: &StepKey, data: Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        next.set_data(user, data)?;
        self.commit(&mut tables, next).await
    }

    async fn get_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>> {
        Ok(self.tables.read().await.data.get(user).cloned())
    }

    async fn update_data(&self, user: &StepKey, data: Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        next.update_data(user, data)?;
        self.commit(&mut tables, next).await
    }

    async fn delete_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        let removed = next.data.remove(user);
        if removed.is_some() {
            self.commit(&mut tables, next).await?;
        }
        Ok(removed)
    }
}
