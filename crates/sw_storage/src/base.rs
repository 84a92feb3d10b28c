//! 状态存储特征与共享记录表

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sw_core::{Result, StepError, StepKey};

/// 会话状态上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateContext {
    /// 当前状态名
    pub current_state: String,
    /// 关联回调名称
    pub callback: Option<String>,
    /// 所在会话 ID
    pub chat_id: StepKey,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 会话状态存储
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// 设置用户状态；`chat_id` 缺省为用户 ID
    async fn set_state(
        &self,
        user: &StepKey,
        state: &str,
        callback: Option<&str>,
        chat_id: Option<StepKey>,
    ) -> Result<()>;

    /// 获取用户状态
    async fn get_state(&self, user: &StepKey) -> Result<Option<StateContext>>;

    /// 删除并返回用户状态
    async fn delete_state(&self, user: &StepKey) -> Result<Option<StateContext>>;

    /// 整体替换用户数据，`data` 必须是 JSON 对象
    async fn set_data(&self, user: &StepKey, data: Value) -> Result<()>;

    /// 获取用户数据的副本
    async fn get_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>>;

    /// 浅合并用户数据 (同名字段覆盖，新字段追加)，`data` 必须是 JSON 对象
    async fn update_data(&self, user: &StepKey, data: Value) -> Result<()>;

    /// 删除并返回用户数据
    async fn delete_data(&self, user: &StepKey) -> Result<Option<Map<String, Value>>>;
}

/// 要求值为 JSON 对象
pub(crate) fn into_object(data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(StepError::InvalidArgument(format!(
            "'data' must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 内存与文件后端共用的记录表
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Records {
    states: Vec<(StepKey, StateContext)>,
    data: Vec<(StepKey, Map<String, Value>)>,
}

/// 记录表的运行时形态
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub states: HashMap<StepKey, StateContext>,
    pub data: HashMap<StepKey, Map<String, Value>>,
}

impl Tables {
    pub fn set_state(
        &mut self,
        user: &StepKey,
        state: &str,
        callback: Option<&str>,
        chat_id: Option<StepKey>,
    ) {
        let context = StateContext {
            current_state: state.to_string(),
            callback: callback.map(str::to_string),
            chat_id: chat_id.unwrap_or_else(|| user.clone()),
            updated_at: Utc::now(),
        };
        self.states.insert(user.clone(), context);
    }

    pub fn set_data(&mut self, user: &StepKey, data: Value) -> Result<()> {
        let data = into_object(data)?;
        self.data.insert(user.clone(), data);
        Ok(())
    }

    pub fn update_data(&mut self, user: &StepKey, data: Value) -> Result<()> {
        let data = into_object(data)?;
        self.data.entry(user.clone()).or_default().extend(data);
        Ok(())
    }

    pub fn to_records(&self) -> Records {
        Records {
            states: self
                .states
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            data: self
                .data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn from_records(records: Records) -> Self {
        Self {
            states: records.states.into_iter().collect(),
            data: records.data.into_iter().collect(),
        }
    }
}
