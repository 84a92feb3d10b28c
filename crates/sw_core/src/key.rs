//! 续体键定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 续体键 (用户 ID 或会话 ID)
///
/// 用户 ID 与会话 ID 共用同一个键空间：数值相同即为同一个键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepKey {
    /// 整数 ID
    Int(i64),
    /// 字符串 ID
    Str(String),
}

impl StepKey {
    /// 获取整数值
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StepKey::Int(id) => Some(*id),
            StepKey::Str(_) => None,
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKey::Int(id) => write!(f, "{}", id),
            StepKey::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for StepKey {
    fn from(id: i64) -> Self {
        StepKey::Int(id)
    }
}

impl From<i32> for StepKey {
    fn from(id: i32) -> Self {
        StepKey::Int(id as i64)
    }
}

impl From<String> for StepKey {
    fn from(id: String) -> Self {
        StepKey::Str(id)
    }
}

impl From<&str> for StepKey {
    fn from(id: &str) -> Self {
        StepKey::Str(id.to_string())
    }
}

impl From<&StepKey> for StepKey {
    fn from(key: &StepKey) -> Self {
        key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_and_str_keys_differ() {
        assert_ne!(StepKey::from(7), StepKey::from("7"));
        assert_eq!(StepKey::from(7i64), StepKey::from(7i32));
    }

    #[test]
    fn test_display() {
        assert_eq!(StepKey::from(-100200).to_string(), "-100200");
        assert_eq!(StepKey::from("alice").to_string(), "alice");
    }

    #[test]
    fn test_untagged_json() {
        let key: StepKey = serde_json::from_str("42").unwrap();
        assert_eq!(key, StepKey::Int(42));
        let key: StepKey = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(key.as_int(), None);
    }
}
