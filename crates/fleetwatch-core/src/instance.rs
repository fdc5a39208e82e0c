use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 实例标识（跨指标源、状态存储、通知的关联键）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 伸缩组维度
///
/// 实例不属于任何伸缩组时仍然要带上该维度，值为显式的空串。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupDimension {
    Named(String),
    NoGroup,
}

impl GroupDimension {
    pub fn value(&self) -> &str {
        match self {
            GroupDimension::Named(name) => name,
            GroupDimension::NoGroup => "",
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, GroupDimension::Named(_))
    }
}

/// 单个周期内的实例上下文，由实例枚举得到，不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceContext {
    pub instance_id: InstanceId,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl InstanceContext {
    pub fn new(
        instance_id: impl Into<InstanceId>,
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            group: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn group_dimension(&self) -> GroupDimension {
        match &self.group {
            Some(name) if !name.is_empty() => GroupDimension::Named(name.clone()),
            _ => GroupDimension::NoGroup,
        }
    }
}

/// 单标签精确匹配选择器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelector {
    pub key: String,
    pub value: String,
}

impl TagSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, tags: &HashMap<String, String>) -> bool {
        tags.get(&self.key).is_some_and(|v| v == &self.value)
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}={}", self.key, self.value)
    }
}
