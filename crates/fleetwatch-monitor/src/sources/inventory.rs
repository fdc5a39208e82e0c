use async_trait::async_trait;
use fleetwatch_config::InstanceSpec;
use fleetwatch_core::{InstanceContext, InstanceInventory, Result, TagSelector};
use std::collections::HashMap;
use tracing::debug;

/// 伸缩组标签
pub const GROUP_TAG: &str = "aws:autoscaling:groupName";

#[derive(Debug, Clone)]
struct StaticInstance {
    context: InstanceContext,
    tags: HashMap<String, String>,
}

/// 配置文件中声明的静态实例清单
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    instances: Vec<StaticInstance>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[InstanceSpec]) -> Self {
        let mut inventory = Self::new();
        for spec in specs {
            inventory.add(
                spec.instance_id.as_str(),
                spec.image_id.as_str(),
                spec.instance_type.as_str(),
                spec.tags.clone(),
            );
        }
        inventory
    }

    /// 追加实例，伸缩组取自 `aws:autoscaling:groupName` 标签
    pub fn add(
        &mut self,
        instance_id: &str,
        image_id: &str,
        instance_type: &str,
        tags: HashMap<String, String>,
    ) {
        let mut context = InstanceContext::new(instance_id, image_id, instance_type);
        if let Some(group) = tags.get(GROUP_TAG) {
            context = context.with_group(group.clone());
        }
        self.instances.push(StaticInstance { context, tags });
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[async_trait]
impl InstanceInventory for StaticInventory {
    async fn list_instances(&self, selector: &TagSelector) -> Result<Vec<InstanceContext>> {
        let matched: Vec<InstanceContext> = self
            .instances
            .iter()
            .filter(|i| selector.matches(&i.tags))
            .map(|i| i.context.clone())
            .collect();

        debug!(
            selector = %selector,
            declared = self.instances.len(),
            matched = matched.len(),
            "Listed static instances"
        );
        Ok(matched)
    }
}
