use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetwatch_core::{
    format_alert_timestamp, AlertRecord, AlertStateStore, InstanceId, Result, WatchError,
};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

type Document = BTreeMap<String, String>;

/// 本地 JSON 文件状态存储
///
/// 文档格式为 `{ "<instance_id>": "<timestamp>" }`，写入时先写临时文件再重命名。
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// 读取整个文档，文件不存在视为空
    async fn load(&self) -> std::io::Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn ensure_parent_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl AlertStateStore for FileStateStore {
    async fn get(&self, instance_id: &InstanceId) -> Result<Option<AlertRecord>> {
        let Some(content) = self.load().await? else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        // 整个文档不可读时无法判断任何实例的冷却，按存储故障处理
        let document: Document = serde_json::from_str(&content).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "State document is not valid JSON");
            WatchError::StateUnavailable(format!(
                "state file {} is not valid JSON: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(document
            .get(instance_id.as_str())
            .map(|value| AlertRecord::new(instance_id.clone(), value.clone())))
    }

    async fn put(&self, instance_id: &InstanceId, time: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document: Document = match self.load().await? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .map_err(|e| {
                    WatchError::Persist(format!(
                        "refusing to overwrite unreadable state file {}: {}",
                        self.path.display(),
                        e
                    ))
                })?,
            _ => Document::new(),
        };

        let value = format_alert_timestamp(time);
        document.insert(instance_id.to_string(), value.clone());
        let data = serde_json::to_vec_pretty(&document)?;

        self.ensure_parent_dir().await?;
        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, &data).await {
            error!(path = %temp.display(), error = %e, "Failed to write state file");
            return Err(WatchError::Persist(format!("write {}: {}", temp.display(), e)));
        }
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| WatchError::Persist(format!("rename {}: {}", self.path.display(), e)))?;

        debug!(
            instance_id = %instance_id,
            last_alert_time = %value,
            path = %self.path.display(),
            "Alert state persisted"
        );
        Ok(())
    }
}
