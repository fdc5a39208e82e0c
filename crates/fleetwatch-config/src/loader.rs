use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::settings::{FleetWatchConfig, StateBackend, MAX_WINDOW_MINUTES};

/// 环境变量前缀，例如 `FLEETWATCH__ALERT__COOLDOWN_MINUTES=30`
pub const ENV_PREFIX: &str = "FLEETWATCH";

/// 配置加载器
pub struct ConfigLoader {
    path: PathBuf,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            use_env: true,
        }
    }

    /// 不读取环境变量（测试用）
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load(&self) -> Result<FleetWatchConfig> {
        let path = self
            .path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid config path"))?;

        let mut builder =
            Config::builder().add_source(File::new(path, FileFormat::Toml).required(false));
        if self.use_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: FleetWatchConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// 加载并校验
    pub fn load_validated(&self) -> Result<FleetWatchConfig> {
        let config = self.load()?;
        validate(&config)?;
        Ok(config)
    }
}

/// 校验配置
pub fn validate(config: &FleetWatchConfig) -> Result<()> {
    if config.target.tag_key.trim().is_empty() {
        return Err(anyhow!("target.tag_key must not be empty"));
    }

    let alert = &config.alert;
    for (name, value) in [
        ("cooldown_minutes", alert.cooldown_minutes),
        ("lookback_minutes", alert.lookback_minutes),
    ] {
        if !(1..=MAX_WINDOW_MINUTES).contains(&value) {
            return Err(anyhow!(
                "alert.{} ({}) must be within 1..={}",
                name,
                value,
                MAX_WINDOW_MINUTES
            ));
        }
    }
    if alert.period_secs == 0 {
        return Err(anyhow!("alert.period_secs must be greater than 0"));
    }

    let t = &config.thresholds;
    for (name, value) in [
        ("cpu_high", t.cpu_high),
        ("cpu_low", t.cpu_low),
        ("disk_high", t.disk_high),
        ("memory_high", t.memory_high),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(anyhow!(
                "thresholds.{} ({}) must be within 0..=100",
                name,
                value
            ));
        }
    }
    if t.cpu_low >= t.cpu_high {
        return Err(anyhow!(
            "thresholds.cpu_low ({}) must be lower than thresholds.cpu_high ({})",
            t.cpu_low,
            t.cpu_high
        ));
    }

    if matches!(config.state.backend, StateBackend::File | StateBackend::Sqlite)
        && config.state.path.is_none()
    {
        return Err(anyhow!(
            "state.path is required for the {:?} backend",
            config.state.backend
        ));
    }

    if config.schedule.interval_secs == 0 {
        return Err(anyhow!("schedule.interval_secs must be greater than 0"));
    }

    Ok(())
}
