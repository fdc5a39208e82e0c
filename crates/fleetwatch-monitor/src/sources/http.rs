use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetwatch_core::{Dimension, MetricQuery, MetricSeries, MetricSource, Result, WatchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// 发往指标后端的查询体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub period: u32,
    pub stat: String,
}

impl From<&MetricQuery> for MetricRequest {
    fn from(query: &MetricQuery) -> Self {
        Self {
            namespace: query.kind.namespace().to_string(),
            metric_name: query.kind.metric_name().to_string(),
            dimensions: query.dimensions.pairs(),
            start_time: query.window.start,
            end_time: query.window.end,
            period: query.period_secs,
            stat: query.stat.as_str().to_string(),
        }
    }
}

/// 后端返回，样本按时间倒序
#[derive(Debug, Clone, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    values: Vec<f64>,
}

/// 通过 HTTP 查询指标
pub struct HttpMetricSource {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpMetricSource {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn query(&self, query: &MetricQuery) -> Result<MetricSeries> {
        let metric = query.kind.metric_name();
        let body = MetricRequest::from(query);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::metric_fetch(metric, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::metric_fetch(
                metric,
                format!("backend returned status {}", status),
            ));
        }

        let parsed: MetricResponse = response
            .json()
            .await
            .map_err(|e| WatchError::metric_fetch(metric, e))?;

        debug!(
            metric = metric,
            instance_id = %query.dimensions.instance_id(),
            samples = parsed.values.len(),
            "Metric query completed"
        );
        Ok(MetricSeries::new(query.kind, parsed.values))
    }
}
