// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::domain::models::proxy::ProxyRecord;
use crate::infrastructure::proxy::pool::ProxyPool;
use crate::infrastructure::proxy::sources::ProxySources;

/// 健康循环配置
#[derive(Debug, Clone)]
pub struct HealthLoopConfig {
    /// 探测轮询间隔
    pub check_interval: Duration,
    /// 来源补充检查间隔
    pub refill_interval: Duration,
}

impl Default for HealthLoopConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(180),
            refill_interval: Duration::from_secs(600),
        }
    }
}

/// 代理健康监控
///
/// 后台任务：周期性地对有限数量的Suspect/Dead/Untested代理
/// 做带独立超时的并发探测（并发数有界），并在可用量不足时
/// 重新抓取来源补充池
pub struct ProxyHealthMonitor {
    pool: Arc<ProxyPool>,
    sources: ProxySources,
    config: HealthLoopConfig,
}

impl ProxyHealthMonitor {
    pub fn new(pool: Arc<ProxyPool>, sources: ProxySources, config: HealthLoopConfig) -> Self {
        Self {
            pool,
            sources,
            config,
        }
    }

    /// 启动后台循环
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut probe_tick = tokio::time::interval(self.config.check_interval);
        let mut refill_tick = tokio::time::interval(self.config.refill_interval);
        // First ticks fire immediately; skip them so startup refill stays in main
        probe_tick.tick().await;
        refill_tick.tick().await;

        loop {
            tokio::select! {
                _ = probe_tick.tick() => {
                    self.probe_sweep().await;
                    self.pool.purge_dead();
                }
                _ = refill_tick.tick() => {
                    if let Err(e) = self.refill_if_low().await {
                        error!("Proxy refill error: {}", e);
                    }
                }
            }
        }
    }

    /// 一轮有界并发探测
    async fn probe_sweep(&self) {
        let pool_config = self.pool_config();
        let candidates = self.pool.probe_candidates(pool_config.probe_batch);
        if candidates.is_empty() {
            return;
        }

        debug!("Health checking {} proxies", candidates.len());
        let results: Vec<(String, bool, Option<Duration>)> = stream::iter(candidates)
            .map(|record| {
                let probe_url = pool_config.probe_url.clone();
                let probe_timeout = pool_config.probe_timeout;
                async move {
                    let started = Instant::now();
                    let passed = probe_proxy(&record, &probe_url, probe_timeout).await;
                    let elapsed = passed.then(|| started.elapsed());
                    (record.address, passed, elapsed)
                }
            })
            .buffer_unordered(pool_config.probe_concurrency)
            .collect()
            .await;

        let passed = results.iter().filter(|(_, ok, _)| *ok).count();
        for (address, ok, elapsed) in results {
            self.pool.record_probe_result(&address, ok, elapsed);
        }

        let stats = self.pool.stats();
        info!(
            "Proxy probe sweep: {} passed, pool {}/{} alive",
            passed, stats.alive, stats.total
        );
    }

    /// 可用量不足时重新抓取来源
    async fn refill_if_low(&self) -> anyhow::Result<()> {
        let available = self.pool.available_count();
        if available >= self.pool_config().min_alive {
            return Ok(());
        }

        info!("Low proxy count ({}), fetching more from sources", available);
        let candidates = self.sources.fetch_candidates().await;
        let added = self.pool.refill(candidates);
        info!("Refilled proxy pool with {} new candidates", added);
        Ok(())
    }

    fn pool_config(&self) -> crate::infrastructure::proxy::pool::ProxyPoolConfig {
        self.pool.config().clone()
    }
}

/// 探测单个代理
///
/// 通过代理请求探测URL，2xx视为通过；每个探测有自己的短超时
async fn probe_proxy(record: &ProxyRecord, probe_url: &str, timeout: Duration) -> bool {
    let proxy = match reqwest::Proxy::all(record.connect_url()) {
        Ok(proxy) => proxy,
        Err(e) => {
            debug!("Invalid proxy url {}: {}", record.address, e);
            return false;
        }
    };

    let client = match reqwest::Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!("Probe client build failed: {}", e);
            return false;
        }
    };

    match client.get(probe_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!("Proxy probe failed for {}: {}", record.address, e);
            false
        }
    }
}
