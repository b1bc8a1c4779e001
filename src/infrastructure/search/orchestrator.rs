// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::models::fetch::{FailureKind, StrategyProfile};
use crate::domain::models::search_result::{
    AggregateResult, SearchItem, SearchMode, SearchTask, TargetReport, TaskStatus,
};
use crate::domain::search::target::{ParseError, SearchTarget};
use crate::engines::executor::StrategyExecutor;
use crate::infrastructure::search::deduplicator::merge_deduplicated;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 并发扇出时单目标超时
    pub per_engine_timeout: Duration,
    /// 顺序降级时单目标超时
    pub sequential_target_timeout: Duration,
    /// 单次搜索期望条目数
    pub item_limit: u32,
    /// 有序策略链
    pub strategies: Vec<StrategyProfile>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        use crate::domain::models::fetch::Strategy;
        Self {
            per_engine_timeout: Duration::from_secs(30),
            sequential_target_timeout: Duration::from_secs(30),
            item_limit: 10,
            strategies: vec![
                StrategyProfile::new(Strategy::Direct, Duration::from_secs(15)),
                StrategyProfile::new(Strategy::MobileVariant, Duration::from_secs(15)),
                StrategyProfile::new(Strategy::BrowserAutomation, Duration::from_secs(25)),
                StrategyProfile::new(Strategy::LibraryFallback, Duration::from_secs(15)),
            ],
        }
    }
}

/// 单引擎运行统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub successes: u64,
    pub failures: u64,
    /// 响应时间滑动平均（毫秒）
    pub avg_time_ms: f64,
}

/// 搜索编排器
///
/// 把策略执行器与解析组合到多目标之上，两种模式：
/// 顺序降级（命中即停）与并发扇出（独立超时，聚合去重）。
/// 目标报告的success严格等于"解析出至少一条结果"，
/// 传输层200但零条目永远不是成功
pub struct SearchOrchestrator {
    executor: Arc<StrategyExecutor>,
    targets: Vec<Arc<dyn SearchTarget>>,
    config: OrchestratorConfig,
    stats: DashMap<String, EngineStats>,
}

impl SearchOrchestrator {
    pub fn new(
        executor: Arc<StrategyExecutor>,
        targets: Vec<Arc<dyn SearchTarget>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            targets,
            config,
            stats: DashMap::new(),
        }
    }

    /// 执行一次多目标搜索
    ///
    /// # 参数
    ///
    /// * `query` - 查询词
    /// * `mode` - 顺序降级或并发扇出
    /// * `target_names` - 目标子集（空则使用全部已注册目标，按注册顺序）
    /// * `per_engine_timeout` - 并发模式下覆盖默认单目标超时
    ///
    /// # 返回值
    ///
    /// 聚合结果，包含每个目标的报告与合并去重后的条目
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        target_names: &[String],
        per_engine_timeout: Option<Duration>,
    ) -> AggregateResult {
        let selected = self.select_targets(target_names);
        if selected.is_empty() {
            warn!("No known targets selected for query");
            return AggregateResult::new(query, mode, Vec::new());
        }

        let mut result = match mode {
            SearchMode::Sequential => self.search_sequential(query, &selected).await,
            SearchMode::Concurrent => {
                let timeout = per_engine_timeout.unwrap_or(self.config.per_engine_timeout);
                self.search_concurrent(query, &selected, timeout).await
            }
        };

        for report in &result.per_target {
            self.record_stats(report);
        }

        result.items = merge_deduplicated(&result.per_target, self.config.item_limit as usize);
        info!(
            "Search completed: {} succeeded, {} failed, {} merged items",
            result.succeeded_count,
            result.failed_count,
            result.items.len()
        );
        result
    }

    /// 顺序降级模式
    ///
    /// 严格有序：目标i+1在目标i出结果之前绝不启动；
    /// 任一目标解析出条目立即返回，剩余目标不再调用
    async fn search_sequential(
        &self,
        query: &str,
        targets: &[Arc<dyn SearchTarget>],
    ) -> AggregateResult {
        let mut reports: Vec<TargetReport> = Vec::new();

        for (i, target) in targets.iter().enumerate() {
            if i > 0 {
                info!("Falling back to {} after empty result", target.name());
            }
            let report = run_target(
                self.executor.clone(),
                target.clone(),
                query.to_string(),
                self.config.item_limit,
                self.config.strategies.clone(),
                self.config.sequential_target_timeout,
            )
            .await;

            let hit = report.success;
            reports.push(report);
            if hit {
                break;
            }
        }

        AggregateResult::new(query, SearchMode::Sequential, reports)
    }

    /// 并发扇出模式
    ///
    /// 每个目标一个独立任务，各自带硬超时；超时只取消该目标的
    /// 在途传输（租约随drop归还），绝不影响兄弟任务。
    /// join_all保持输入顺序，去重因此按调用方目标顺序保留首现
    async fn search_concurrent(
        &self,
        query: &str,
        targets: &[Arc<dyn SearchTarget>],
        per_engine_timeout: Duration,
    ) -> AggregateResult {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let executor = self.executor.clone();
                let target = target.clone();
                let query = query.to_string();
                let limit = self.config.item_limit;
                let strategies = self.config.strategies.clone();
                let name = target.name();

                tokio::spawn(async move {
                    match tokio::time::timeout(
                        per_engine_timeout,
                        run_target(executor, target, query, limit, strategies, per_engine_timeout),
                    )
                    .await
                    {
                        Ok(report) => report,
                        Err(_) => TargetReport::from_failure(
                            name,
                            FailureKind::Timeout,
                            Vec::new(),
                            per_engine_timeout.as_millis() as u64,
                        ),
                    }
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, target) in join_all(handles).await.into_iter().zip(targets) {
            match handle {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Search task for {} aborted: {}", target.name(), e);
                    reports.push(TargetReport::from_failure(
                        target.name(),
                        FailureKind::TransportError {
                            message: e.to_string(),
                        },
                        Vec::new(),
                        0,
                    ));
                }
            }
        }

        AggregateResult::new(query, SearchMode::Concurrent, reports)
    }

    fn select_targets(&self, names: &[String]) -> Vec<Arc<dyn SearchTarget>> {
        if names.is_empty() {
            return self.targets.clone();
        }
        names
            .iter()
            .filter_map(|name| {
                let found = self
                    .targets
                    .iter()
                    .find(|t| t.name() == name.as_str())
                    .cloned();
                if found.is_none() {
                    warn!("Unknown search target '{}' ignored", name);
                }
                found
            })
            .collect()
    }

    fn record_stats(&self, report: &TargetReport) {
        let mut entry = self.stats.entry(report.engine.clone()).or_default();
        if report.success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        let total = (entry.successes + entry.failures) as f64;
        entry.avg_time_ms =
            (entry.avg_time_ms * (total - 1.0) + report.elapsed_ms as f64) / total;
    }

    /// 各引擎运行统计快照
    pub fn stats_snapshot(&self) -> std::collections::HashMap<String, EngineStats> {
        self.stats
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

/// 执行单目标搜索并产出报告
///
/// 空结果在这里分类：解析成功但零条目为NoResults，
/// 无容器命中为SelectorMismatch——永远不会静默成功
async fn run_target(
    executor: Arc<StrategyExecutor>,
    target: Arc<dyn SearchTarget>,
    query: String,
    limit: u32,
    strategies: Vec<StrategyProfile>,
    timeout: Duration,
) -> TargetReport {
    let mut task = SearchTask::new(target.name(), &query, timeout);
    task.status = TaskStatus::Running;

    let started = Instant::now();
    let deadline = started + timeout;

    let report = match executor
        .fetch(target.as_ref(), &query, limit, &strategies, deadline)
        .await
    {
        Ok(result) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let parsed: Result<Vec<SearchItem>, ParseError> = match result.items {
                Some(items) => Ok(items),
                None => target.parse(&result.body),
            };
            match parsed {
                Ok(mut items) => {
                    items.truncate(limit as usize);
                    TargetReport::from_items(target.name(), items, result.attempts, elapsed_ms)
                }
                Err(ParseError::SelectorMismatch) => TargetReport::from_failure(
                    target.name(),
                    FailureKind::SelectorMismatch,
                    result.attempts,
                    elapsed_ms,
                ),
                Err(ParseError::MalformedDocument(_)) => TargetReport::from_failure(
                    target.name(),
                    FailureKind::SelectorMismatch,
                    result.attempts,
                    elapsed_ms,
                ),
            }
        }
        Err(failure) => TargetReport::from_failure(
            target.name(),
            failure.kind.clone(),
            failure.attempts,
            started.elapsed().as_millis() as u64,
        ),
    };

    task.status = if report.success {
        TaskStatus::Succeeded
    } else {
        TaskStatus::Failed
    };
    tracing::debug!(
        "Search task {} finished with status {:?} in {}ms",
        task.target_engine,
        task.status,
        report.elapsed_ms
    );
    report
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
