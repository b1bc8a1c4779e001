// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::models::fetch::{FailureKind, FetchAttempt};

/// 单条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    /// 来源引擎
    pub engine: String,
}

impl SearchItem {
    pub fn new(title: String, url: String, snippet: Option<String>, engine: String) -> Self {
        Self {
            title,
            url,
            snippet,
            engine,
        }
    }
}

/// 搜索模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// 顺序降级：逐个目标尝试，命中即停
    Sequential,
    /// 并发扇出：全部目标并行，独立超时
    Concurrent,
}

/// 搜索任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// 单目标搜索任务
///
/// 每次编排调用创建，由该调用独占，结果返回后即丢弃
#[derive(Debug, Clone)]
pub struct SearchTask {
    pub target_engine: String,
    pub query: String,
    pub timeout_budget: Duration,
    pub status: TaskStatus,
    pub items: Vec<SearchItem>,
}

impl SearchTask {
    pub fn new(target_engine: &str, query: &str, timeout_budget: Duration) -> Self {
        Self {
            target_engine: target_engine.to_string(),
            query: query.to_string(),
            timeout_budget,
            status: TaskStatus::Pending,
            items: Vec::new(),
        }
    }
}

/// 单目标结果报告
///
/// 不变式: success 为 true 当且仅当 items 非空。
/// 传输层200但解析出0条结果必须报告 success=false 并携带错误分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub engine: String,
    pub success: bool,
    pub items: Vec<SearchItem>,
    pub error: Option<String>,
    pub error_type: Option<FailureKind>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attempts: Vec<FetchAttempt>,
    pub elapsed_ms: u64,
}

impl TargetReport {
    /// 由解析结果构造报告，强制执行 success == !items.is_empty()
    pub fn from_items(
        engine: &str,
        items: Vec<SearchItem>,
        attempts: Vec<FetchAttempt>,
        elapsed_ms: u64,
    ) -> Self {
        if items.is_empty() {
            Self {
                engine: engine.to_string(),
                success: false,
                items,
                error: Some("parser yielded no usable items".to_string()),
                error_type: Some(FailureKind::NoResults),
                attempts,
                elapsed_ms,
            }
        } else {
            Self {
                engine: engine.to_string(),
                success: true,
                items,
                error: None,
                error_type: None,
                attempts,
                elapsed_ms,
            }
        }
    }

    pub fn from_failure(
        engine: &str,
        kind: FailureKind,
        attempts: Vec<FetchAttempt>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            engine: engine.to_string(),
            success: false,
            items: Vec::new(),
            error: Some(kind.to_string()),
            error_type: Some(kind),
            attempts,
            elapsed_ms,
        }
    }
}

/// 聚合搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub query: String,
    pub mode: SearchMode,
    pub succeeded_count: usize,
    pub failed_count: usize,
    /// 跨目标合并去重后的结果
    pub items: Vec<SearchItem>,
    pub per_target: Vec<TargetReport>,
    pub completed_at: DateTime<Utc>,
}

impl AggregateResult {
    pub fn new(query: &str, mode: SearchMode, per_target: Vec<TargetReport>) -> Self {
        let succeeded_count = per_target.iter().filter(|r| r.success).count();
        let failed_count = per_target.len() - succeeded_count;
        Self {
            query: query.to_string(),
            mode,
            succeeded_count,
            failed_count,
            items: Vec::new(),
            per_target,
            completed_at: Utc::now(),
        }
    }
}
