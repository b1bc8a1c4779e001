// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 抓取策略
///
/// 闭合枚举，每个变体对应一种Transport实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 直接HTTP请求
    Direct,
    /// 移动端变体请求
    MobileVariant,
    /// 浏览器自动化
    BrowserAutomation,
    /// 库级降级（元搜索）
    LibraryFallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::MobileVariant => "mobile_variant",
            Strategy::BrowserAutomation => "browser_automation",
            Strategy::LibraryFallback => "library_fallback",
        }
    }
}

/// 策略执行参数
///
/// 每个策略自带超时与资源需求，由配置构造
#[derive(Debug, Clone)]
pub struct StrategyProfile {
    pub strategy: Strategy,
    /// 单次尝试超时
    pub timeout: Duration,
    /// 是否使用代理
    pub uses_proxy: bool,
    /// 是否强制要求代理（PoolExhausted时不降级为直连）
    pub requires_proxy: bool,
    /// 是否应用指纹
    pub uses_fingerprint: bool,
}

impl StrategyProfile {
    pub fn new(strategy: Strategy, timeout: Duration) -> Self {
        let (uses_proxy, uses_fingerprint) = match strategy {
            Strategy::Direct | Strategy::MobileVariant => (true, true),
            Strategy::BrowserAutomation => (true, true),
            Strategy::LibraryFallback => (false, false),
        };
        Self {
            strategy,
            timeout,
            uses_proxy,
            requires_proxy: false,
            uses_fingerprint,
        }
    }
}

/// 失败类别
///
/// 贯穿执行器与编排器的错误分类，始终以结构化结果传播
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    #[error("proxy pool exhausted")]
    PoolExhausted,
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("timeout")]
    Timeout,
    #[error("blocked by target")]
    Blocked,
    #[error("captcha challenge detected")]
    CaptchaDetected,
    #[error("no results")]
    NoResults,
    #[error("no known selector matched")]
    SelectorMismatch,
    #[error("all strategies exhausted")]
    AllStrategiesExhausted,
    #[error("transport error: {message}")]
    TransportError { message: String },
}

/// 单次尝试结果分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    /// 成功
    Success,
    /// 软失败，同策略退避重试
    SoftFail { reason: FailureKind },
    /// 硬失败，立即切换下一策略
    HardFail { reason: FailureKind },
}

/// 一次抓取尝试的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub strategy: Strategy,
    pub proxy_used: Option<String>,
    pub fingerprint_id: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// 抓取成功结果
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// 响应体
    pub body: String,
    /// HTTP状态码（库级策略合成200）
    pub status_code: u16,
    /// 成功使用的策略
    pub strategy_used: Strategy,
    /// 传输层已结构化的条目（库级策略），存在时无需再解析body
    pub items: Option<Vec<crate::domain::models::search_result::SearchItem>>,
    /// 完整尝试轨迹
    pub attempts: Vec<FetchAttempt>,
}

/// 抓取终态失败
///
/// 携带完整尝试轨迹，调用方可据此归因
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub attempts: Vec<FetchAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_serializes_tagged() {
        let kind = FailureKind::RateLimited { retry_after_ms: 1500 };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "rate_limited");
        assert_eq!(json["retry_after_ms"], 1500);
    }

    #[test]
    fn test_library_fallback_profile_needs_no_proxy() {
        let profile = StrategyProfile::new(Strategy::LibraryFallback, Duration::from_secs(10));
        assert!(!profile.uses_proxy);
        assert!(!profile.uses_fingerprint);
    }
}
