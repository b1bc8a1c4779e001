// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::models::fetch::{
    AttemptOutcome, FailureKind, FetchAttempt, FetchFailure, FetchResult, Strategy,
    StrategyProfile,
};
use crate::domain::search::target::SearchTarget;
use crate::engines::classifier::{Classification, Classifier};
use crate::engines::traits::{FetchRequest, FetchResponse, Transport};
use crate::infrastructure::fingerprint::FingerprintGenerator;
use crate::infrastructure::proxy::pool::{AcquirePolicy, ProxyLease, ProxyPool, ReleaseOutcome};
use crate::infrastructure::ratelimit::limiter::{Admission, RateLimiter};

/// 执行器配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 代理选取策略
    pub acquire_policy: AcquirePolicy,
    /// 软失败重试策略
    pub retry_policy: crate::utils::retry_policy::RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            acquire_policy: AcquirePolicy::RoundRobin,
            retry_policy: crate::utils::retry_policy::RetryPolicy::standard(),
        }
    }
}

/// 策略执行器
///
/// 对单个目标按序执行抓取策略：限流准入、代理选取、指纹应用、
/// 带子超时的传输调用、结果分类。软失败在同一策略内退避重试，
/// 硬失败立即切换下一策略，任一成功立即返回。
/// 本组件从不判定"搜索成功"——空结果的判定在上层由解析器完成
pub struct StrategyExecutor {
    transports: HashMap<Strategy, Arc<dyn Transport>>,
    rate_limiter: Arc<RateLimiter>,
    proxy_pool: Arc<ProxyPool>,
    fingerprints: Arc<FingerprintGenerator>,
    classifier: Arc<dyn Classifier>,
    config: ExecutorConfig,
}

impl StrategyExecutor {
    pub fn new(
        transports: HashMap<Strategy, Arc<dyn Transport>>,
        rate_limiter: Arc<RateLimiter>,
        proxy_pool: Arc<ProxyPool>,
        fingerprints: Arc<FingerprintGenerator>,
        classifier: Arc<dyn Classifier>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            transports,
            rate_limiter,
            proxy_pool,
            fingerprints,
            classifier,
            config,
        }
    }

    /// 对目标执行有序策略链
    ///
    /// # 参数
    ///
    /// * `target` - 搜索目标
    /// * `query` - 查询词
    /// * `limit` - 期望条目数（用于URL构造）
    /// * `strategies` - 有序策略列表
    /// * `deadline` - 整体截止时间
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResult)` - 任一策略成功，携带完整尝试轨迹
    /// * `Err(FetchFailure)` - 全部策略耗尽，携带完整尝试轨迹
    pub async fn fetch(
        &self,
        target: &dyn SearchTarget,
        query: &str,
        limit: u32,
        strategies: &[StrategyProfile],
        deadline: Instant,
    ) -> Result<FetchResult, FetchFailure> {
        let mut attempts: Vec<FetchAttempt> = Vec::new();

        for profile in strategies {
            match self
                .run_strategy(target, query, limit, profile, deadline, &mut attempts)
                .await
            {
                Some(result) => {
                    info!(
                        "Strategy {} succeeded for {} after {} attempt(s)",
                        profile.strategy.as_str(),
                        target.name(),
                        attempts.len()
                    );
                    return Ok(FetchResult {
                        body: result.body,
                        status_code: result.status_code,
                        strategy_used: profile.strategy,
                        items: result.items,
                        attempts,
                    });
                }
                None => continue,
            }
        }

        warn!(
            "All {} strategies exhausted for {}",
            strategies.len(),
            target.name()
        );
        Err(FetchFailure {
            kind: FailureKind::AllStrategiesExhausted,
            attempts,
        })
    }

    /// 在单个策略内执行重试循环
    ///
    /// 返回Some(response)表示成功；None表示该策略耗尽，调用方推进到下一策略
    async fn run_strategy(
        &self,
        target: &dyn SearchTarget,
        query: &str,
        limit: u32,
        profile: &StrategyProfile,
        deadline: Instant,
        attempts: &mut Vec<FetchAttempt>,
    ) -> Option<FetchResponse> {
        let Some(transport) = self.transports.get(&profile.strategy) else {
            debug!("No transport registered for {}", profile.strategy.as_str());
            return None;
        };

        let mut retries: u32 = 0;
        loop {
            let now = Instant::now();
            if now >= deadline {
                self.push_attempt(
                    attempts,
                    profile.strategy,
                    None,
                    None,
                    AttemptOutcome::HardFail {
                        reason: FailureKind::Timeout,
                    },
                );
                return None;
            }

            // 1. 限流准入（在截止时间内等待）
            if let Admission::Throttled { retry_after } = self
                .rate_limiter
                .acquire(target.rate_key(), 1, deadline)
                .await
            {
                self.push_attempt(
                    attempts,
                    profile.strategy,
                    None,
                    None,
                    AttemptOutcome::HardFail {
                        reason: FailureKind::RateLimited {
                            retry_after_ms: retry_after.as_millis() as u64,
                        },
                    },
                );
                return None;
            }

            // 2. 代理选取，池耗尽时按策略要求降级或放弃
            let lease: Option<ProxyLease> = if profile.uses_proxy {
                match self.proxy_pool.acquire(self.config.acquire_policy) {
                    Ok(lease) => Some(lease),
                    Err(_) if profile.requires_proxy => {
                        self.push_attempt(
                            attempts,
                            profile.strategy,
                            None,
                            None,
                            AttemptOutcome::HardFail {
                                reason: FailureKind::PoolExhausted,
                            },
                        );
                        return None;
                    }
                    Err(_) => {
                        debug!("Proxy pool exhausted, continuing without proxy");
                        None
                    }
                }
            } else {
                None
            };

            // 3. 指纹应用
            let fingerprint = profile.uses_fingerprint.then(|| match profile.strategy {
                Strategy::MobileVariant => self.fingerprints.next_mobile(),
                _ => self.fingerprints.next(),
            });

            // 4. 传输调用，子超时受剩余截止时间约束
            let url = match profile.strategy {
                Strategy::MobileVariant => target.mobile_search_url(query, limit),
                _ => target.search_url(query, limit),
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut request = FetchRequest::new(&url, query, profile.timeout.min(remaining));
            if let Some(fp) = &fingerprint {
                request.headers = fp.headers.clone();
                request.user_agent = Some(fp.user_agent.clone());
            }
            request.proxy = lease.as_ref().map(|l| l.connect_url().to_string());

            let proxy_address = lease.as_ref().map(|l| l.address().to_string());
            let fingerprint_id = fingerprint.as_ref().map(|f| f.id);
            let started_at = Utc::now();

            debug!(
                "[{}] {} attempt via {} (proxy: {:?})",
                request.request_id,
                target.name(),
                profile.strategy.as_str(),
                proxy_address
            );

            // 子超时由传输执行（request.timeout已受剩余截止时间约束）；
            // 并发扇出模式下的硬取消发生在编排器一层
            let response = transport.fetch(&request).await;

            // 5. 结果分类
            let (outcome, response) = match response {
                Ok(response) => {
                    if response.items.is_some() {
                        // 传输层已产出结构化条目，无页面可分类
                        (AttemptOutcome::Success, Some(response))
                    } else {
                        match self
                            .classifier
                            .classify(response.status_code, &response.body)
                        {
                            Classification::Clean => (AttemptOutcome::Success, Some(response)),
                            Classification::Captcha => (
                                AttemptOutcome::SoftFail {
                                    reason: FailureKind::CaptchaDetected,
                                },
                                None,
                            ),
                            Classification::Blocked => (
                                AttemptOutcome::SoftFail {
                                    reason: FailureKind::Blocked,
                                },
                                None,
                            ),
                        }
                    }
                }
                Err(e) if e.is_timeout() => (
                    AttemptOutcome::HardFail {
                        reason: FailureKind::Timeout,
                    },
                    None,
                ),
                Err(e) => (
                    AttemptOutcome::HardFail {
                        reason: FailureKind::TransportError {
                            message: e.to_string(),
                        },
                    },
                    None,
                ),
            };

            attempts.push(FetchAttempt {
                strategy: profile.strategy,
                proxy_used: proxy_address,
                fingerprint_id,
                started_at,
                outcome: outcome.clone(),
            });
            counter!(
                "executor_attempts_total",
                "strategy" => profile.strategy.as_str(),
                "outcome" => outcome_label(&outcome)
            )
            .increment(1);

            match outcome {
                AttemptOutcome::Success => {
                    if let Some(lease) = lease {
                        lease.release(ReleaseOutcome::Success);
                    }
                    return response;
                }
                AttemptOutcome::SoftFail { reason } => {
                    if let Some(lease) = lease {
                        lease.release(ReleaseOutcome::Fail);
                    }
                    // 被封路径立即换身份，避免下一次请求继续关联
                    self.fingerprints.force_rotate();

                    if !self.config.retry_policy.should_retry(retries) {
                        debug!(
                            "Strategy {} exhausted retries after {:?}",
                            profile.strategy.as_str(),
                            reason
                        );
                        return None;
                    }
                    retries += 1;
                    let backoff = self.config.retry_policy.calculate_backoff(retries);
                    if Instant::now() + backoff >= deadline {
                        return None;
                    }
                    tokio::time::sleep(backoff).await;
                }
                AttemptOutcome::HardFail { .. } => {
                    if let Some(lease) = lease {
                        lease.release(ReleaseOutcome::Fail);
                    }
                    return None;
                }
            }
        }
    }

    fn push_attempt(
        &self,
        attempts: &mut Vec<FetchAttempt>,
        strategy: Strategy,
        proxy_used: Option<String>,
        fingerprint_id: Option<u64>,
        outcome: AttemptOutcome,
    ) {
        counter!(
            "executor_attempts_total",
            "strategy" => strategy.as_str(),
            "outcome" => outcome_label(&outcome)
        )
        .increment(1);
        attempts.push(FetchAttempt {
            strategy,
            proxy_used,
            fingerprint_id,
            started_at: Utc::now(),
            outcome,
        });
    }
}

fn outcome_label(outcome: &AttemptOutcome) -> &'static str {
    match outcome {
        AttemptOutcome::Success => "success",
        AttemptOutcome::SoftFail { .. } => "soft_fail",
        AttemptOutcome::HardFail { .. } => "hard_fail",
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
