// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use rand::prelude::IndexedRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::proxy::{ProxyRecord, ProxyScheme, ProxyState};

/// 池耗尽
///
/// 非致命错误：调用方降级为直连或按自身策略放弃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("proxy pool exhausted")]
pub struct PoolExhausted;

/// 选取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// 轮询
    RoundRobin,
    /// 随机
    Random,
}

/// 释放时的结果回报
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Success,
    Fail,
}

/// 代理池配置
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// 连续失败阈值，达到后转入Dead
    pub failure_threshold: u32,
    /// 池容量上限
    pub max_proxies: usize,
    /// 探测目标URL
    pub probe_url: String,
    /// 单次探测超时
    pub probe_timeout: Duration,
    /// 每轮探测的代理数量上限
    pub probe_batch: usize,
    /// 探测并发上限
    pub probe_concurrency: usize,
    /// 可用代理低于该值时触发补充
    pub min_alive: usize,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            max_proxies: 500,
            probe_url: "https://api.ipify.org?format=json".to_string(),
            probe_timeout: Duration::from_secs(10),
            probe_batch: 30,
            probe_concurrency: 10,
            min_alive: 20,
        }
    }
}

/// 池统计快照
#[derive(Debug, Clone, Serialize)]
pub struct ProxyPoolStats {
    pub total: usize,
    pub alive: usize,
    pub untested: usize,
    pub suspect: usize,
    pub dead: usize,
    /// 按评分排序的最佳代理
    pub top: Vec<ProxyRecord>,
}

struct PoolState {
    /// 地址到记录的映射，去重的权威来源
    records: HashMap<String, ProxyRecord>,
    /// 插入顺序，轮询在其上推进
    rotation: Vec<String>,
    rr_index: usize,
}

/// 代理池
///
/// 所有生命周期状态都封装在单一互斥锁之后，acquire/release
/// 在并发调用下可线性化；内部集合从不对外暴露。
/// acquire从不阻塞等待代理——池空即刻返回PoolExhausted
pub struct ProxyPool {
    state: Mutex<PoolState>,
    config: ProxyPoolConfig,
}

impl ProxyPool {
    pub fn new(config: ProxyPoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState {
                records: HashMap::new(),
                rotation: Vec::new(),
                rr_index: 0,
            }),
            config,
        }
    }

    /// 选取一个可用代理
    ///
    /// 仅返回Alive或尚未失败过的Untested代理，Dead永远不会被返回。
    ///
    /// # 参数
    ///
    /// * `policy` - 轮询或随机
    ///
    /// # 返回值
    ///
    /// * `Ok(ProxyLease)` - 代理租约，通过release回报结果
    /// * `Err(PoolExhausted)` - 无可用代理
    pub fn acquire(self: &Arc<Self>, policy: AcquirePolicy) -> Result<ProxyLease, PoolExhausted> {
        let mut state = self.state.lock();

        let acquirable: Vec<usize> = state
            .rotation
            .iter()
            .enumerate()
            .filter(|(_, addr)| {
                state
                    .records
                    .get(*addr)
                    .map(|r| r.is_acquirable())
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();

        if acquirable.is_empty() {
            counter!("proxy_pool_exhausted_total").increment(1);
            return Err(PoolExhausted);
        }

        let index = match policy {
            AcquirePolicy::RoundRobin => {
                // 从rr_index起顺时针找到第一个可用槽位
                let next = acquirable
                    .iter()
                    .copied()
                    .find(|i| *i >= state.rr_index % state.rotation.len())
                    .unwrap_or(acquirable[0]);
                state.rr_index = next + 1;
                next
            }
            AcquirePolicy::Random => *acquirable
                .choose(&mut rand::rng())
                .unwrap_or(&acquirable[0]),
        };

        let address = state.rotation[index].clone();
        let record = state.records[&address].clone();

        Ok(ProxyLease {
            address,
            connect_url: record.connect_url(),
            scheme: record.scheme,
            pool: Arc::clone(self),
            outcome_reported: false,
        })
    }

    /// 记录一次使用结果并更新状态机
    fn record_outcome(&self, address: &str, outcome: ReleaseOutcome) {
        let threshold = self.config.failure_threshold;
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(address) else {
            return;
        };

        match outcome {
            ReleaseOutcome::Success => {
                record.successes += 1;
                record.consecutive_failures = 0;
                if record.state != ProxyState::Dead {
                    record.state = ProxyState::Alive;
                }
                counter!("proxy_pool_release_total", "outcome" => "success").increment(1);
            }
            ReleaseOutcome::Fail => {
                record.consecutive_failures += 1;
                record.state = if record.consecutive_failures >= threshold {
                    debug!("Proxy {} marked dead after {} consecutive failures", address, record.consecutive_failures);
                    ProxyState::Dead
                } else {
                    ProxyState::Suspect
                };
                counter!("proxy_pool_release_total", "outcome" => "fail").increment(1);
            }
        }
        self.update_gauges(&state);
    }

    /// 合并新的候选代理
    ///
    /// 按地址去重，新条目以Untested进入；超出容量上限的部分丢弃。
    ///
    /// # 返回值
    ///
    /// 实际新增数量
    pub fn refill(&self, candidates: impl IntoIterator<Item = String>) -> usize {
        let mut state = self.state.lock();
        let mut added = 0;

        for candidate in candidates {
            if state.records.len() >= self.config.max_proxies {
                break;
            }
            let record = ProxyRecord::new(&candidate);
            if record.address.is_empty() || state.records.contains_key(&record.address) {
                continue;
            }
            state.rotation.push(record.address.clone());
            state.records.insert(record.address.clone(), record);
            added += 1;
        }

        if added > 0 {
            counter!("proxy_pool_refilled_total").increment(added as u64);
        }
        self.update_gauges(&state);
        added
    }

    /// 取一批待探测代理
    ///
    /// Suspect/Dead/Untested按最久未检查优先，数量受limit约束
    pub fn probe_candidates(&self, limit: usize) -> Vec<ProxyRecord> {
        let state = self.state.lock();
        let mut candidates: Vec<ProxyRecord> = state
            .records
            .values()
            .filter(|r| r.state != ProxyState::Alive)
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.last_checked_at);
        candidates.truncate(limit);
        candidates
    }

    /// 记录一次探测结果
    ///
    /// 通过的探测: Dead -> Suspect（还需一次真实请求成功才回到Alive），
    /// Untested/Suspect -> Alive。失败的探测与使用失败同样计数
    pub fn record_probe_result(&self, address: &str, passed: bool, elapsed: Option<Duration>) {
        let threshold = self.config.failure_threshold;
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(address) else {
            return;
        };

        record.last_checked_at = Some(Utc::now());
        if let Some(elapsed) = elapsed {
            // 响应时间指数移动平均
            record.response_time = record.response_time * 0.7 + elapsed.as_secs_f64() * 0.3;
        }

        if passed {
            record.consecutive_failures = 0;
            record.successes += 1;
            record.state = match record.state {
                ProxyState::Dead => ProxyState::Suspect,
                _ => ProxyState::Alive,
            };
        } else {
            record.consecutive_failures += 1;
            if record.consecutive_failures >= threshold {
                record.state = ProxyState::Dead;
            } else if record.state != ProxyState::Dead {
                record.state = ProxyState::Suspect;
            }
        }
        self.update_gauges(&state);
    }

    /// 清除超额的Dead代理
    ///
    /// 池超过容量上限时从最差的Dead记录开始清除，为补充腾出空间
    pub fn purge_dead(&self) -> usize {
        let mut state = self.state.lock();
        if state.records.len() < self.config.max_proxies {
            return 0;
        }

        let mut dead: Vec<(String, f64)> = state
            .records
            .values()
            .filter(|r| r.state == ProxyState::Dead)
            .map(|r| (r.address.clone(), r.score()))
            .collect();
        dead.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let excess = state.records.len().saturating_sub(self.config.max_proxies / 2);
        let mut purged = 0;
        for (address, _) in dead.into_iter().take(excess) {
            state.records.remove(&address);
            state.rotation.retain(|a| a != &address);
            purged += 1;
        }

        if purged > 0 {
            debug!("Purged {} dead proxies", purged);
        }
        self.update_gauges(&state);
        purged
    }

    /// 池配置
    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    /// 存活代理数（Alive + 未失败的Untested）
    pub fn available_count(&self) -> usize {
        let state = self.state.lock();
        state.records.values().filter(|r| r.is_acquirable()).count()
    }

    /// 统计快照
    pub fn stats(&self) -> ProxyPoolStats {
        let state = self.state.lock();
        let count_state =
            |s: ProxyState| state.records.values().filter(|r| r.state == s).count();

        let mut top: Vec<ProxyRecord> = state.records.values().cloned().collect();
        top.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top.truncate(10);

        ProxyPoolStats {
            total: state.records.len(),
            alive: count_state(ProxyState::Alive),
            untested: count_state(ProxyState::Untested),
            suspect: count_state(ProxyState::Suspect),
            dead: count_state(ProxyState::Dead),
            top,
        }
    }

    fn update_gauges(&self, state: &PoolState) {
        let alive = state
            .records
            .values()
            .filter(|r| r.state == ProxyState::Alive)
            .count();
        gauge!("proxy_pool_total").set(state.records.len() as f64);
        gauge!("proxy_pool_alive").set(alive as f64);
    }

    #[cfg(test)]
    fn state_of(&self, address: &str) -> Option<ProxyState> {
        self.state.lock().records.get(address).map(|r| r.state)
    }
}

/// 代理租约
///
/// acquire的返回值：携带连接信息，通过release回报使用结果。
/// 未回报就被丢弃（任务被取消）时代理无损回到轮转，不计任何结果
#[must_use = "lease outcomes drive proxy health bookkeeping"]
pub struct ProxyLease {
    address: String,
    connect_url: String,
    scheme: ProxyScheme,
    pool: Arc<ProxyPool>,
    outcome_reported: bool,
}

impl ProxyLease {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connect_url(&self) -> &str {
        &self.connect_url
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    /// 回报使用结果并归还租约
    pub fn release(mut self, outcome: ReleaseOutcome) {
        self.outcome_reported = true;
        self.pool.record_outcome(&self.address, outcome);
    }
}

impl Drop for ProxyLease {
    fn drop(&mut self) {
        if !self.outcome_reported {
            debug!("Proxy lease for {} dropped without outcome", self.address);
        }
    }
}
