// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::infrastructure::cache::redis_client::RedisClient;
use crate::infrastructure::ratelimit::bucket::TokenBucket;

/// 准入结果
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// 已准入
    Granted,
    /// 被限流，retry_after为预计可用等待时间
    Throttled { retry_after: Duration },
}

/// 单个键的桶参数
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// 桶容量
    pub capacity: u32,
    /// 每秒补充令牌数
    pub refill_per_second: f64,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            refill_per_second: 1.0,
        }
    }
}

/// 分布式模式下的原子令牌桶脚本
///
/// 读取-补充-扣减在Redis服务端单次执行，返回 {granted, wait_ms}
const TOKEN_BUCKET_SCRIPT: &str = r#"
    local key = KEYS[1]
    local capacity = tonumber(ARGV[1])
    local rate = tonumber(ARGV[2])
    local requested = tonumber(ARGV[3])
    local now_ms = tonumber(ARGV[4])

    local tokens_key = key .. ":tokens"
    local refill_key = key .. ":last_refill"

    local tokens = tonumber(redis.call("GET", tokens_key)) or capacity
    local last_refill = tonumber(redis.call("GET", refill_key)) or now_ms

    local elapsed = math.max(0, now_ms - last_refill) / 1000.0
    tokens = math.min(capacity, tokens + elapsed * rate)

    if tokens >= requested then
        tokens = tokens - requested
        redis.call("SET", tokens_key, tokens)
        redis.call("SET", refill_key, now_ms)
        redis.call("EXPIRE", tokens_key, 120)
        redis.call("EXPIRE", refill_key, 120)
        return {1, 0}
    else
        redis.call("SET", tokens_key, tokens)
        redis.call("SET", refill_key, now_ms)
        redis.call("EXPIRE", tokens_key, 120)
        redis.call("EXPIRE", refill_key, 120)
        return {0, math.ceil((requested - tokens) / rate * 1000)}
    end
"#;

/// 降级恢复探测间隔
const RECOVERY_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// 限流器
///
/// 按逻辑键做令牌桶准入控制。配置了Redis时桶状态存放在共享存储，
/// 多个进程共享同一预算；存储不可达时透明降级为进程内桶，
/// 调用方观察不到接口变化，降级事件每次状态切换只记录一次
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    per_key: HashMap<String, BucketConfig>,
    default_config: BucketConfig,
    redis: Option<Arc<RedisClient>>,
    key_prefix: String,
    degraded: AtomicBool,
    last_probe_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// 创建纯本地限流器
    pub fn local(default_config: BucketConfig, per_key: HashMap<String, BucketConfig>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            per_key,
            default_config,
            redis: None,
            key_prefix: "searchrs:ratelimit".to_string(),
            degraded: AtomicBool::new(false),
            last_probe_at: Mutex::new(None),
        }
    }

    /// 创建分布式限流器，本地桶作为降级后备
    pub fn distributed(
        redis: Arc<RedisClient>,
        default_config: BucketConfig,
        per_key: HashMap<String, BucketConfig>,
    ) -> Self {
        Self {
            redis: Some(redis),
            ..Self::local(default_config, per_key)
        }
    }

    fn config_for(&self, key: &str) -> &BucketConfig {
        self.per_key.get(key).unwrap_or(&self.default_config)
    }

    /// 获取n个令牌，在deadline内等待
    ///
    /// # 参数
    ///
    /// * `key` - 逻辑键（同类目标共享预算）
    /// * `n` - 请求令牌数
    /// * `deadline` - 等待截止时间
    ///
    /// # 返回值
    ///
    /// * `Admission::Granted` - 已扣减令牌
    /// * `Admission::Throttled` - 截止时间内无法满足，携带建议等待时间
    pub async fn acquire(&self, key: &str, n: u32, deadline: Instant) -> Admission {
        loop {
            let wait = match self.try_acquire_once(key, n).await {
                Ok(()) => {
                    counter!("rate_limiter_granted_total", "key" => key.to_string()).increment(1);
                    return Admission::Granted;
                }
                Err(wait) => wait,
            };

            if Instant::now() + wait > deadline {
                counter!("rate_limiter_throttled_total", "key" => key.to_string()).increment(1);
                return Admission::Throttled { retry_after: wait };
            }

            // 在临界区之外等待，醒来后重新竞争令牌
            tokio::time::sleep(wait).await;
        }
    }

    /// 单次测试并扣减
    async fn try_acquire_once(&self, key: &str, n: u32) -> Result<(), Duration> {
        if let Some(redis) = self.redis.clone() {
            if self.should_try_redis() {
                match self.try_acquire_redis(&redis, key, n).await {
                    Ok(result) => {
                        self.mark_distributed_ok();
                        return result;
                    }
                    Err(e) => self.mark_degraded(&e),
                }
            }
        }
        self.try_acquire_local(key, n)
    }

    fn try_acquire_local(&self, key: &str, n: u32) -> Result<(), Duration> {
        let config = self.config_for(key).clone();
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(config.capacity, config.refill_per_second, now));
        bucket.try_acquire(n, now)
    }

    async fn try_acquire_redis(
        &self,
        redis: &RedisClient,
        key: &str,
        n: u32,
    ) -> anyhow::Result<Result<(), Duration>> {
        let config = self.config_for(key);
        let full_key = format!("{}:{}", self.key_prefix, key);
        let now_ms = chrono::Utc::now().timestamp_millis();

        let result: Vec<i64> = redis
            .eval_script(
                TOKEN_BUCKET_SCRIPT,
                &[&full_key],
                &[
                    config.capacity.to_string(),
                    config.refill_per_second.to_string(),
                    n.to_string(),
                    now_ms.to_string(),
                ],
            )
            .await?;

        if result.first() == Some(&1) {
            Ok(Ok(()))
        } else {
            let wait_ms = result.get(1).copied().unwrap_or(1000).max(1) as u64;
            Ok(Err(Duration::from_millis(wait_ms)))
        }
    }

    /// 降级期间是否值得再探测Redis
    fn should_try_redis(&self) -> bool {
        if !self.degraded.load(Ordering::Acquire) {
            return true;
        }
        let mut last = self.last_probe_at.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < RECOVERY_PROBE_INTERVAL => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn mark_degraded(&self, error: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(
                "Rate limiter backing store unreachable, degrading to in-process buckets: {}",
                error
            );
            counter!("rate_limiter_degraded_total").increment(1);
        }
    }

    fn mark_distributed_ok(&self) {
        if self.degraded.swap(false, Ordering::AcqRel) {
            info!("Rate limiter backing store reachable again, distributed mode restored");
        }
    }

    /// 当前是否处于降级状态（统计用）
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}
