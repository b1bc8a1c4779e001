// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tokio::time::Instant;

/// 令牌桶
///
/// 补充是基于时间的连续补充，与请求次数无关。
/// 不变式: 0 <= tokens <= capacity，永不为负
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    /// 每秒补充令牌数
    refill_rate: f64,
    last_refill_at: Instant,
}

impl TokenBucket {
    /// 创建满桶
    pub fn new(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: refill_rate.max(f64::MIN_POSITIVE),
            last_refill_at: now,
        }
    }

    /// 按经过时间补充令牌
    ///
    /// 补充是单调的: tokens = min(capacity, tokens + elapsed * rate)
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill_at);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill_at = now;
    }

    /// 原子测试并扣减
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 令牌充足，已扣减
    /// * `Err(wait)` - 令牌不足，wait = (n - tokens) / rate
    pub fn try_acquire(&mut self, n: u32, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        let n = n as f64;
        if self.tokens >= n {
            self.tokens -= n;
            Ok(())
        } else {
            let wait_secs = (n - self.tokens) / self.refill_rate;
            Err(Duration::from_secs_f64(wait_secs))
        }
    }

    /// 当前令牌数（测试与统计用）
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
