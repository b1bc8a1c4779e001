// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 限流器分布式降级测试
//!
//! 后备存储不可达时acquire必须透明走本地桶，不向调用方抛错

use searchrs::infrastructure::cache::redis_client::RedisClient;
use searchrs::infrastructure::ratelimit::limiter::{Admission, BucketConfig, RateLimiter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn test_unreachable_store_degrades_to_local_bucket() {
    // A port nothing listens on: every Redis round-trip fails fast
    let redis = RedisClient::new("redis://127.0.0.1:1/0")
        .await
        .expect("client construction is lazy");

    let limiter = RateLimiter::distributed(
        Arc::new(redis),
        BucketConfig {
            capacity: 5,
            refill_per_second: 100.0,
        },
        HashMap::new(),
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    for _ in 0..5 {
        assert_eq!(
            limiter.acquire("search", 1, deadline).await,
            Admission::Granted,
            "local fallback must keep granting"
        );
    }
    assert!(limiter.is_degraded());
}

#[tokio::test]
async fn test_degraded_limiter_still_enforces_budget() {
    let redis = RedisClient::new("redis://127.0.0.1:1/0").await.unwrap();
    let limiter = RateLimiter::distributed(
        Arc::new(redis),
        BucketConfig {
            capacity: 2,
            refill_per_second: 0.001,
        },
        HashMap::new(),
    );

    let tight = Instant::now() + Duration::from_millis(50);
    assert_eq!(limiter.acquire("k", 1, tight).await, Admission::Granted);
    assert_eq!(limiter.acquire("k", 1, tight).await, Admission::Granted);
    assert!(matches!(
        limiter.acquire("k", 1, tight).await,
        Admission::Throttled { .. }
    ));
}
