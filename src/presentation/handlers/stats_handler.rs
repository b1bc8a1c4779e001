// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::infrastructure::proxy::pool::ProxyPool;
use crate::infrastructure::ratelimit::limiter::RateLimiter;
use crate::infrastructure::search::orchestrator::SearchOrchestrator;

/// 运行统计端点
///
/// 返回代理池状态、各引擎成功率与限流器降级状态
pub async fn stats(
    Extension(orchestrator): Extension<Arc<SearchOrchestrator>>,
    Extension(pool): Extension<Arc<ProxyPool>>,
    Extension(limiter): Extension<Arc<RateLimiter>>,
) -> impl IntoResponse {
    let body = json!({
        "proxies": pool.stats(),
        "engines": orchestrator.stats_snapshot(),
        "rate_limiter": { "degraded": limiter.is_degraded() },
    });
    (StatusCode::OK, Json(body))
}
