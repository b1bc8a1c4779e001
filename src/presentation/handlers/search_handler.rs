// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::search_result::SearchMode;
use crate::infrastructure::search::orchestrator::SearchOrchestrator;
use crate::presentation::errors::AppError;

/// 搜索请求体
#[derive(Debug, Deserialize)]
pub struct SearchRequestDto {
    /// 查询词
    pub query: String,
    /// 搜索模式，缺省为顺序降级
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    /// 目标子集，空则使用全部已配置目标
    #[serde(default)]
    pub targets: Vec<String>,
    /// 并发模式下单目标超时（秒）
    #[serde(default)]
    pub per_engine_timeout_secs: Option<u64>,
}

fn default_mode() -> SearchMode {
    SearchMode::Sequential
}

/// 处理搜索请求
///
/// # 参数
///
/// * `orchestrator` - 搜索编排器实例
/// * `payload` - 搜索请求数据
///
/// # 返回值
///
/// 返回聚合搜索结果或错误信息
///
/// # 错误
///
/// 查询词为空时返回400
pub async fn search(
    Extension(orchestrator): Extension<Arc<SearchOrchestrator>>,
    Json(payload): Json<SearchRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    if payload.query.trim().is_empty() {
        return Err(anyhow::anyhow!("query cannot be empty").into());
    }

    let result = orchestrator
        .search(
            payload.query.trim(),
            payload.mode,
            &payload.targets,
            payload.per_engine_timeout_secs.map(Duration::from_secs),
        )
        .await;

    Ok((StatusCode::OK, Json(result)))
}
