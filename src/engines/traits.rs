// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::search_result::SearchItem;

/// 传输层错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 浏览器自动化错误
    #[error("Browser error: {0}")]
    Browser(String),
    /// 无效代理配置
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl TransportError {
    /// 判断错误是否为连接/超时类错误
    ///
    /// # 返回值
    ///
    /// 连接或超时错误返回true，此类错误由执行器分类为硬失败
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout => true,
            TransportError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// 抓取请求
///
/// 由执行器组装：URL来自搜索目标，代理与指纹来自各自的池
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 请求标识（日志关联用）
    pub request_id: Uuid,
    /// 目标URL
    pub url: String,
    /// 原始查询词（库级策略据此自行构造请求）
    pub query: String,
    /// 请求头（指纹生成器产出）
    pub headers: HashMap<String, String>,
    /// User-Agent
    pub user_agent: Option<String>,
    /// 代理连接URL
    pub proxy: Option<String>,
    /// 超时时间
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: &str, query: &str, timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            url: url.to_string(),
            query: query.to_string(),
            headers: HashMap::new(),
            user_agent: None,
            proxy: None,
            timeout,
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码（库级策略合成200）
    pub status_code: u16,
    /// 响应内容
    pub body: String,
    /// 最终URL（重定向后）
    pub final_url: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    /// 传输层已结构化的结果条目
    ///
    /// 库级策略直接返回条目而非文档，此时body为空且不参与页面分类
    pub items: Option<Vec<SearchItem>>,
}

impl FetchResponse {
    pub fn new(status_code: u16, body: String, final_url: String, response_time_ms: u64) -> Self {
        Self {
            status_code,
            body,
            final_url,
            response_time_ms,
            items: None,
        }
    }
}

/// 传输特质
///
/// 每个抓取策略对应一个实现，契约完全一致，
/// 执行器从不根据具体类型分支
#[async_trait]
pub trait Transport: Send + Sync {
    /// 执行抓取
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;

    /// 传输名称
    fn name(&self) -> &'static str;
}
