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
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Instant;

use crate::engines::traits::{FetchRequest, FetchResponse, Transport, TransportError};

const DESKTOP_FALLBACK_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// 执行一次HTTP抓取
///
/// 每个请求使用独立客户端以隔离Cookie，代理与超时按请求配置
pub(crate) async fn perform_fetch(
    request: &FetchRequest,
    fallback_ua: &str,
) -> Result<FetchResponse, TransportError> {
    // Build headers
    let mut headers = HeaderMap::new();
    for (k, v) in &request.headers {
        if let (Ok(k), Ok(v)) = (
            HeaderName::from_bytes(k.as_bytes()),
            HeaderValue::from_str(v),
        ) {
            headers.insert(k, v);
        }
    }

    // Each request gets a fresh client for cookie isolation
    let mut builder = reqwest::Client::builder()
        .user_agent(request.user_agent.as_deref().unwrap_or(fallback_ua))
        .timeout(request.timeout)
        .cookie_store(true);

    if let Some(proxy_url) = &request.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| TransportError::InvalidProxy(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    let client = builder.build()?;

    let start = Instant::now();
    let response = client.get(&request.url).headers(headers).send().await?;

    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response.text().await?;

    Ok(FetchResponse::new(
        status_code,
        body,
        final_url,
        start.elapsed().as_millis() as u64,
    ))
}

/// 直连HTTP传输
///
/// 基于reqwest实现的Direct策略传输
pub struct HttpTransport;

#[async_trait]
impl Transport for HttpTransport {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应
    /// * `Err(TransportError)` - 抓取过程中出现的错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        perform_fetch(request, DESKTOP_FALLBACK_UA).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
