// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use crate::domain::models::search_result::SearchItem;
use crate::engines::traits::{FetchRequest, FetchResponse, Transport, TransportError};

/// SearXNG响应条目
#[derive(Debug, Deserialize)]
struct SearxResultEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResultEntry>,
}

/// 库级降级传输
///
/// LibraryFallback策略：主引擎全部被封时向SearXNG元搜索实例
/// 发起JSON查询，直接返回结构化条目而非HTML文档。
/// 依次尝试配置的实例，任一实例产出条目即返回
pub struct LibraryTransport {
    /// SearXNG实例列表
    instances: Vec<String>,
}

impl LibraryTransport {
    pub fn new(instances: Vec<String>) -> Self {
        Self { instances }
    }

    async fn query_instance(
        &self,
        base_url: &str,
        request: &FetchRequest,
    ) -> Result<Vec<SearchItem>, TransportError> {
        let url = format!(
            "{}/search?q={}&format=json&categories=general&pageno=1",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&request.query)
        );

        let client = reqwest::Client::builder()
            .timeout(request.timeout)
            .build()?;

        let response = client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let parsed: SearxResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Other(format!("Invalid SearXNG JSON: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| r.url.starts_with("http"))
            .map(|r| SearchItem::new(r.title, r.url, r.content, "searxng".to_string()))
            .collect())
    }
}

#[async_trait]
impl Transport for LibraryTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let start = Instant::now();

        for base_url in &self.instances {
            match self.query_instance(base_url, request).await {
                Ok(items) if !items.is_empty() => {
                    let mut response = FetchResponse::new(
                        200,
                        String::new(),
                        base_url.clone(),
                        start.elapsed().as_millis() as u64,
                    );
                    response.items = Some(items);
                    return Ok(response);
                }
                Ok(_) => {
                    debug!("SearXNG instance {} returned no results", base_url);
                }
                Err(e) => {
                    debug!("SearXNG instance {} failed: {}", base_url, e);
                }
            }
        }

        Err(TransportError::Other(
            "All SearXNG instances failed".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "library"
    }
}
