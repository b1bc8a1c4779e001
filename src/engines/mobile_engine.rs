// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;

use crate::engines::http_engine::perform_fetch;
use crate::engines::traits::{FetchRequest, FetchResponse, Transport, TransportError};

const MOBILE_FALLBACK_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

/// 移动端变体传输
///
/// 以移动端身份请求目标的移动版页面。移动版页面的反爬策略
/// 通常比桌面版宽松，作为Direct之后的第二选择
pub struct MobileTransport;

#[async_trait]
impl Transport for MobileTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut request = request.clone();
        request
            .headers
            .insert("Sec-Ch-Ua-Mobile".to_string(), "?1".to_string());
        perform_fetch(&request, MOBILE_FALLBACK_UA).await
    }

    fn name(&self) -> &'static str {
        "mobile"
    }
}
