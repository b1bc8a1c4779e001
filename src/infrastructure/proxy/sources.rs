// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// 代理列表中的 ip:port 提取模式
static PROXY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}:\d{2,5}\b").expect("valid proxy pattern"));

/// 默认HTTP代理源（免费列表）
pub const DEFAULT_HTTP_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all",
    "https://www.proxy-list.download/api/v1/get?type=http",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
    "https://raw.githubusercontent.com/monosans/proxy-list/main/proxies/http.txt",
    "https://raw.githubusercontent.com/jetkai/proxy-list/main/online-proxies/txt/proxies-http.txt",
];

/// 默认SOCKS5代理源
pub const DEFAULT_SOCKS_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks5.txt",
    "https://raw.githubusercontent.com/monosans/proxy-list/main/proxies/socks5.txt",
];

/// 代理候选来源
///
/// 从远端明文列表抓取候选代理并与静态配置合并。
/// 单个来源失败只降低候选量，不影响其他来源
#[derive(Debug, Clone)]
pub struct ProxySources {
    pub http_sources: Vec<String>,
    pub socks_sources: Vec<String>,
    /// 配置中的静态代理（可带凭证）
    pub static_proxies: Vec<String>,
    pub fetch_timeout: Duration,
}

impl Default for ProxySources {
    fn default() -> Self {
        Self {
            http_sources: DEFAULT_HTTP_SOURCES.iter().map(|s| s.to_string()).collect(),
            socks_sources: DEFAULT_SOCKS_SOURCES.iter().map(|s| s.to_string()).collect(),
            static_proxies: Vec::new(),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

impl ProxySources {
    /// 抓取并合并全部来源的候选代理
    ///
    /// # 返回值
    ///
    /// 去重后的代理URL列表（带协议前缀），静态代理排在最前
    pub async fn fetch_candidates(&self) -> Vec<String> {
        let client = match reqwest::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!("Failed to build proxy source client: {}", e);
                return self.static_proxies.clone();
            }
        };

        let fetches = self
            .http_sources
            .iter()
            .map(|url| (url.clone(), "http"))
            .chain(self.socks_sources.iter().map(|url| (url.clone(), "socks5")))
            .map(|(url, scheme)| {
                let client = client.clone();
                async move {
                    match fetch_source(&client, &url, scheme).await {
                        Ok(found) => {
                            debug!("Fetched {} proxies from {}", found.len(), url);
                            found
                        }
                        Err(e) => {
                            debug!("Failed to fetch from {}: {}", url, e);
                            Vec::new()
                        }
                    }
                }
            });

        let mut merged: Vec<String> = self.static_proxies.clone();
        let mut seen: HashSet<String> = merged.iter().cloned().collect();

        for found in join_all(fetches).await {
            for proxy in found {
                if seen.insert(proxy.clone()) {
                    merged.push(proxy);
                }
            }
        }

        info!("Collected {} candidate proxies from sources", merged.len());
        merged
    }
}

async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    scheme: &str,
) -> Result<Vec<String>, reqwest::Error> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Ok(Vec::new());
    }
    let text = response.text().await?;
    Ok(extract_proxies(&text, scheme))
}

/// 从明文列表提取代理地址
pub fn extract_proxies(text: &str, scheme: &str) -> Vec<String> {
    PROXY_PATTERN
        .find_iter(text)
        .map(|m| format!("{}://{}", scheme, m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_list() {
        let text = "1.2.3.4:8080\n5.6.7.8:3128\nnot a proxy\n";
        let found = extract_proxies(text, "http");
        assert_eq!(
            found,
            vec!["http://1.2.3.4:8080".to_string(), "http://5.6.7.8:3128".to_string()]
        );
    }

    #[test]
    fn test_extract_embedded_in_html() {
        let text = "<td>9.9.9.9:1080</td><td>elite</td>";
        let found = extract_proxies(text, "socks5");
        assert_eq!(found, vec!["socks5://9.9.9.9:1080".to_string()]);
    }

    #[test]
    fn test_extract_rejects_bare_ips() {
        assert!(extract_proxies("10.0.0.1 without port", "http").is_empty());
    }
}
