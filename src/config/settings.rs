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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::models::fetch::{Strategy, StrategyProfile};
use crate::infrastructure::proxy::pool::ProxyPoolConfig;
use crate::infrastructure::proxy::sources::ProxySources;
use crate::infrastructure::ratelimit::limiter::BucketConfig;
use crate::utils::retry_policy::RetryPolicy;

/// 应用程序配置设置
///
/// 包含服务器、Redis、代理、限流、重试、策略与搜索等所有配置项。
/// 配置在构造期一次性下发为不可变结构，不使用全局量
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 代理配置
    pub proxy: ProxySettings,
    /// 速率限制配置
    pub rate_limiting: RateLimitingSettings,
    /// 重试配置
    pub retry: RetrySettings,
    /// 策略配置
    pub strategies: StrategySettings,
    /// 搜索配置
    pub search: SearchSettings,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// Redis配置设置
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// 是否启用分布式限流
    pub enabled: bool,
    /// Redis连接URL
    pub url: String,
}

/// 代理配置设置
#[derive(Debug, Deserialize)]
pub struct ProxySettings {
    /// 是否启用代理
    pub enabled: bool,
    /// 静态代理列表（可带凭证）
    pub static_proxies: Vec<String>,
    /// HTTP代理来源URL（空则使用内置来源）
    pub http_sources: Vec<String>,
    /// SOCKS5代理来源URL（空则使用内置来源）
    pub socks_sources: Vec<String>,
    /// 连续失败阈值
    pub failure_threshold: u32,
    /// 池容量上限
    pub max_proxies: usize,
    /// 探测URL
    pub probe_url: String,
    /// 单次探测超时（秒）
    pub probe_timeout_secs: u64,
    /// 每轮探测数量上限
    pub probe_batch: usize,
    /// 探测并发上限
    pub probe_concurrency: usize,
    /// 可用量下限（触发补充）
    pub min_alive: usize,
    /// 探测轮询间隔（秒）
    pub check_interval_secs: u64,
    /// 来源补充间隔（秒）
    pub refill_interval_secs: u64,
}

/// 单桶参数
#[derive(Debug, Clone, Deserialize)]
pub struct BucketSettings {
    pub capacity: u32,
    pub refill_per_second: f64,
}

/// 速率限制配置设置
#[derive(Debug, Deserialize)]
pub struct RateLimitingSettings {
    /// 默认桶容量
    pub default_capacity: u32,
    /// 默认每秒补充令牌数
    pub default_refill_per_second: f64,
    /// 按键覆盖（键为目标的rate_key）
    #[serde(default)]
    pub per_key: HashMap<String, BucketSettings>,
}

/// 重试配置设置
#[derive(Debug, Deserialize)]
pub struct RetrySettings {
    /// 单策略软失败重试次数
    pub max_retries: u32,
    /// 初始退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 最大退避（毫秒）
    pub max_backoff_ms: u64,
}

/// 策略配置设置
#[derive(Debug, Deserialize)]
pub struct StrategySettings {
    /// 启用的策略，按降级顺序
    pub order: Vec<String>,
    /// 直连策略超时（秒）
    pub direct_timeout_secs: u64,
    /// 移动端策略超时（秒）
    pub mobile_timeout_secs: u64,
    /// 浏览器策略超时（秒）
    pub browser_timeout_secs: u64,
    /// 库级策略超时（秒）
    pub library_timeout_secs: u64,
    /// SearXNG实例列表（库级策略）
    pub searxng_instances: Vec<String>,
}

/// 搜索配置设置
#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    /// 已注册目标的优先顺序
    pub targets: Vec<String>,
    /// 并发扇出单目标超时（秒）
    pub per_engine_timeout_secs: u64,
    /// 顺序降级单目标超时（秒）
    pub sequential_target_timeout_secs: u64,
    /// 单次搜索条目数
    pub item_limit: u32,
    /// 指纹轮换周期（调用次数）
    pub fingerprint_rotate_after: u32,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从默认值、配置文件和环境变量逐层加载
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            // Redis defaults
            .set_default("redis.enabled", false)?
            .set_default("redis.url", "redis://127.0.0.1:6379/0")?
            // Proxy defaults
            .set_default("proxy.enabled", true)?
            .set_default("proxy.static_proxies", Vec::<String>::new())?
            .set_default("proxy.http_sources", Vec::<String>::new())?
            .set_default("proxy.socks_sources", Vec::<String>::new())?
            .set_default("proxy.failure_threshold", 3)?
            .set_default("proxy.max_proxies", 500)?
            .set_default("proxy.probe_url", "https://api.ipify.org?format=json")?
            .set_default("proxy.probe_timeout_secs", 10)?
            .set_default("proxy.probe_batch", 30)?
            .set_default("proxy.probe_concurrency", 10)?
            .set_default("proxy.min_alive", 20)?
            .set_default("proxy.check_interval_secs", 180)?
            .set_default("proxy.refill_interval_secs", 600)?
            // Rate limiting defaults (per target-class buckets)
            .set_default("rate_limiting.default_capacity", 60)?
            .set_default("rate_limiting.default_refill_per_second", 1.0)?
            // Retry defaults
            .set_default("retry.max_retries", 2)?
            .set_default("retry.initial_backoff_ms", 500)?
            .set_default("retry.max_backoff_ms", 10_000)?
            // Strategy defaults
            .set_default(
                "strategies.order",
                vec!["direct", "mobile_variant", "browser_automation", "library_fallback"],
            )?
            .set_default("strategies.direct_timeout_secs", 15)?
            .set_default("strategies.mobile_timeout_secs", 15)?
            .set_default("strategies.browser_timeout_secs", 25)?
            .set_default("strategies.library_timeout_secs", 15)?
            .set_default(
                "strategies.searxng_instances",
                vec!["https://searx.be", "https://searx.tiekoetter.com"],
            )?
            // Search defaults
            .set_default(
                "search.targets",
                vec!["google", "duckduckgo", "bing", "yahoo"],
            )?
            .set_default("search.per_engine_timeout_secs", 30)?
            .set_default("search.sequential_target_timeout_secs", 30)?
            .set_default("search.item_limit", 10)?
            .set_default("search.fingerprint_rotate_after", 50)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SEARCHRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 代理池配置
    pub fn proxy_pool_config(&self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            failure_threshold: self.proxy.failure_threshold,
            max_proxies: self.proxy.max_proxies,
            probe_url: self.proxy.probe_url.clone(),
            probe_timeout: Duration::from_secs(self.proxy.probe_timeout_secs),
            probe_batch: self.proxy.probe_batch,
            probe_concurrency: self.proxy.probe_concurrency,
            min_alive: self.proxy.min_alive,
        }
    }

    /// 代理来源配置，空列表回落到内置来源
    pub fn proxy_sources(&self) -> ProxySources {
        let defaults = ProxySources::default();
        ProxySources {
            http_sources: if self.proxy.http_sources.is_empty() {
                defaults.http_sources
            } else {
                self.proxy.http_sources.clone()
            },
            socks_sources: if self.proxy.socks_sources.is_empty() {
                defaults.socks_sources
            } else {
                self.proxy.socks_sources.clone()
            },
            static_proxies: self.proxy.static_proxies.clone(),
            fetch_timeout: defaults.fetch_timeout,
        }
    }

    /// 默认桶配置
    pub fn default_bucket(&self) -> BucketConfig {
        BucketConfig {
            capacity: self.rate_limiting.default_capacity,
            refill_per_second: self.rate_limiting.default_refill_per_second,
        }
    }

    /// 按键桶配置
    pub fn per_key_buckets(&self) -> HashMap<String, BucketConfig> {
        self.rate_limiting
            .per_key
            .iter()
            .map(|(key, b)| {
                (
                    key.clone(),
                    BucketConfig {
                        capacity: b.capacity,
                        refill_per_second: b.refill_per_second,
                    },
                )
            })
            .collect()
    }

    /// 重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            ..RetryPolicy::standard()
        }
    }

    /// 按配置顺序构造策略链
    pub fn strategy_profiles(&self) -> Vec<StrategyProfile> {
        self.strategies
            .order
            .iter()
            .filter_map(|name| {
                let (strategy, timeout_secs) = match name.as_str() {
                    "direct" => (Strategy::Direct, self.strategies.direct_timeout_secs),
                    "mobile_variant" => {
                        (Strategy::MobileVariant, self.strategies.mobile_timeout_secs)
                    }
                    "browser_automation" => (
                        Strategy::BrowserAutomation,
                        self.strategies.browser_timeout_secs,
                    ),
                    "library_fallback" => {
                        (Strategy::LibraryFallback, self.strategies.library_timeout_secs)
                    }
                    _ => return None,
                };
                Some(StrategyProfile::new(strategy, Duration::from_secs(timeout_secs)))
            })
            .collect()
    }
}
