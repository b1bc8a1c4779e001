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

use axum::Extension;
use searchrs::config::settings::Settings;
use searchrs::domain::models::fetch::Strategy;
use searchrs::domain::search::target::SearchTarget;
use searchrs::engines::browser_engine::BrowserTransport;
use searchrs::engines::captcha::{CaptchaSolver, ChallengeWaitSolver};
use searchrs::engines::classifier::HeuristicClassifier;
use searchrs::engines::executor::{ExecutorConfig, StrategyExecutor};
use searchrs::engines::http_engine::HttpTransport;
use searchrs::engines::library_engine::LibraryTransport;
use searchrs::engines::mobile_engine::MobileTransport;
use searchrs::engines::traits::Transport;
use searchrs::infrastructure::cache::redis_client::RedisClient;
use searchrs::infrastructure::fingerprint::FingerprintGenerator;
use searchrs::infrastructure::proxy::health::{HealthLoopConfig, ProxyHealthMonitor};
use searchrs::infrastructure::proxy::pool::{AcquirePolicy, ProxyPool};
use searchrs::infrastructure::ratelimit::limiter::RateLimiter;
use searchrs::infrastructure::search::bing::BingTarget;
use searchrs::infrastructure::search::duckduckgo::DuckDuckGoTarget;
use searchrs::infrastructure::search::google::GoogleTarget;
use searchrs::infrastructure::search::orchestrator::{OrchestratorConfig, SearchOrchestrator};
use searchrs::infrastructure::search::yahoo::YahooTarget;
use searchrs::presentation::routes;
use searchrs::utils::telemetry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting searchrs...");

    // Initialize Prometheus Metrics
    searchrs::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Initialize Rate Limiter (distributed when Redis is configured)
    let rate_limiter = if settings.redis.enabled {
        match RedisClient::new(&settings.redis.url).await {
            Ok(redis) => {
                if let Err(e) = redis.ping().await {
                    warn!("Redis unreachable at startup ({}), limiter will degrade locally", e);
                }
                Arc::new(RateLimiter::distributed(
                    Arc::new(redis),
                    settings.default_bucket(),
                    settings.per_key_buckets(),
                ))
            }
            Err(e) => {
                warn!("Redis client init failed ({}), using local rate limiter", e);
                Arc::new(RateLimiter::local(
                    settings.default_bucket(),
                    settings.per_key_buckets(),
                ))
            }
        }
    } else {
        Arc::new(RateLimiter::local(
            settings.default_bucket(),
            settings.per_key_buckets(),
        ))
    };
    info!("Rate limiter initialized");

    // 4. Initialize Proxy Pool
    let proxy_pool = Arc::new(ProxyPool::new(settings.proxy_pool_config()));
    if settings.proxy.enabled {
        let sources = settings.proxy_sources();
        let added = proxy_pool.refill(sources.fetch_candidates().await);
        info!("Proxy pool initialized with {} candidates", added);

        ProxyHealthMonitor::new(
            proxy_pool.clone(),
            sources,
            HealthLoopConfig {
                check_interval: Duration::from_secs(settings.proxy.check_interval_secs),
                refill_interval: Duration::from_secs(settings.proxy.refill_interval_secs),
            },
        )
        .spawn();
        info!("Proxy health monitor started");
    }

    // 5. Initialize Transports and Executor
    let transports: HashMap<Strategy, Arc<dyn Transport>> = [
        (Strategy::Direct, Arc::new(HttpTransport) as Arc<dyn Transport>),
        (Strategy::MobileVariant, Arc::new(MobileTransport) as _),
        (
            Strategy::BrowserAutomation,
            Arc::new(BrowserTransport::new(Some(
                Arc::new(ChallengeWaitSolver::default()) as Arc<dyn CaptchaSolver>,
            ))) as _,
        ),
        (
            Strategy::LibraryFallback,
            Arc::new(LibraryTransport::new(settings.strategies.searxng_instances.clone())) as _,
        ),
    ]
    .into_iter()
    .collect();

    let executor = Arc::new(StrategyExecutor::new(
        transports,
        rate_limiter.clone(),
        proxy_pool.clone(),
        Arc::new(FingerprintGenerator::new(settings.search.fingerprint_rotate_after)),
        Arc::new(HeuristicClassifier::default()),
        ExecutorConfig {
            acquire_policy: AcquirePolicy::RoundRobin,
            retry_policy: settings.retry_policy(),
        },
    ));

    // 6. Initialize Search Orchestrator
    let registry: Vec<Arc<dyn SearchTarget>> = vec![
        Arc::new(GoogleTarget),
        Arc::new(DuckDuckGoTarget),
        Arc::new(BingTarget),
        Arc::new(YahooTarget),
    ];
    let targets: Vec<Arc<dyn SearchTarget>> = settings
        .search
        .targets
        .iter()
        .filter_map(|name| registry.iter().find(|t| t.name() == name.as_str()).cloned())
        .collect();

    let orchestrator = Arc::new(SearchOrchestrator::new(
        executor,
        targets,
        OrchestratorConfig {
            per_engine_timeout: Duration::from_secs(settings.search.per_engine_timeout_secs),
            sequential_target_timeout: Duration::from_secs(
                settings.search.sequential_target_timeout_secs,
            ),
            item_limit: settings.search.item_limit,
            strategies: settings.strategy_profiles(),
        },
    ));
    info!("Search orchestrator initialized");

    // 7. Start HTTP server
    let app = routes::routes()
        .layer(Extension(orchestrator))
        .layer(Extension(proxy_pool))
        .layer(Extension(rate_limiter))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
