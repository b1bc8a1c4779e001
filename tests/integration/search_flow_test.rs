// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 端到端搜索流程测试
//!
//! 真实HTTP栈（reqwest传输）打到wiremock，验证从编排器到解析的完整链路

use searchrs::domain::models::fetch::{AttemptOutcome, FailureKind, Strategy, StrategyProfile};
use searchrs::domain::models::search_result::{SearchItem, SearchMode};
use searchrs::domain::search::target::{ParseError, SearchTarget};
use searchrs::engines::classifier::HeuristicClassifier;
use searchrs::engines::executor::{ExecutorConfig, StrategyExecutor};
use searchrs::engines::http_engine::HttpTransport;
use searchrs::engines::traits::Transport;
use searchrs::infrastructure::fingerprint::FingerprintGenerator;
use searchrs::infrastructure::proxy::pool::{AcquirePolicy, ProxyPool, ProxyPoolConfig};
use searchrs::infrastructure::ratelimit::limiter::{BucketConfig, RateLimiter};
use searchrs::infrastructure::search::google::GoogleTarget;
use searchrs::infrastructure::search::orchestrator::{OrchestratorConfig, SearchOrchestrator};
use searchrs::utils::retry_policy::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOGLE_STYLE_HTML: &str = r#"
<html><body><div id="search">
  <div class="g">
    <div class="yuRUbf"><a href="https://www.rust-lang.org/"><h3>Rust</h3></a></div>
    <div class="VwiC3b">A language empowering everyone to build reliable software.</div>
  </div>
  <div class="g">
    <div class="yuRUbf"><a href="https://tokio.rs/"><h3>Tokio</h3></a></div>
    <div class="VwiC3b">An asynchronous runtime for Rust.</div>
  </div>
</div></body></html>
"#;

/// 指向wiremock的测试目标，解析逻辑复用Google实现
struct LocalTarget {
    base: String,
}

impl SearchTarget for LocalTarget {
    fn name(&self) -> &'static str {
        "google"
    }

    fn rate_key(&self) -> &'static str {
        "google"
    }

    fn search_url(&self, query: &str, _limit: u32) -> String {
        format!("{}/search?q={}", self.base, urlencoding::encode(query))
    }

    fn parse(&self, body: &str) -> Result<Vec<SearchItem>, ParseError> {
        GoogleTarget.parse(body)
    }
}

fn build_orchestrator(server_uri: &str) -> SearchOrchestrator {
    let mut retry_policy = RetryPolicy::standard();
    retry_policy.max_retries = 1;
    retry_policy.initial_backoff = Duration::from_millis(10);

    let executor = Arc::new(StrategyExecutor::new(
        [(Strategy::Direct, Arc::new(HttpTransport) as Arc<dyn Transport>)]
            .into_iter()
            .collect(),
        Arc::new(RateLimiter::local(
            BucketConfig {
                capacity: 1000,
                refill_per_second: 1000.0,
            },
            HashMap::new(),
        )),
        Arc::new(ProxyPool::new(ProxyPoolConfig::default())),
        Arc::new(FingerprintGenerator::new(50)),
        Arc::new(HeuristicClassifier::default()),
        ExecutorConfig {
            acquire_policy: AcquirePolicy::RoundRobin,
            retry_policy,
        },
    ));

    SearchOrchestrator::new(
        executor,
        vec![Arc::new(LocalTarget {
            base: server_uri.to_string(),
        })],
        OrchestratorConfig {
            per_engine_timeout: Duration::from_secs(10),
            sequential_target_timeout: Duration::from_secs(10),
            item_limit: 10,
            strategies: vec![StrategyProfile::new(Strategy::Direct, Duration::from_secs(5))],
        },
    )
}

#[tokio::test]
async fn test_sequential_search_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GOOGLE_STYLE_HTML))
        .mount(&server)
        .await;

    let orchestrator = build_orchestrator(&server.uri());
    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 1);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].url, "https://www.rust-lang.org/");
    assert_eq!(result.per_target[0].engine, "google");
    assert!(result.per_target[0].success);
}

#[tokio::test]
async fn test_block_page_surfaces_as_exhausted_with_trace() {
    let server = MockServer::start().await;
    let body = format!(
        "<html><body>Our systems have detected unusual traffic {}</body></html>",
        "x".repeat(300)
    );
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let orchestrator = build_orchestrator(&server.uri());
    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 0);
    let report = &result.per_target[0];
    assert_eq!(report.error_type, Some(FailureKind::AllStrategiesExhausted));
    // Soft-fail plus one retry, both classified as Blocked
    assert_eq!(report.attempts.len(), 2);
    assert!(report.attempts.iter().all(|a| matches!(
        a.outcome,
        AttemptOutcome::SoftFail {
            reason: FailureKind::Blocked
        }
    )));
}

#[tokio::test]
async fn test_http_200_with_zero_items_is_not_success() {
    let server = MockServer::start().await;
    // A well-formed page whose containers hold no extractable results
    let body = format!(
        "<html><body><div class=\"g\"><span>sponsored</span></div>{}</body></html>",
        "x".repeat(300)
    );
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let orchestrator = build_orchestrator(&server.uri());
    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    let report = &result.per_target[0];
    assert!(!report.success);
    assert_eq!(report.error_type, Some(FailureKind::NoResults));
}

#[tokio::test]
async fn test_server_error_classified_blocked_then_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let orchestrator = build_orchestrator(&server.uri());
    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 0);
    assert_eq!(
        result.per_target[0].error_type,
        Some(FailureKind::AllStrategiesExhausted)
    );
}

#[tokio::test]
async fn test_fingerprint_headers_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(wiremock::matchers::header_exists("accept-language"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GOOGLE_STYLE_HTML))
        .mount(&server)
        .await;

    let orchestrator = build_orchestrator(&server.uri());
    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    // The mock only matches when the fingerprint headers were actually sent
    assert_eq!(result.succeeded_count, 1);
}
