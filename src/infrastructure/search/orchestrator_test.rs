// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::models::fetch::Strategy;
use crate::domain::search::target::ParseError;
use crate::engines::classifier::HeuristicClassifier;
use crate::engines::executor::ExecutorConfig;
use crate::engines::traits::{FetchRequest, FetchResponse, Transport, TransportError};
use crate::infrastructure::fingerprint::FingerprintGenerator;
use crate::infrastructure::proxy::pool::{AcquirePolicy, ProxyPool, ProxyPoolConfig};
use crate::infrastructure::ratelimit::limiter::{BucketConfig, RateLimiter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// 按目标域名路由响应的测试传输
struct RoutedTransport {
    /// host片段 -> 响应体；缺省域名返回空白页
    bodies: HashMap<&'static str, String>,
    /// host片段 -> 人为延迟
    delays: HashMap<&'static str, Duration>,
    calls: Mutex<Vec<String>>,
}

impl RoutedTransport {
    fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_body(mut self, host: &'static str, body: String) -> Self {
        self.bodies.insert(host, body);
        self
    }

    fn with_delay(mut self, host: &'static str, delay: Duration) -> Self {
        self.delays.insert(host, delay);
        self
    }

    fn calls_for(&self, host: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(host))
            .count()
    }
}

#[async_trait]
impl Transport for RoutedTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.calls.lock().unwrap().push(request.url.clone());

        if let Some((_, delay)) = self.delays.iter().find(|(h, _)| request.url.contains(**h)) {
            tokio::time::sleep(*delay).await;
        }

        let body = self
            .bodies
            .iter()
            .find(|(h, _)| request.url.contains(**h))
            .map(|(_, b)| b.clone())
            .unwrap_or_else(|| padded("no entries here"));
        Ok(FetchResponse::new(200, body, request.url.clone(), 5))
    }

    fn name(&self) -> &'static str {
        "routed"
    }
}

struct NamedTarget(&'static str);

impl SearchTarget for NamedTarget {
    fn name(&self) -> &'static str {
        self.0
    }

    fn rate_key(&self) -> &'static str {
        self.0
    }

    fn search_url(&self, query: &str, _limit: u32) -> String {
        format!("https://{}.test/search?q={}", self.0, query)
    }

    fn parse(&self, body: &str) -> Result<Vec<SearchItem>, ParseError> {
        if body.contains("layout-drift") {
            return Err(ParseError::SelectorMismatch);
        }
        Ok(body
            .lines()
            .filter_map(|line| line.trim().strip_prefix("item:"))
            .map(|url| SearchItem::new("t".to_string(), url.to_string(), None, self.0.to_string()))
            .collect())
    }
}

fn padded(content: &str) -> String {
    format!("<html><body>{}{}</body></html>", content, "x".repeat(200))
}

fn body_with_items(urls: &[&str]) -> String {
    let lines: String = urls.iter().map(|u| format!("item:{}\n", u)).collect();
    padded(&lines)
}

fn orchestrator_with(
    transport: Arc<RoutedTransport>,
    targets: Vec<Arc<dyn SearchTarget>>,
) -> SearchOrchestrator {
    let mut retry_policy = crate::utils::retry_policy::RetryPolicy::standard();
    retry_policy.max_retries = 0;

    let executor = Arc::new(StrategyExecutor::new(
        [(Strategy::Direct, transport as Arc<dyn Transport>)]
            .into_iter()
            .collect(),
        Arc::new(RateLimiter::local(
            BucketConfig {
                capacity: 10_000,
                refill_per_second: 10_000.0,
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

    let config = OrchestratorConfig {
        per_engine_timeout: Duration::from_secs(5),
        sequential_target_timeout: Duration::from_secs(5),
        item_limit: 10,
        strategies: vec![StrategyProfile::new(Strategy::Direct, Duration::from_secs(4))],
    };
    SearchOrchestrator::new(executor, targets, config)
}

fn three_targets() -> Vec<Arc<dyn SearchTarget>> {
    vec![
        Arc::new(NamedTarget("google")),
        Arc::new(NamedTarget("duckduckgo")),
        Arc::new(NamedTarget("yahoo")),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_sequential_fallback_stops_at_first_hit() {
    let transport = Arc::new(
        RoutedTransport::new()
            .with_body("google.test", body_with_items(&[]))
            .with_body(
                "duckduckgo.test",
                body_with_items(&[
                    "https://a.example/",
                    "https://b.example/",
                    "https://c.example/",
                ]),
            ),
    );
    let orchestrator = orchestrator_with(transport.clone(), three_targets());

    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    // google empty -> fallback; duckduckgo hits -> yahoo never invoked
    assert_eq!(result.per_target.len(), 2);
    assert!(!result.per_target[0].success);
    assert_eq!(
        result.per_target[0].error_type,
        Some(FailureKind::NoResults)
    );
    assert!(result.per_target[1].success);
    assert_eq!(result.items.len(), 3);
    assert_eq!(transport.calls_for("yahoo.test"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_all_exhausted_reports_failure() {
    let transport = Arc::new(RoutedTransport::new());
    let orchestrator = orchestrator_with(transport, three_targets());

    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 0);
    assert_eq!(result.failed_count, 3);
    assert!(result.items.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fanout_bounded_by_timeout_not_hang() {
    let transport = Arc::new(
        RoutedTransport::new()
            .with_body(
                "google.test",
                body_with_items(&[
                    "https://1.example/",
                    "https://2.example/",
                    "https://3.example/",
                    "https://4.example/",
                    "https://5.example/",
                ]),
            )
            // duckduckgo hangs far beyond the per-engine timeout
            .with_delay("duckduckgo.test", Duration::from_secs(3600))
            .with_body("yahoo.test", body_with_items(&[])),
    );
    let orchestrator = orchestrator_with(transport, three_targets());

    let started = Instant::now();
    let result = orchestrator
        .search("rust", SearchMode::Concurrent, &[], Some(Duration::from_secs(5)))
        .await;
    let elapsed = started.elapsed();

    // Bounded by the timeout, not the hang duration
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(10), "elapsed {:?}", elapsed);

    assert_eq!(result.succeeded_count, 1);
    assert_eq!(result.failed_count, 2);

    let by_engine: HashMap<_, _> = result
        .per_target
        .iter()
        .map(|r| (r.engine.as_str(), r))
        .collect();
    assert!(by_engine["google"].success);
    assert_eq!(by_engine["duckduckgo"].error_type, Some(FailureKind::Timeout));
    assert_eq!(by_engine["yahoo"].error_type, Some(FailureKind::NoResults));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_merge_dedups_first_wins() {
    let transport = Arc::new(
        RoutedTransport::new()
            .with_body(
                "google.test",
                body_with_items(&["https://shared.example/", "https://only-g.example/"]),
            )
            .with_body(
                "duckduckgo.test",
                body_with_items(&["https://SHARED.example/", "https://only-d.example/"]),
            ),
    );
    let targets: Vec<Arc<dyn SearchTarget>> = vec![
        Arc::new(NamedTarget("google")),
        Arc::new(NamedTarget("duckduckgo")),
    ];
    let orchestrator = orchestrator_with(transport, targets);

    let result = orchestrator
        .search("rust", SearchMode::Concurrent, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 2);
    assert_eq!(result.items.len(), 3);
    // The shared URL kept the first target's version
    let shared = result
        .items
        .iter()
        .find(|i| i.url.to_lowercase().contains("shared"))
        .unwrap();
    assert_eq!(shared.engine, "google");
}

#[tokio::test(start_paused = true)]
async fn test_selector_mismatch_surfaces_as_failure() {
    let transport = Arc::new(
        RoutedTransport::new().with_body("google.test", padded("layout-drift markup")),
    );
    let orchestrator =
        orchestrator_with(transport, vec![Arc::new(NamedTarget("google")) as _]);

    let result = orchestrator
        .search("rust", SearchMode::Sequential, &[], None)
        .await;

    assert_eq!(result.succeeded_count, 0);
    assert_eq!(
        result.per_target[0].error_type,
        Some(FailureKind::SelectorMismatch)
    );
}

#[tokio::test(start_paused = true)]
async fn test_target_subset_selection() {
    let transport = Arc::new(RoutedTransport::new().with_body(
        "yahoo.test",
        body_with_items(&["https://y.example/"]),
    ));
    let orchestrator = orchestrator_with(transport.clone(), three_targets());

    let result = orchestrator
        .search(
            "rust",
            SearchMode::Concurrent,
            &["yahoo".to_string(), "nonexistent".to_string()],
            None,
        )
        .await;

    assert_eq!(result.per_target.len(), 1);
    assert_eq!(result.per_target[0].engine, "yahoo");
    assert_eq!(transport.calls_for("google.test"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stats_accumulate_per_engine() {
    let transport = Arc::new(RoutedTransport::new().with_body(
        "google.test",
        body_with_items(&["https://a.example/"]),
    ));
    let orchestrator = orchestrator_with(
        transport,
        vec![
            Arc::new(NamedTarget("google")) as _,
            Arc::new(NamedTarget("yahoo")) as _,
        ],
    );

    orchestrator
        .search("rust", SearchMode::Concurrent, &[], None)
        .await;

    let stats = orchestrator.stats_snapshot();
    assert_eq!(stats["google"].successes, 1);
    assert_eq!(stats["yahoo"].failures, 1);
}
