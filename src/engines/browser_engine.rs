// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::engines::captcha::CaptchaSolver;
use crate::engines::traits::{FetchRequest, FetchResponse, Transport, TransportError};

// Global browser instance to avoid re-launching Chrome on every request.
// This significantly improves performance for browser-based scraping.
static BROWSER_INSTANCE: OnceCell<Browser> = OnceCell::const_new();

// Asynchronously gets or initializes the shared browser instance.
// This function ensures that the browser is launched only once.
pub async fn get_browser() -> Result<&'static Browser, TransportError> {
    BROWSER_INSTANCE
        .get_or_try_init(|| async {
            let remote_debugging_url = std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok();

            let (browser, mut handler) = if let Some(ref url) = remote_debugging_url {
                tracing::info!("Connecting to remote Chrome instance at: {}", url);
                Browser::connect(url).await.map_err(|e| {
                    TransportError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                })?
            } else {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(Duration::from_secs(30));

                builder = builder
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--disable-blink-features=AutomationControlled");

                Browser::launch(
                    builder
                        .build()
                        .map_err(|e| TransportError::Browser(e.to_string()))?,
                )
                .await
                .map_err(|e| TransportError::Browser(e.to_string()))?
            };

            // Spawn a handler to process browser events
            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(browser)
        })
        .await
}

/// 隐身脚本，覆盖webdriver等自动化痕迹
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
"#;

/// 浏览器自动化传输
///
/// 基于chromiumoxide实现的BrowserAutomation策略传输。
/// 共享一个浏览器进程，每次抓取在独立页面中进行；
/// 遇到质询页时交给CaptchaSolver等待/处理后重读内容
pub struct BrowserTransport {
    captcha_solver: Option<Arc<dyn CaptchaSolver>>,
    /// 质询处理预算
    challenge_timeout: Duration,
}

impl BrowserTransport {
    pub fn new(captcha_solver: Option<Arc<dyn CaptchaSolver>>) -> Self {
        Self {
            captcha_solver,
            challenge_timeout: Duration::from_secs(20),
        }
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    /// 执行浏览器自动化抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 渲染后的页面内容
    /// * `Err(TransportError)` - 抓取过程中出现的错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let start = Instant::now();

        // Wrap the entire operation in a timeout
        tokio::time::timeout(request.timeout, async {
            let browser = get_browser().await?;

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| TransportError::Browser(e.to_string()))?;

            if let Some(ua) = &request.user_agent {
                page.set_user_agent(ua.as_str())
                    .await
                    .map_err(|e| TransportError::Browser(e.to_string()))?;
            }

            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await
                .map_err(|e| TransportError::Browser(e.to_string()))?;

            // goto waits for the load event by default
            page.goto(request.url.as_str())
                .await
                .map_err(|e| TransportError::Browser(e.to_string()))?;

            let mut content = page
                .content()
                .await
                .map_err(|e| TransportError::Browser(e.to_string()))?;

            // Challenge pages clear themselves after browser verification;
            // hand the page to the solver and re-read on success.
            if let Some(solver) = &self.captcha_solver {
                if solver.detect(&content) && solver.solve(&page, self.challenge_timeout).await {
                    content = page
                        .content()
                        .await
                        .map_err(|e| TransportError::Browser(e.to_string()))?;
                }
            }

            let final_url = page.url().await.ok().flatten().unwrap_or_default();

            let _ = page.close().await;

            // chromiumoxide's goto does not expose the navigation status code;
            // a rendered document is treated as 200 and classified by content.
            Ok(FetchResponse::new(
                200,
                content,
                final_url,
                start.elapsed().as_millis() as u64,
            ))
        })
        .await
        .map_err(|_| TransportError::Timeout)?
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
