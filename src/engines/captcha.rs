// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::Page;
use std::time::Duration;
use tracing::{debug, info};

/// 验证码处理接口
///
/// 仅浏览器自动化策略使用，可选组件。
/// detect对任意内容做轻量判定，solve在页面上下文内尝试通过质询
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 判定内容是否为质询页
    fn detect(&self, content: &str) -> bool;

    /// 在页面上尝试通过质询
    ///
    /// # 返回值
    ///
    /// 质询在超时前消失返回true
    async fn solve(&self, page: &Page, timeout: Duration) -> bool;
}

/// 等待式质询处理器
///
/// JS质询会在浏览器验证通过后自行消失，本实现轮询页面内容
/// 直到质询指示词消失或超时。不做图像识别
pub struct ChallengeWaitSolver {
    /// 轮询间隔
    poll_interval: Duration,
    indicators: Vec<&'static str>,
}

impl Default for ChallengeWaitSolver {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            indicators: vec![
                "cf-browser-verification",
                "checking your browser",
                "cf_chl_",
                "just a moment",
                "challenge-platform",
                "turnstile",
                "captcha",
            ],
        }
    }
}

#[async_trait]
impl CaptchaSolver for ChallengeWaitSolver {
    fn detect(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        self.indicators.iter().any(|i| lower.contains(i))
    }

    async fn solve(&self, page: &Page, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        info!("Challenge detected, waiting for browser verification to clear");
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.poll_interval).await;

            let content = match page.content().await {
                Ok(c) => c,
                Err(e) => {
                    debug!("Failed to read page content during challenge wait: {}", e);
                    return false;
                }
            };

            if !self.detect(&content) {
                info!("Challenge cleared");
                return true;
            }
        }

        debug!("Challenge did not clear within {:?}", timeout);
        false
    }
}
