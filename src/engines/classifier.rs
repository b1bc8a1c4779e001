// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 页面分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 正常内容
    Clean,
    /// 封锁页（含非2xx的拦截页）
    Blocked,
    /// 验证码/人机质询页
    Captcha,
}

/// 页面分类器
///
/// 判定响应体是封锁页、质询页还是正常内容。
/// 各目标的封锁页形态不一致且随时间漂移，因此做成可插拔组件，
/// 默认实现的启发式规则不视为权威
pub trait Classifier: Send + Sync {
    fn classify(&self, status_code: u16, body: &str) -> Classification;
}

/// 启发式分类器
///
/// 基于指示词与最小长度的判定：质询词优先于封锁词，
/// 过短的响应体按封锁页处理
pub struct HeuristicClassifier {
    captcha_indicators: Vec<String>,
    block_indicators: Vec<String>,
    /// 小于该长度的响应体视为封锁页
    min_body_len: usize,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            captcha_indicators: [
                "captcha",
                "recaptcha",
                "please verify",
                "checking your browser",
                "just a moment",
                "cf-browser-verification",
                "challenge-platform",
                "turnstile",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            block_indicators: [
                "unusual traffic",
                "detected unusual traffic",
                "automated requests",
                "access denied",
                "bot detected",
                "sorry/index",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_body_len: 100,
        }
    }
}

impl HeuristicClassifier {
    /// 追加自定义指示词（来自配置）
    pub fn with_extra_indicators(mut self, captcha: Vec<String>, block: Vec<String>) -> Self {
        self.captcha_indicators
            .extend(captcha.into_iter().map(|s| s.to_lowercase()));
        self.block_indicators
            .extend(block.into_iter().map(|s| s.to_lowercase()));
        self
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, status_code: u16, body: &str) -> Classification {
        let lower = body.to_lowercase();

        // 质询词优先：质询页常同时含有封锁词
        if self.captcha_indicators.iter().any(|i| lower.contains(i)) {
            return Classification::Captcha;
        }
        if self.block_indicators.iter().any(|i| lower.contains(i)) {
            return Classification::Blocked;
        }
        if !(200..300).contains(&status_code) {
            return Classification::Blocked;
        }
        if body.len() < self.min_body_len {
            return Classification::Blocked;
        }
        Classification::Clean
    }
}
