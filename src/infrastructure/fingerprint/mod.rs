// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 指纹生成模块
///
/// 产出随机化的出站身份（请求头、User-Agent、语言、视口），
/// 同一身份复用若干次后轮换，降低指纹可关联性
pub mod user_agents;

use parking_lot::Mutex;
use rand::prelude::IndexedRandom;
use std::collections::HashMap;

/// 屏幕分辨率候选
const SCREEN_RESOLUTIONS: &[(u32, u32)] = &[
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (1280, 720),
    (2560, 1440),
    (1600, 900),
    (1680, 1050),
];

/// Accept-Language候选
const LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en;q=0.9",
    "en-US,en;q=0.8",
    "en-AU,en;q=0.9,en-US;q=0.8",
];

/// Chrome主版本候选（用于Sec-CH-UA）
const CHROME_VERSIONS: &[&str] = &["124", "123", "122", "121", "120"];

const PLATFORMS: &[&str] = &["Win32", "MacIntel", "Linux x86_64"];

/// 一套出站身份
#[derive(Debug, Clone)]
pub struct FingerprintSet {
    /// 身份编号，随轮换递增
    pub id: u64,
    pub user_agent: String,
    pub accept_language: String,
    /// 视口 (宽, 高)
    pub viewport: (u32, u32),
    /// 完整请求头
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct Identity {
    id: u64,
    user_agent: String,
    accept_language: String,
    viewport: (u32, u32),
    chrome_version: String,
    platform: String,
}

struct GeneratorState {
    current: Identity,
    calls_since_rotation: u32,
    next_id: u64,
}

/// 指纹生成器
///
/// 除轮换计数器外无副作用；身份在`rotate_after`次调用后轮换，
/// 失败路径可通过`force_rotate`立即轮换以切断指纹关联。
/// 每个编排器实例持有自己的生成器，不是进程级单例
pub struct FingerprintGenerator {
    rotate_after: u32,
    state: Mutex<GeneratorState>,
}

impl FingerprintGenerator {
    pub fn new(rotate_after: u32) -> Self {
        let first = Self::generate_identity(1);
        Self {
            rotate_after: rotate_after.max(1),
            state: Mutex::new(GeneratorState {
                current: first,
                calls_since_rotation: 0,
                next_id: 2,
            }),
        }
    }

    fn generate_identity(id: u64) -> Identity {
        let mut rng = rand::rng();
        let viewport = *SCREEN_RESOLUTIONS
            .choose(&mut rng)
            .unwrap_or(&SCREEN_RESOLUTIONS[0]);
        Identity {
            id,
            user_agent: user_agents::random_desktop(&mut rng).to_string(),
            accept_language: LANGUAGES.choose(&mut rng).unwrap_or(&LANGUAGES[0]).to_string(),
            viewport,
            chrome_version: CHROME_VERSIONS
                .choose(&mut rng)
                .unwrap_or(&CHROME_VERSIONS[0])
                .to_string(),
            platform: PLATFORMS.choose(&mut rng).unwrap_or(&PLATFORMS[0]).to_string(),
        }
    }

    fn build_set(identity: &Identity, user_agent: String) -> FingerprintSet {
        let mut headers = HashMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        );
        headers.insert(
            "Accept-Language".to_string(),
            identity.accept_language.clone(),
        );
        // Accept-Encoding留给HTTP客户端协商，手动设置会跳过自动解压
        headers.insert("DNT".to_string(), "1".to_string());
        headers.insert("Connection".to_string(), "keep-alive".to_string());
        headers.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());

        // Chrome身份补充客户端提示头
        if user_agent.contains("Chrome") {
            headers.insert(
                "Sec-Ch-Ua".to_string(),
                format!(
                    "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{v}\", \"Google Chrome\";v=\"{v}\"",
                    v = identity.chrome_version
                ),
            );
            headers.insert("Sec-Ch-Ua-Mobile".to_string(), "?0".to_string());
            headers.insert(
                "Sec-Ch-Ua-Platform".to_string(),
                format!("\"{}\"", identity.platform),
            );
            headers.insert("Sec-Fetch-Dest".to_string(), "document".to_string());
            headers.insert("Sec-Fetch-Mode".to_string(), "navigate".to_string());
            headers.insert("Sec-Fetch-Site".to_string(), "none".to_string());
            headers.insert("Sec-Fetch-User".to_string(), "?1".to_string());
        }

        FingerprintSet {
            id: identity.id,
            user_agent,
            accept_language: identity.accept_language.clone(),
            viewport: identity.viewport,
            headers,
        }
    }

    /// 产出当前身份，必要时先轮换
    pub fn next(&self) -> FingerprintSet {
        let mut state = self.state.lock();
        if state.calls_since_rotation >= self.rotate_after {
            let id = state.next_id;
            state.current = Self::generate_identity(id);
            state.next_id += 1;
            state.calls_since_rotation = 0;
        }
        state.calls_since_rotation += 1;
        let ua = state.current.user_agent.clone();
        Self::build_set(&state.current, ua)
    }

    /// 产出移动端身份，共享当前身份的其他轴
    pub fn next_mobile(&self) -> FingerprintSet {
        let set = self.next();
        let mut rng = rand::rng();
        let mobile_ua = user_agents::random_mobile(&mut rng).to_string();
        let state = self.state.lock();
        let mut mobile_set = Self::build_set(&state.current, mobile_ua);
        mobile_set.headers.insert("Sec-Ch-Ua-Mobile".to_string(), "?1".to_string());
        mobile_set.id = set.id;
        mobile_set
    }

    /// 立即轮换身份
    ///
    /// 被封锁的路径调用此方法，避免下一次请求复用可疑指纹
    pub fn force_rotate(&self) {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.current = Self::generate_identity(id);
        state.next_id += 1;
        state.calls_since_rotation = 0;
    }
}
