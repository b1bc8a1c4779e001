// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 归一化URL用于跨引擎去重
///
/// 同一结果在不同引擎会带不同的大小写主机名、fragment和尾部斜杠；
/// 归一化后字符串相等即视为同一结果。无法解析的输入原样返回
pub fn normalize_for_dedup(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.trim().to_string();
    };

    url.set_fragment(None);

    let path = url.path().to_string();
    if path.ends_with('/') && path.len() > 1 {
        url.set_path(path.trim_end_matches('/'));
    }

    // host与scheme在Url内部已小写，默认端口在解析时已剥离
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "http://t.co/c").unwrap().as_str(),
            "http://t.co/c"
        );
    }

    #[test]
    fn test_resolve_root_relative_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "/c").unwrap().as_str(),
            "http://example.com/c"
        );
    }

    #[test]
    fn test_normalize_strips_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_for_dedup("https://Example.com/Path/#section"),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_normalize_drops_default_port() {
        assert_eq!(
            normalize_for_dedup("https://example.com:443/a"),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_for_dedup("http://example.com:8080/a"),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn test_normalize_equates_engine_variants() {
        let a = normalize_for_dedup("https://docs.rs/tokio/");
        let b = normalize_for_dedup("https://DOCS.RS/tokio");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_unparseable_passthrough() {
        assert_eq!(normalize_for_dedup("  not a url "), "not a url");
    }
}
