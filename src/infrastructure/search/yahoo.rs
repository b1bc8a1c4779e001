// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::models::search_result::SearchItem;
use crate::domain::search::target::{ParseError, SearchTarget};

/// Yahoo 搜索目标
///
/// 结果链接经过 r.search.yahoo.com 重定向，真实URL藏在 /RU= 段里
pub struct YahooTarget;

const RESULT_SELECTORS: &[&str] = &["div.algo-sr", "div.dd.algo", "li.ov-a", "div[class*='algo']"];

static RU_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/RU=([^/]+)/").expect("valid RU pattern"));

/// 从Yahoo重定向URL中提取真实URL
fn extract_real_url(yahoo_url: &str) -> String {
    if yahoo_url.contains("r.search.yahoo.com") || yahoo_url.contains("/RU=") {
        if let Some(captures) = RU_PATTERN.captures(yahoo_url) {
            if let Some(encoded) = captures.get(1) {
                if let Ok(decoded) = urlencoding::decode(encoded.as_str()) {
                    return decoded.into_owned();
                }
            }
        }
    }
    yahoo_url.to_string()
}

impl YahooTarget {
    fn extract_item(element: &ElementRef) -> Option<SearchItem> {
        let title_elem = ["h3.title a", "a.ac-algo", "h3 a", "a[href]"]
            .iter()
            .find_map(|s| {
                let selector = Selector::parse(s).ok()?;
                element.select(&selector).next()
            })?;

        let title = title_elem.text().collect::<String>().trim().to_string();
        let url = extract_real_url(title_elem.value().attr("href")?);

        // 跳过Yahoo内部链接
        if title.is_empty() || !url.starts_with("http") || url.contains("yahoo.com") {
            return None;
        }

        let snippet = ["div.compText", "p.fz-ms", "p"].iter().find_map(|s| {
            let selector = Selector::parse(s).ok()?;
            let node = element.select(&selector).next()?;
            let text = node.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        });

        Some(SearchItem::new(title, url, snippet, "yahoo".to_string()))
    }
}

impl SearchTarget for YahooTarget {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn rate_key(&self) -> &'static str {
        "yahoo"
    }

    fn search_url(&self, query: &str, limit: u32) -> String {
        format!(
            "https://search.yahoo.com/search?p={}&n={}",
            urlencoding::encode(query),
            limit
        )
    }

    fn parse(&self, body: &str) -> Result<Vec<SearchItem>, ParseError> {
        let document = Html::parse_document(body);

        for selector_str in RESULT_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let elements: Vec<ElementRef> = document.select(&selector).collect();
            if elements.is_empty() {
                continue;
            }
            return Ok(elements.iter().filter_map(Self::extract_item).collect());
        }

        Err(ParseError::SelectorMismatch)
    }
}
