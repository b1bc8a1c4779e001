// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};

use crate::domain::models::search_result::SearchItem;
use crate::domain::search::target::{ParseError, SearchTarget};

/// Google 搜索目标
///
/// Google 频繁更换结果容器的class，解析按选择器链逐个回退；
/// 全链落空视为布局漂移（SelectorMismatch）而非空结果
pub struct GoogleTarget;

/// 结果容器选择器链（新版优先，旧版兜底）
const RESULT_SELECTORS: &[&str] = &[
    "div.g",
    "div[data-hveid]",
    "div.tF2Cxc",
    "div.yuRUbf",
    "div.N54PNb",
    "div.rc",
];

const TITLE_SELECTORS: &[&str] = &["h3", "div[role='heading']", ".DKV0Md", ".LC20lb"];

const SNIPPET_SELECTORS: &[&str] = &["div.VwiC3b", "div[data-sncf]", "span.aCOpRe", ".lEBKkf"];

impl GoogleTarget {
    fn extract_item(element: &ElementRef) -> Option<SearchItem> {
        let title = TITLE_SELECTORS.iter().find_map(|s| {
            let selector = Selector::parse(s).ok()?;
            let node = element.select(&selector).next()?;
            let text = node.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        })?;

        let link_selector = Selector::parse("a[href]").ok()?;
        let url = element.select(&link_selector).find_map(|a| {
            let href = a.value().attr("href")?;
            // 跳过站内链接与重定向入口
            if !href.starts_with("http") || href.contains("google.") {
                return None;
            }
            Some(href.to_string())
        })?;

        let snippet = SNIPPET_SELECTORS.iter().find_map(|s| {
            let selector = Selector::parse(s).ok()?;
            let node = element.select(&selector).next()?;
            let text = node.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        });

        Some(SearchItem::new(title, url, snippet, "google".to_string()))
    }
}

impl SearchTarget for GoogleTarget {
    fn name(&self) -> &'static str {
        "google"
    }

    fn rate_key(&self) -> &'static str {
        "google"
    }

    fn search_url(&self, query: &str, limit: u32) -> String {
        // pws=0 关闭个性化，filter=0 关闭结果折叠
        format!(
            "https://www.google.com/search?q={}&num={}&hl=en&ie=UTF-8&oe=UTF-8&pws=0&filter=0",
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

            let mut items = Vec::new();
            for element in &elements {
                if let Some(item) = Self::extract_item(element) {
                    // 同一结果常被多个容器嵌套命中
                    if !items.iter().any(|i: &SearchItem| i.url == item.url) {
                        items.push(item);
                    }
                }
            }
            return Ok(items);
        }

        Err(ParseError::SelectorMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
          <div id="search">
            <div class="g">
              <div class="yuRUbf"><a href="https://www.rust-lang.org/"><h3>Rust Programming Language</h3></a></div>
              <div class="VwiC3b">A language empowering everyone.</div>
            </div>
            <div class="g">
              <div class="yuRUbf"><a href="https://doc.rust-lang.org/book/"><h3>The Rust Book</h3></a></div>
              <div class="VwiC3b">The book about Rust.</div>
            </div>
            <div class="g">
              <a href="https://accounts.google.com/login"><h3>Sign in</h3></a>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_extracts_results_and_skips_internal_links() {
        let items = GoogleTarget.parse(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.rust-lang.org/");
        assert_eq!(items[0].title, "Rust Programming Language");
        assert_eq!(items[0].snippet.as_deref(), Some("A language empowering everyone."));
    }

    #[test]
    fn test_unknown_layout_is_selector_mismatch() {
        let err = GoogleTarget
            .parse("<html><body><p>totally different layout</p></body></html>")
            .unwrap_err();
        assert_eq!(err, ParseError::SelectorMismatch);
    }

    #[test]
    fn test_matched_container_without_items_is_empty_not_mismatch() {
        let html = r#"<html><body><div class="g"><span>ad block</span></div></body></html>"#;
        let items = GoogleTarget.parse(html).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = GoogleTarget.search_url("rust async runtime", 10);
        assert!(url.contains("q=rust%20async%20runtime"));
        assert!(url.contains("num=10"));
    }
}
