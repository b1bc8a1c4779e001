// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::models::search_result::SearchItem;
use crate::domain::search::target::{ParseError, SearchTarget};

/// DuckDuckGo 搜索目标
///
/// 走无JS的html端点，结果链接包裹在/l/?uddg=重定向里，解析时还原
pub struct DuckDuckGoTarget;

/// html版与lite版的容器
const RESULT_SELECTORS: &[&str] = &["div.result", "div.links_main", "tr.result-link", "div.web-result"];

/// 还原DuckDuckGo重定向链接中的真实URL
fn unwrap_redirect(href: &str) -> Option<String> {
    if href.starts_with("http") && !href.contains("duckduckgo.com") {
        return Some(href.to_string());
    }

    // //duckduckgo.com/l/?uddg=<encoded>
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .filter(|u| u.starts_with("http"))
}

impl DuckDuckGoTarget {
    fn extract_item(element: &ElementRef) -> Option<SearchItem> {
        let title_selector = Selector::parse("a.result__a").ok()?;
        let fallback_selector = Selector::parse("a[href]").ok()?;
        let title_elem = element
            .select(&title_selector)
            .next()
            .or_else(|| element.select(&fallback_selector).next())?;

        let title = title_elem.text().collect::<String>().trim().to_string();
        let url = unwrap_redirect(title_elem.value().attr("href")?)?;
        if title.is_empty() {
            return None;
        }

        let snippet = ["a.result__snippet", ".result__snippet", "td.result-snippet"]
            .iter()
            .find_map(|s| {
                let selector = Selector::parse(s).ok()?;
                let node = element.select(&selector).next()?;
                let text = node.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some(text)
            });

        Some(SearchItem::new(title, url, snippet, "duckduckgo".to_string()))
    }
}

impl SearchTarget for DuckDuckGoTarget {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn rate_key(&self) -> &'static str {
        "duckduckgo"
    }

    fn search_url(&self, query: &str, _limit: u32) -> String {
        format!(
            "https://html.duckduckgo.com/html/?q={}&kl=us-en",
            urlencoding::encode(query)
        )
    }

    fn mobile_search_url(&self, query: &str, _limit: u32) -> String {
        // lite版对移动端身份最稳定
        format!(
            "https://lite.duckduckgo.com/lite/?q={}",
            urlencoding::encode(query)
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

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fserde.rs%2F&amp;rut=abc">Serde</a>
            <a class="result__snippet" href="#">Serialization framework for Rust.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://crates.io/">crates.io</a>
          </div>
        </body></html>
    "##;

    #[test]
    fn test_redirect_unwrapped() {
        let items = DuckDuckGoTarget.parse(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://serde.rs/");
        assert_eq!(items[1].url, "https://crates.io/");
    }

    #[test]
    fn test_unwrap_redirect_plain_url_passthrough() {
        assert_eq!(
            unwrap_redirect("https://example.com/page").as_deref(),
            Some("https://example.com/page")
        );
    }

    #[test]
    fn test_unwrap_redirect_rejects_internal() {
        assert!(unwrap_redirect("/settings").is_none());
    }

    #[test]
    fn test_lite_layout_parsed() {
        let html = r#"<table><tr class="result-link"><td><a href="https://docs.rs/">Docs.rs</a></td></tr>
                      <tr><td class="result-snippet">Rust documentation host.</td></tr></table>"#;
        let items = DuckDuckGoTarget.parse(html).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://docs.rs/");
    }
}
