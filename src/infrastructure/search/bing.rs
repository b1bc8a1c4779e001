// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};

use crate::domain::models::search_result::SearchItem;
use crate::domain::search::target::{ParseError, SearchTarget};

/// Bing 搜索目标
pub struct BingTarget;

const RESULT_SELECTORS: &[&str] = &["li.b_algo", "div.b_algo", "li.b_ans"];

impl BingTarget {
    fn extract_item(element: &ElementRef) -> Option<SearchItem> {
        let title_selector = Selector::parse("h2 a").ok()?;
        let fallback_selector = Selector::parse("a[href]").ok()?;
        let title_elem = element
            .select(&title_selector)
            .next()
            .or_else(|| element.select(&fallback_selector).next())?;

        let title = title_elem.text().collect::<String>().trim().to_string();
        let url = title_elem.value().attr("href")?.to_string();

        // 跳过Bing内部链接
        if title.is_empty() || !url.starts_with("http") || url.contains("bing.com") {
            return None;
        }

        let snippet = ["p.b_algoSlug", "div.b_caption p", ".b_paractl", "p"]
            .iter()
            .find_map(|s| {
                let selector = Selector::parse(s).ok()?;
                let node = element.select(&selector).next()?;
                let text = node.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some(text)
            });

        Some(SearchItem::new(title, url, snippet, "bing".to_string()))
    }
}

impl SearchTarget for BingTarget {
    fn name(&self) -> &'static str {
        "bing"
    }

    fn rate_key(&self) -> &'static str {
        "bing"
    }

    fn search_url(&self, query: &str, limit: u32) -> String {
        format!(
            "https://www.bing.com/search?q={}&count={}&setlang=en",
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
            return Ok(elements
                .iter()
                .filter_map(Self::extract_item)
                .collect());
        }

        Err(ParseError::SelectorMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body><ol id="b_results">
          <li class="b_algo">
            <h2><a href="https://tokio.rs/">Tokio - An asynchronous Rust runtime</a></h2>
            <div class="b_caption"><p>Build reliable network applications.</p></div>
          </li>
          <li class="b_algo">
            <h2><a href="/search?q=more">More on Bing</a></h2>
          </li>
        </ol></body></html>
    "#;

    #[test]
    fn test_parse_web_results() {
        let items = BingTarget.parse(SAMPLE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://tokio.rs/");
        assert_eq!(items[0].snippet.as_deref(), Some("Build reliable network applications."));
    }

    #[test]
    fn test_layout_drift_reported() {
        assert_eq!(
            BingTarget.parse("<html><body></body></html>").unwrap_err(),
            ParseError::SelectorMismatch
        );
    }
}
