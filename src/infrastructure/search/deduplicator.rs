// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use crate::domain::models::search_result::{SearchItem, TargetReport};
use crate::utils::url_utils::normalize_for_dedup;

/// 合并多目标结果并按归一化URL去重
///
/// 按目标顺序遍历成功报告，同一归一化URL保留首次出现的条目；
/// limit为0表示不限制条数
pub fn merge_deduplicated(reports: &[TargetReport], limit: usize) -> Vec<SearchItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<SearchItem> = Vec::new();

    for report in reports.iter().filter(|r| r.success) {
        for item in &report.items {
            if limit > 0 && merged.len() >= limit {
                return merged;
            }
            if seen.insert(normalize_for_dedup(&item.url)) {
                merged.push(item.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(engine: &str, urls: &[&str]) -> TargetReport {
        let items = urls
            .iter()
            .map(|u| SearchItem::new("t".to_string(), u.to_string(), None, engine.to_string()))
            .collect();
        TargetReport::from_items(engine, items, Vec::new(), 10)
    }

    #[test]
    fn test_first_occurrence_wins_by_target_order() {
        let reports = vec![
            report("google", &["https://a.example/", "https://b.example/"]),
            report("bing", &["https://A.EXAMPLE/", "https://c.example/"]),
        ];
        let merged = merge_deduplicated(&reports, 0);
        assert_eq!(merged.len(), 3);
        // The duplicate kept google's version
        assert_eq!(merged[0].engine, "google");
        assert_eq!(merged[2].url, "https://c.example/");
    }

    #[test]
    fn test_failed_reports_contribute_nothing() {
        let reports = vec![
            report("google", &[]),
            report("bing", &["https://a.example/"]),
        ];
        let merged = merge_deduplicated(&reports, 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].engine, "bing");
    }

    #[test]
    fn test_limit_respected() {
        let reports = vec![report(
            "google",
            &["https://a.example/", "https://b.example/", "https://c.example/"],
        )];
        assert_eq!(merge_deduplicated(&reports, 2).len(), 2);
    }
}
