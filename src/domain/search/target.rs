// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::search_result::SearchItem;

/// 解析错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// 文档中没有任何已知的结果容器命中，通常意味着页面布局漂移
    #[error("no known result container matched")]
    SelectorMismatch,
    /// 文档不是可解析的HTML
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

/// 搜索目标
///
/// 一个可被编排的目标引擎：负责构造查询URL并把响应体解析为结果条目。
/// 核心把解析器当作"这份内容产出了多少可用条目"的不透明分类器，
/// 空结果的判定永远发生在执行器之上的这一层
pub trait SearchTarget: Send + Sync {
    /// 目标名称
    fn name(&self) -> &'static str;

    /// 限流键，同类目标共享一个令牌桶
    fn rate_key(&self) -> &'static str;

    /// 构造桌面端查询URL
    fn search_url(&self, query: &str, limit: u32) -> String;

    /// 构造移动端查询URL，默认与桌面端一致
    fn mobile_search_url(&self, query: &str, limit: u32) -> String {
        self.search_url(query, limit)
    }

    /// 把响应体解析为结果条目
    ///
    /// # 返回值
    ///
    /// * `Ok(items)` - 解析出的条目，可能为空（由调用方分类为NoResults）
    /// * `Err(ParseError::SelectorMismatch)` - 没有任何已知容器命中
    fn parse(&self, body: &str) -> Result<Vec<SearchItem>, ParseError>;
}
