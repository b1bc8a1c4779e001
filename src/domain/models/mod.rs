// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取（fetch）：策略、尝试记录与失败分类
/// - 代理（proxy）：代理记录及其生命周期状态
/// - 搜索结果（search_result）：结果条目、单目标报告与聚合结果
pub mod fetch;
pub mod proxy;
pub mod search_result;
