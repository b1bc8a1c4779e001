// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 搜索基础设施模块
///
/// 该模块包含各目标引擎的实现与多目标编排：
/// - 目标实现（google/bing/duckduckgo/yahoo）：URL构造与结果解析
/// - 编排器（orchestrator）：顺序降级与并发扇出
/// - 去重器（deduplicator）：跨引擎URL归一化去重
pub mod bing;
pub mod deduplicator;
pub mod duckduckgo;
pub mod google;
pub mod orchestrator;
pub mod yahoo;
