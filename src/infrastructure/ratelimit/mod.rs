// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 限流基础设施模块
///
/// 按键的令牌桶准入控制：
/// - 桶（bucket）：时间补充的令牌桶
/// - 限流器（limiter）：本地/分布式双模式与透明降级
pub mod bucket;
pub mod limiter;
