// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口，限流器的分布式桶状态
/// 通过服务端Lua脚本在此之上原子执行
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(anyhow::Error)` - 创建过程中出现的错误
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 探测连接可用性
    pub async fn ping(&self) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut con).await?;
        Ok(())
    }

    /// 在服务端原子执行Lua脚本
    ///
    /// # 参数
    ///
    /// * `script` - Lua脚本
    /// * `keys` - KEYS数组
    /// * `args` - ARGV数组
    ///
    /// # 返回值
    ///
    /// * `Ok(T)` - 脚本返回值
    /// * `Err(anyhow::Error)` - 连接或脚本错误
    pub async fn eval_script<T: redis::FromRedisValue>(
        &self,
        script: &str,
        keys: &[&str],
        args: &[String],
    ) -> Result<T> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        let value: T = invocation.invoke_async(&mut con).await?;
        Ok(value)
    }
}
