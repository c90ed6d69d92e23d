// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::time::Duration;

/// 会话轮询间隔上限
///
/// 会话建立的延迟直接拖慢整条流水线，轮询间隔不随全局
/// 配置放大到5秒以上
const SESSION_POLLING_CAP: Duration = Duration::from_secs(5);

/// 编排可调参数
///
/// 启动时从数据库config表读取覆盖值，缺失的键使用编译期默认值
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 会话状态轮询间隔
    pub session_polling_interval: Duration,
    /// 抓取作业轮询间隔
    pub worker_polling_interval: Duration,
    /// 任务队列与写入作业轮询间隔
    pub mission_polling_interval: Duration,
    /// 会话建立超时
    pub session_timeout: Duration,
    /// 抓取作业超时
    pub scrape_timeout: Duration,
    /// 写入作业超时
    pub writer_timeout: Duration,
    /// 会话创建最大重试次数
    pub max_session_retries: u32,
    /// 任务最大重试次数
    pub max_mission_retries: u32,
    /// 升级为错误前允许的连续状态查询失败次数
    pub max_consecutive_failures: u32,
    /// 单个任务最多抓取的广告数量
    pub max_ads_per_mission: u32,
    /// 抓取批大小
    pub batch_size: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_polling_interval: Duration::from_secs(5),
            worker_polling_interval: Duration::from_secs(10),
            mission_polling_interval: Duration::from_secs(10),
            session_timeout: Duration::from_secs(180),
            scrape_timeout: Duration::from_secs(600),
            writer_timeout: Duration::from_secs(300),
            max_session_retries: 2,
            max_mission_retries: 3,
            max_consecutive_failures: 3,
            max_ads_per_mission: 1000,
            batch_size: 100,
        }
    }
}

impl OrchestratorConfig {
    /// 应用数据库覆盖值
    ///
    /// # 参数
    ///
    /// * `overrides` - config表的键值对
    ///
    /// # 返回值
    ///
    /// 返回应用覆盖后的配置
    pub fn with_overrides(mut self, overrides: &HashMap<String, serde_json::Value>) -> Self {
        if let Some(secs) = read_u64(overrides, "polling_interval_seconds") {
            let interval = Duration::from_secs(secs);
            self.worker_polling_interval = interval;
            self.mission_polling_interval = interval;
            self.session_polling_interval = interval.min(SESSION_POLLING_CAP);
        }
        if let Some(secs) = read_u64(overrides, "session_timeout_seconds") {
            self.session_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64(overrides, "scrape_timeout_seconds") {
            self.scrape_timeout = Duration::from_secs(secs);
        }
        if let Some(max_ads) = read_u64(overrides, "max_ads_per_mission") {
            self.max_ads_per_mission = max_ads as u32;
        }
        if let Some(batch) = read_u64(overrides, "batch_size") {
            self.batch_size = batch as u32;
        }
        self
    }
}

/// 读取数值型配置项，兼容JSON数字和字符串两种存储形式
fn read_u64(map: &HashMap<String, serde_json::Value>, key: &str) -> Option<u64> {
    let value = map.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
