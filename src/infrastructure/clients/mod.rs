// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 远程服务客户端模块
///
/// 提供工作器与写入器HTTP服务的出站客户端。
/// 远程阶段词汇表在这一层完成归一化，内部逻辑只见固定分类。
pub mod worker_client;
pub mod writer_client;

use thiserror::Error;

/// 客户端错误类型
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP传输错误（连接失败、超时等）
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 非成功状态码
    #[error("Unexpected status: HTTP {0}")]
    UnexpectedStatus(u16),

    /// 响应缺少必需字段或格式不符
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 基础URL无法解析
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
