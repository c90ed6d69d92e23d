// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 编排模块
///
/// 该模块实现系统的编排核心。三个管理器各自拥有一条定时轮询
/// 循环，彼此之间只通过事件总线通信，从不直接调用对方的方法，
/// 使得单个管理器的失败不会蔓延到其它管理器。
///
/// 包含的子模块：
/// - 事件定义（events）：封闭的事件和类型与负载结构
/// - 事件总线（event_bus）：同步扇出、逐处理器错误隔离、环形历史
/// - 编排配置（config）：可调参数与数据库覆盖
/// - 会话管理器（session_manager）：代理租用与远程会话状态机
/// - 工作器管理器（worker_manager）：工作器占用与抓取作业状态机
/// - 任务管理器（mission_manager）：任务队列、重试决策与写入步骤
/// - 控制器（controller）：组合根，负责启动顺序与取消/状态查询
pub mod config;
pub mod controller;
pub mod event_bus;
pub mod events;
pub mod mission_manager;
pub mod session_manager;
pub mod worker_manager;

use crate::domain::repositories::mission_repository::RepositoryError;
use crate::infrastructure::clients::ClientError;
use thiserror::Error;
use uuid::Uuid;

/// 编排错误类型
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 客户端错误
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// 任务未找到
    #[error("Mission {0} not found")]
    MissionNotFound(Uuid),
}
