// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::orchestrator::events::{EventTopic, OrchestratorEvent};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// 历史记录容量上限
const MAX_HISTORY: usize = 1000;

/// 事件处理器类型
pub type EventHandler =
    Arc<dyn Fn(OrchestratorEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 事件历史记录条目
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub event: OrchestratorEvent,
    pub timestamp: DateTime<Utc>,
}

struct EventBusInner {
    subscribers: RwLock<HashMap<EventTopic, Vec<(u64, EventHandler)>>>,
    history: Mutex<VecDeque<EventRecord>>,
    next_id: AtomicU64,
}

/// 事件总线
///
/// 进程内发布/订阅中枢。`emit`按订阅顺序依次等待每个处理器
/// 完成后才返回；单个处理器的失败只记录日志，不影响其余
/// 处理器，也不影响发布方。历史记录保存在固定容量的环形
/// 缓冲中供观测接口读取。
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    /// 创建新的事件总线实例
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: RwLock::new(HashMap::new()),
                history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// 订阅一个事件主题
    ///
    /// # 参数
    ///
    /// * `topic` - 事件主题
    /// * `handler` - 事件处理器
    ///
    /// # 返回值
    ///
    /// 返回订阅守卫，释放守卫即取消订阅
    pub fn subscribe<F>(&self, topic: EventTopic, handler: F) -> SubscriptionGuard
    where
        F: Fn(OrchestratorEvent) -> BoxFuture<'static, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));

        debug!("subscribed to {:?} (id: {})", topic, id);

        SubscriptionGuard {
            inner: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// 发布一个事件
    ///
    /// 记录历史后按订阅顺序依次调用当前全部订阅者并等待完成
    ///
    /// # 参数
    ///
    /// * `event` - 要发布的事件
    pub async fn emit(&self, event: OrchestratorEvent) {
        let topic = event.topic();
        debug!("emitting {:?}", topic);

        {
            let mut history = self.inner.history.lock();
            if history.len() == MAX_HISTORY {
                history.pop_front();
            }
            history.push_back(EventRecord {
                event: event.clone(),
                timestamp: Utc::now(),
            });
        }

        // Snapshot so handlers can subscribe/unsubscribe while we deliver
        let handlers: Vec<EventHandler> = self
            .inner
            .subscribers
            .read()
            .get(&topic)
            .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("no subscribers for {:?}", topic);
            return;
        }

        for handler in handlers {
            if let Err(e) = handler(event.clone()).await {
                error!("handler for {:?} failed: {e:#}", topic);
            }
        }
    }

    /// 读取最近的事件历史
    ///
    /// # 参数
    ///
    /// * `limit` - 最多返回的条目数
    pub fn history(&self, limit: usize) -> Vec<EventRecord> {
        let history = self.inner.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// 查询某个主题的订阅者数量
    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅守卫
///
/// 释放时自动取消对应的订阅
pub struct SubscriptionGuard {
    inner: Weak<EventBusInner>,
    topic: EventTopic,
    id: u64,
}

impl SubscriptionGuard {
    /// 显式取消订阅
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut subscribers = inner.subscribers.write();
            if let Some(subs) = subscribers.get_mut(&self.topic) {
                subs.retain(|(id, _)| *id != self.id);
                debug!("unsubscribed from {:?} (id: {})", self.topic, self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    fn assigned() -> OrchestratorEvent {
        OrchestratorEvent::MissionAssigned {
            mission_id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn emit_delivers_to_all_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let _g1 = bus.subscribe(EventTopic::MissionAssigned, move |_| {
            let first = first.clone();
            Box::pin(async move {
                first.lock().push(1);
                Ok(())
            })
        });
        let second = order.clone();
        let _g2 = bus.subscribe(EventTopic::MissionAssigned, move |_| {
            let second = second.clone();
            Box::pin(async move {
                second.lock().push(2);
                Ok(())
            })
        });

        bus.emit(assigned()).await;
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_later_handlers() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let _g1 = bus.subscribe(EventTopic::MissionAssigned, |_| {
            Box::pin(async { Err(anyhow::anyhow!("boom")) })
        });
        let counter = delivered.clone();
        let _g2 = bus.subscribe(EventTopic::MissionAssigned, move |_| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        bus.emit(assigned()).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_guard_unsubscribes() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = delivered.clone();
        let guard = bus.subscribe(EventTopic::MissionAssigned, move |_| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        bus.emit(assigned()).await;
        assert_eq!(bus.subscriber_count(EventTopic::MissionAssigned), 1);

        guard.unsubscribe();
        assert_eq!(bus.subscriber_count(EventTopic::MissionAssigned), 0);

        bus.emit(assigned()).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_is_capped_and_keeps_the_newest_entries() {
        let bus = EventBus::new();
        for _ in 0..(MAX_HISTORY + 5) {
            bus.emit(assigned()).await;
        }

        assert_eq!(bus.history(usize::MAX).len(), MAX_HISTORY);
        assert_eq!(bus.history(50).len(), 50);
    }

    #[tokio::test]
    async fn handlers_only_receive_their_topic() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = delivered.clone();
        let _g = bus.subscribe(EventTopic::MissionCompleted, move |_| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        bus.emit(assigned()).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
