//! 引擎事件与观察者
//!
//! 引擎在状态迁移、MAC 学习与遗忘、路由变更、转发/泛洪/送达/丢弃时通知注入的观察者，
//! 不依赖任何全局事件总线。

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::engine::EngineState;
use crate::net::{DeviceId, InterfaceId, Ipv4Address, MacAddress, Port, Route};

/// 丢弃原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// 目的端口就是入端口，交换机过滤
    Filtered,
    /// 目的 MAC 不是本设备
    NotForUs,
    /// TTL 耗尽
    TtlExpired,
    /// 路由表无匹配
    NoRoute,
    /// 出接口没有连线
    InterfaceDown,
    /// 下一跳 IP 无法解析到 MAC
    Unresolved,
    /// 帧在途中线缆被拆除
    LinkDown,
}

/// 引擎事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEventKind {
    StateChanged {
        from: EngineState,
        to: EngineState,
    },
    FrameSent {
        frame_id: u64,
        device: DeviceId,
        dst_mac: MacAddress,
    },
    MacLearned {
        switch: DeviceId,
        mac: MacAddress,
        port: Port,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Port>,
    },
    MacAged {
        switch: DeviceId,
        mac: MacAddress,
    },
    MacForgotten {
        switch: DeviceId,
        mac: MacAddress,
        port: Port,
    },
    RouteInstalled {
        router: DeviceId,
        route: Route,
    },
    RouteRemoved {
        router: DeviceId,
        route: Route,
    },
    Forwarded {
        frame_id: u64,
        from: DeviceId,
        to: DeviceId,
    },
    Flooded {
        frame_id: u64,
        switch: DeviceId,
        ports: Vec<Port>,
    },
    Routed {
        frame_id: u64,
        router: DeviceId,
        dst: Ipv4Address,
        interface: InterfaceId,
    },
    Delivered {
        frame_id: u64,
        device: DeviceId,
    },
    Dropped {
        frame_id: u64,
        device: DeviceId,
        reason: DropReason,
    },
}

/// 一条带时间戳的引擎事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub tick: u64,
    #[serde(flatten)]
    pub kind: EngineEventKind,
}

/// 引擎事件观察者
pub trait EngineObserver: Send {
    fn on_event(&mut self, ev: &EngineEvent);
}

/// 通过 channel 转发事件；接收端已关闭时静默丢弃
impl EngineObserver for Sender<EngineEvent> {
    fn on_event(&mut self, ev: &EngineEvent) {
        let _ = self.send(ev.clone());
    }
}

/// 内存事件收集器；克隆出的句柄共享同一份记录
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前已收集事件的拷贝
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EngineObserver for EventLog {
    fn on_event(&mut self, ev: &EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ev.clone());
    }
}
