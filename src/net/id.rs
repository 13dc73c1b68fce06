//! 标识符类型
//!
//! 定义设备、链路、端口与路由器接口的标识符。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 设备标识符
///
/// 由注册表分配，是设备所有权的唯一键；与 MAC 地址相互独立。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub usize);

/// 链路标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub usize);

/// 端口号（交换机/路由器上的逻辑接入点，从 1 开始编号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u32);

/// 路由器接口序号（从 0 开始，接口 `i` 绑定在端口 `i + 1` 上）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub usize);

impl InterfaceId {
    /// 接口所绑定的端口
    pub fn port(self) -> Port {
        Port(self.0 as u32 + 1)
    }

    /// 端口对应的接口（端口 0 不存在）
    pub fn from_port(port: Port) -> Option<Self> {
        port.0.checked_sub(1).map(|i| InterfaceId(i as usize))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link {}", self.0)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}", self.0)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}
