//! 错误类型

use super::addr::Ipv4Address;
use super::id::DeviceId;
use crate::sim::EngineState;

/// 仿真核心的错误种类
///
/// 全部是可恢复的局部错误，由调用方决定重试、提示或忽略。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0} and {1} are already connected")]
    AlreadyConnected(DeviceId, DeviceId),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("no route to {0}")]
    NoRoute(Ipv4Address),
    #[error("simulation is not active (state: {0})")]
    SimulationNotActive(EngineState),
}

pub type NetResult<T> = Result<T, NetError>;
