//! 网络模拟模块
//!
//! 此模块包含网络模拟的核心数据模型：地址、设备、注册表、CAM 表、路由表与连接图。

// 子模块声明
mod addr;
mod cam;
mod device;
mod error;
mod export;
mod frame;
mod graph;
mod id;
mod names;
mod network;
mod registry;
mod routing;
mod stats;

// 重新导出公共接口
pub use addr::{Ipv4Address, Ipv4Interface, Ipv4Prefix, MacAddress};
pub use cam::{CamConfig, CamEntry, CamLookup, CamTable};
pub use device::{
    Device, DeviceKind, DeviceRole, PcState, PortAllocator, PortTable, Renumbered,
    RouterState, SwitchConnection, SwitchState,
};
pub use error::{NetError, NetResult};
pub use export::{
    CamRow, ConnectionRecord, DeviceConfig, DeviceRecord, LABEL_END, LABEL_MIDDLE, LABEL_START,
    TopologySnapshot,
};
pub use frame::{Frame, Packet};
pub use graph::{ConnectionGraph, Endpoint, Link, TopologyRules, TopologyViolation};
pub use id::{DeviceId, InterfaceId, LinkId, Port};
pub use names::NameGenerator;
pub use network::Network;
pub use registry::DeviceRegistry;
pub use routing::{Route, RoutingTable};
pub use stats::Stats;
