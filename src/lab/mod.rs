//! 实验拓扑加载
//!
//! 从 JSON 描述构建网络与引擎，并按顺序注入流量。

mod builder;
mod spec;

pub use builder::{Lab, LabError};
pub use spec::{DeviceSpec, LAB_SCHEMA_VERSION, LabSpec, LinkSpec, RouteSpec, TrafficSpec};
