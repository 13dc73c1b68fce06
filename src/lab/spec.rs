//! 实验拓扑描述（JSON）
//!
//! 描述设备、连线、静态路由与要注入的流量，供 `lan_sim` 等入口一次性构建网络。

use serde::{Deserialize, Serialize};

use crate::net::{CamConfig, Ipv4Address, Ipv4Interface, Ipv4Prefix, MacAddress, TopologyRules};
use crate::sim::EngineConfig;

pub const LAB_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabSpec {
    pub schema_version: u32,
    #[serde(default)]
    pub cam: CamConfig,
    #[serde(default)]
    pub rules: TopologyRules,
    #[serde(default)]
    pub engine: EngineConfig,
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub traffic: Vec<TrafficSpec>,
}

/// 设备描述；省略 `name` 时自动命名（Router1、Switch1、PC1 ...），省略 `mac` 时自动分配
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceSpec {
    Router {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        mac: Option<MacAddress>,
        /// 接口 `i` 绑定在第 `i + 1` 条接入该路由器的链路上
        #[serde(default)]
        interfaces: Vec<Ipv4Interface>,
    },
    Switch {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        mac: Option<MacAddress>,
    },
    Pc {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        mac: Option<MacAddress>,
        #[serde(default)]
        ip: Option<Ipv4Interface>,
        #[serde(default)]
        gateway: Option<Ipv4Address>,
    },
}

/// 两个设备（按名称）之间的一条连线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub router: String,
    pub prefix: Ipv4Prefix,
    pub interface: usize,
    #[serde(default)]
    pub next_hop: Option<Ipv4Address>,
}

/// 要注入的流量，按顺序逐条发送并处理完毕
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficSpec {
    /// 二层帧：目的为设备 `to` 的 MAC，或显式的 `dst_mac`（如广播）
    Frame {
        from: String,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        dst_mac: Option<MacAddress>,
    },
    /// 由 PC 发出的 IP 数据包
    Packet { from: String, dst_ip: Ipv4Address },
}
