//! 面向展示层的纯数据导出
//!
//! - 每条连接的三个标签槽（"Start" / "Middle" / "End"）
//! - 单个设备的配置快照（CAM 表、路由表、端口）
//! - 整个拓扑的快照：每个设备一条记录，每条连接一对设备 id

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::addr::{Ipv4Address, Ipv4Interface, MacAddress};
use super::device::{Device, DeviceKind, DeviceRole, SwitchConnection};
use super::error::{NetError, NetResult};
use super::graph::Endpoint;
use super::id::{DeviceId, InterfaceId, Port};
use super::network::Network;
use super::routing::Route;

pub const LABEL_START: &str = "Start";
pub const LABEL_MIDDLE: &str = "Middle";
pub const LABEL_END: &str = "End";

/// 一条 CAM 表项的展示形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CamRow {
    pub mac: MacAddress,
    pub port: Port,
    pub last_seen: u64,
}

/// 设备配置快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub mac: MacAddress,
    #[serde(default)]
    pub addresses: Vec<Ipv4Interface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Address>,
    #[serde(default)]
    pub ports: Vec<SwitchConnection>,
    #[serde(default)]
    pub cam: Vec<CamRow>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device type: {}", self.kind)?;
        writeln!(f, "Name: {} ({})", self.name, self.mac)?;
        for a in &self.addresses {
            writeln!(f, "Address: {a}")?;
        }
        if let Some(gw) = self.gateway {
            writeln!(f, "Gateway: {gw}")?;
        }
        match self.kind {
            DeviceKind::Switch => {
                writeln!(f, "CAM table:")?;
                for row in &self.cam {
                    writeln!(f, "  {} -> {}", row.mac, row.port)?;
                }
            }
            DeviceKind::Router => {
                writeln!(f, "Routing table:")?;
                for r in &self.routes {
                    match r.next_hop {
                        Some(nh) => writeln!(f, "  {} via {} on {}", r.prefix, nh, r.interface)?,
                        None => writeln!(f, "  {} connected on {}", r.prefix, r.interface)?,
                    }
                }
            }
            DeviceKind::Pc => {}
        }
        Ok(())
    }
}

/// 拓扑快照中的设备记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub mac: MacAddress,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<Ipv4Interface>,
}

/// 拓扑快照中的连接记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub start: DeviceId,
    pub end: DeviceId,
}

/// 可直接序列化的拓扑快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub devices: Vec<DeviceRecord>,
    pub connections: Vec<ConnectionRecord>,
}

fn device_config(dev: &Device) -> DeviceConfig {
    let mut cfg = DeviceConfig {
        id: dev.id(),
        kind: dev.kind(),
        name: dev.name().to_string(),
        mac: dev.mac(),
        addresses: dev.addresses(),
        gateway: None,
        ports: dev
            .ports()
            .map(|p| p.connections().to_vec())
            .unwrap_or_default(),
        cam: Vec::new(),
        routes: Vec::new(),
    };
    match &dev.role {
        DeviceRole::Switch(s) => {
            cfg.cam = s
                .cam
                .entries()
                .into_iter()
                .map(|(mac, e)| CamRow {
                    mac,
                    port: e.port,
                    last_seen: e.last_seen.0,
                })
                .collect();
        }
        DeviceRole::Router(r) => cfg.routes = r.routes.entries().to_vec(),
        DeviceRole::Pc(p) => cfg.gateway = p.gateway,
    }
    cfg
}

impl Network {
    /// 设备配置快照（悬停提示等展示用）
    pub fn device_config(&self, id: DeviceId) -> NetResult<DeviceConfig> {
        Ok(device_config(self.registry.get(id)?))
    }

    /// 链路一端的展示文本
    fn endpoint_label(&self, ep: Endpoint) -> NetResult<String> {
        let dev = self.registry.get(ep.device)?;
        let label = match (&dev.role, ep.port) {
            (DeviceRole::Switch(s), Some(port)) => {
                let learned = s.cam.entries().iter().filter(|(_, e)| e.port == port).count();
                if learned == 0 {
                    port.to_string()
                } else {
                    format!("{port} ({learned} learned)")
                }
            }
            (DeviceRole::Router(r), Some(port)) => {
                match InterfaceId::from_port(port).and_then(|i| r.interface(i).ok()) {
                    Some(iface) => format!("{port} {iface}"),
                    None => port.to_string(),
                }
            }
            (DeviceRole::Pc(p), _) => p.ip.map(|i| i.to_string()).unwrap_or_default(),
            (_, None) => String::new(),
        };
        Ok(label)
    }

    /// 连接的三个标签槽，键固定为 "Start"、"Middle"、"End"。
    ///
    /// Start/End 对应 `a`/`b` 一端（端口、学习数量或地址），Middle 为链路编号。
    pub fn labels_for_connection(
        &self,
        a: DeviceId,
        b: DeviceId,
    ) -> NetResult<BTreeMap<String, String>> {
        let link = self
            .graph
            .link_between(a, b)
            .ok_or_else(|| NetError::NotFound(format!("link between {a} and {b}")))?;
        let start = link
            .endpoint(a)
            .ok_or_else(|| NetError::NotFound(format!("{a} on {}", link.id)))?;
        let end = link
            .endpoint(b)
            .ok_or_else(|| NetError::NotFound(format!("{b} on {}", link.id)))?;

        let mut labels = BTreeMap::new();
        labels.insert(LABEL_START.to_string(), self.endpoint_label(start)?);
        labels.insert(LABEL_MIDDLE.to_string(), link.id.to_string());
        labels.insert(LABEL_END.to_string(), self.endpoint_label(end)?);
        Ok(labels)
    }

    /// 拓扑快照（设备按 id，连接按链路 id 排序）
    pub fn snapshot(&self) -> TopologySnapshot {
        let devices = self
            .registry
            .iter()
            .map(|d| DeviceRecord {
                id: d.id(),
                kind: d.kind(),
                name: d.name().to_string(),
                mac: d.mac(),
                ips: d.addresses(),
            })
            .collect();
        let connections = self
            .graph
            .links()
            .map(|l| ConnectionRecord {
                start: l.a.device,
                end: l.b.device,
            })
            .collect();
        TopologySnapshot {
            devices,
            connections,
        }
    }
}
