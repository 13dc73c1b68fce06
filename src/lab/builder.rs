//! 由 `LabSpec` 构建网络与引擎

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::spec::{DeviceSpec, LAB_SCHEMA_VERSION, LabSpec, TrafficSpec};
use crate::net::{DeviceId, DeviceKind, InterfaceId, NetError, Network, Route};
use crate::sim::Engine;

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse lab description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported schema_version {0} (expected {expected})", expected = LAB_SCHEMA_VERSION)]
    UnsupportedSchema(u32),
    #[error("unknown device {0:?}")]
    UnknownDevice(String),
    #[error("duplicate device name {0:?}")]
    DuplicateName(String),
    #[error("traffic item {index}: {reason}")]
    InvalidTraffic { index: usize, reason: String },
    #[error(transparent)]
    Net(#[from] NetError),
}

/// 构建完成的实验：引擎（含网络）、名称索引与待注入的流量
pub struct Lab {
    pub engine: Engine,
    names: BTreeMap<String, DeviceId>,
    traffic: Vec<TrafficSpec>,
}

impl Lab {
    /// 读取并构建 JSON 描述
    pub fn load(path: &Path) -> Result<Self, LabError> {
        let raw = fs::read_to_string(path).map_err(|source| LabError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: LabSpec = serde_json::from_str(&raw)?;
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: LabSpec) -> Result<Self, LabError> {
        if spec.schema_version != LAB_SCHEMA_VERSION {
            return Err(LabError::UnsupportedSchema(spec.schema_version));
        }
        let mut net = Network::new(spec.cam, spec.rules);
        let mut names = BTreeMap::new();

        for dev in &spec.devices {
            let (kind, name, mac) = match dev {
                DeviceSpec::Router { name, mac, .. } => (DeviceKind::Router, name, mac),
                DeviceSpec::Switch { name, mac } => (DeviceKind::Switch, name, mac),
                DeviceSpec::Pc { name, mac, .. } => (DeviceKind::Pc, name, mac),
            };
            let id = net.registry.create(kind, name.clone(), *mac);
            let assigned = net.registry.get(id)?.name().to_string();
            if names.insert(assigned.clone(), id).is_some() {
                return Err(LabError::DuplicateName(assigned));
            }

            match dev {
                DeviceSpec::Router { interfaces, .. } => {
                    for iface in interfaces {
                        net.add_router_interface(id, *iface)?;
                    }
                }
                DeviceSpec::Pc {
                    ip: Some(ip),
                    gateway,
                    ..
                } => net.configure_pc(id, *ip, *gateway)?,
                DeviceSpec::Pc {
                    ip: None,
                    gateway: Some(gw),
                    ..
                } => {
                    return Err(NetError::InvalidAddress(format!(
                        "{assigned} has gateway {gw} but no address"
                    ))
                    .into());
                }
                _ => {}
            }
        }

        let lookup = |names: &BTreeMap<String, DeviceId>, name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| LabError::UnknownDevice(name.to_string()))
        };

        for link in &spec.links {
            let a = lookup(&names, &link.a)?;
            let b = lookup(&names, &link.b)?;
            net.connect(a, b)?;
        }

        for r in &spec.routes {
            let router = lookup(&names, &r.router)?;
            let route = Route {
                prefix: r.prefix,
                interface: InterfaceId(r.interface),
                next_hop: r.next_hop,
            };
            net.add_route(router, route)?;
        }

        info!(
            devices = net.registry.len(),
            links = net.graph.len(),
            traffic = spec.traffic.len(),
            "实验拓扑构建完成"
        );

        Ok(Self {
            engine: Engine::new(net, spec.engine),
            names,
            traffic: spec.traffic,
        })
    }

    /// 按名称查找设备
    pub fn device(&self, name: &str) -> Result<DeviceId, LabError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| LabError::UnknownDevice(name.to_string()))
    }

    /// 名称 -> 设备 id（按名称排序）
    pub fn names(&self) -> impl Iterator<Item = (&str, DeviceId)> + '_ {
        self.names.iter().map(|(n, id)| (n.as_str(), *id))
    }

    /// 启动引擎（若尚未启动），逐条发送流量并处理到队列清空，返回处理的事件总数
    pub fn run_traffic(&mut self) -> Result<u64, LabError> {
        if !self.engine.simulation_started() {
            self.engine.start()?;
        }
        let traffic = self.traffic.clone();
        let mut steps = 0;
        for (index, item) in traffic.iter().enumerate() {
            match item {
                TrafficSpec::Frame { from, to, dst_mac } => {
                    let src = self.device(from)?;
                    let dst_mac = match (to, dst_mac) {
                        (_, Some(mac)) => *mac,
                        (Some(to), None) => {
                            let dst = self.device(to)?;
                            self.engine.network().registry.get(dst)?.mac()
                        }
                        (None, None) => {
                            return Err(LabError::InvalidTraffic {
                                index,
                                reason: "frame needs `to` or `dst_mac`".to_string(),
                            });
                        }
                    };
                    self.engine.send_frame(src, dst_mac)?;
                }
                TrafficSpec::Packet { from, dst_ip } => {
                    let src = self.device(from)?;
                    self.engine.send_packet(src, *dst_ip)?;
                }
            }
            let n = self.engine.run()?;
            debug!(index, steps = n, "流量处理完毕");
            steps += n;
        }
        Ok(steps)
    }
}
