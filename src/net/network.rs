//! 网络拓扑管理
//!
//! `Network` 持有设备注册表与连接图，是拓扑唯一的修改入口。

use tracing::info;

use super::addr::{Ipv4Address, Ipv4Interface, Ipv4Prefix};
use super::cam::CamConfig;
use super::device::{Device, DeviceKind, Renumbered};
use super::error::{NetError, NetResult};
use super::graph::{ConnectionGraph, Link, TopologyRules};
use super::id::{DeviceId, InterfaceId, LinkId};
use super::registry::DeviceRegistry;
use super::routing::Route;

/// 网络拓扑
#[derive(Debug, Default)]
pub struct Network {
    pub registry: DeviceRegistry,
    pub graph: ConnectionGraph,
}

impl Network {
    pub fn new(cam: CamConfig, rules: TopologyRules) -> Self {
        Self {
            registry: DeviceRegistry::new(cam),
            graph: ConnectionGraph::new(rules),
        }
    }

    /// 添加路由器节点
    pub fn add_router(&mut self, name: impl Into<String>) -> DeviceId {
        self.registry.add_router(name)
    }

    /// 添加交换机节点
    pub fn add_switch(&mut self, name: impl Into<String>) -> DeviceId {
        self.registry.add_switch(name)
    }

    /// 添加 PC 节点
    pub fn add_pc(&mut self, name: impl Into<String>) -> DeviceId {
        self.registry.add_pc(name)
    }

    /// 以自动名称添加设备
    pub fn spawn(&mut self, kind: DeviceKind) -> DeviceId {
        self.registry.spawn(kind)
    }

    /// 注册（或替换）设备。替换会改变端口模型时（PC 与多端口设备互换），
    /// 先拆除该 id 的全部链路。
    pub fn add_device(&mut self, device: Device) -> NetResult<DeviceId> {
        let id = device.id();
        let rewire = self
            .registry
            .get(id)
            .is_ok_and(|old| old.ports().is_some() != device.ports().is_some());
        if rewire {
            let peers: Vec<DeviceId> = self.graph.neighbors(id).collect();
            for peer in peers {
                self.disconnect(id, peer)?;
            }
        }
        Ok(self.registry.add(device))
    }

    /// 连接两个节点（无向链路）
    pub fn connect(&mut self, a: DeviceId, b: DeviceId) -> NetResult<LinkId> {
        self.graph.connect(&mut self.registry, a, b)
    }

    pub fn disconnect(&mut self, a: DeviceId, b: DeviceId) -> NetResult<Link> {
        self.graph.disconnect(&mut self.registry, a, b)
    }

    /// 为路由器配置接口，返回接口序号
    pub fn add_router_interface(
        &mut self,
        router: DeviceId,
        iface: Ipv4Interface,
    ) -> NetResult<InterfaceId> {
        let dev = self.registry.get_mut(router)?;
        let name = dev.name().to_string();
        let r = dev
            .as_router_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a router")))?;
        let id = r.add_interface(iface);
        info!(router = %name, interface = %id, address = %iface, "配置路由器接口");
        Ok(id)
    }

    /// 为路由器安装静态路由
    pub fn add_route(&mut self, router: DeviceId, route: Route) -> NetResult<()> {
        let dev = self.registry.get_mut(router)?;
        let name = dev.name().to_string();
        let r = dev
            .as_router_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a router")))?;
        r.add_route(route)?;
        info!(router = %name, prefix = %route.prefix, interface = %route.interface, next_hop = ?route.next_hop, "安装静态路由");
        Ok(())
    }

    /// 删除路由器上 (前缀, 接口) 对应的路由；不存在时返回 `NotFound`
    pub fn remove_route(
        &mut self,
        router: DeviceId,
        prefix: Ipv4Prefix,
        interface: InterfaceId,
    ) -> NetResult<Route> {
        let dev = self.registry.get_mut(router)?;
        let name = dev.name().to_string();
        let r = dev
            .as_router_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a router")))?;
        let removed = r
            .routes
            .remove_route(prefix, interface)
            .ok_or_else(|| NetError::NotFound(format!("route {prefix} on {interface} at {name}")))?;
        info!(router = %name, %prefix, %interface, "删除静态路由");
        Ok(removed)
    }

    /// 修改路由器接口地址的某个字节；网段变化时直连路由随之迁移
    pub fn increment_interface_octet(
        &mut self,
        router: DeviceId,
        interface: InterfaceId,
        octet: usize,
        delta: i32,
    ) -> NetResult<Renumbered> {
        let dev = self.registry.get_mut(router)?;
        let name = dev.name().to_string();
        let r = dev
            .as_router_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a router")))?;
        let renumbered = r.increment_interface_octet(interface, octet, delta)?;
        info!(router = %name, %interface, address = %renumbered.interface, "接口改址");
        Ok(renumbered)
    }

    /// 配置 PC 的地址与默认网关
    pub fn configure_pc(
        &mut self,
        pc: DeviceId,
        ip: Ipv4Interface,
        gateway: Option<Ipv4Address>,
    ) -> NetResult<()> {
        let dev = self.registry.get_mut(pc)?;
        let name = dev.name().to_string();
        let p = dev
            .as_pc_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a PC")))?;
        p.ip = Some(ip);
        p.gateway = gateway;
        info!(pc = %name, address = %ip, gateway = ?gateway, "配置 PC 地址");
        Ok(())
    }
}
