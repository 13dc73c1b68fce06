//! 设备类型
//!
//! 设备由共享的身份信息（id、MAC、名称）加上按种类区分的状态组成：
//! 路由器持有接口与路由表，交换机持有 CAM 表与端口连接，PC 只有地址配置。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::addr::{Ipv4Address, Ipv4Interface, MacAddress};
use super::cam::{CamConfig, CamTable};
use super::error::{NetError, NetResult};
use super::id::{DeviceId, InterfaceId, Port};
use super::routing::{Route, RoutingTable};

/// 设备种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Router,
    Switch,
    Pc,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Router => "Router",
            DeviceKind::Switch => "Switch",
            DeviceKind::Pc => "PC",
        })
    }
}

/// 设备在某个端口上的一条连接记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConnection {
    pub device: DeviceId,
    pub port: Port,
}

/// 端口分配：单调递增，只有显式释放的端口号才会被复用（最小者优先）
#[derive(Debug, Clone, Default)]
pub struct PortAllocator {
    last: u32,
    released: BTreeSet<u32>,
}

impl PortAllocator {
    pub fn allocate(&mut self) -> Port {
        if let Some(p) = self.released.pop_first() {
            return Port(p);
        }
        self.last += 1;
        Port(self.last)
    }

    pub fn release(&mut self, port: Port) {
        if port.0 >= 1 && port.0 <= self.last {
            self.released.insert(port.0);
        }
    }
}

/// 多端口设备（交换机、路由器）的连接表
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    connections: Vec<SwitchConnection>,
    allocator: PortAllocator,
}

impl PortTable {
    /// 为 `peer` 分配端口并记录连接
    pub(crate) fn attach(&mut self, peer: DeviceId) -> Port {
        let port = self.allocator.allocate();
        self.connections.push(SwitchConnection { device: peer, port });
        port
    }

    /// 移除与 `peer` 的连接并释放端口
    pub(crate) fn detach(&mut self, peer: DeviceId) -> Option<Port> {
        let idx = self.connections.iter().position(|c| c.device == peer)?;
        let conn = self.connections.remove(idx);
        self.allocator.release(conn.port);
        Some(conn.port)
    }

    pub fn connections(&self) -> &[SwitchConnection] {
        &self.connections
    }

    pub fn port_of(&self, peer: DeviceId) -> Option<Port> {
        self.connections
            .iter()
            .find(|c| c.device == peer)
            .map(|c| c.port)
    }
}

/// 交换机状态
#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    pub(crate) cam: CamTable,
    pub(crate) ports: PortTable,
}

impl SwitchState {
    pub fn new(cam: CamConfig) -> Self {
        Self {
            cam: CamTable::new(cam),
            ports: PortTable::default(),
        }
    }

    pub fn cam(&self) -> &CamTable {
        &self.cam
    }

    pub fn connections(&self) -> &[SwitchConnection] {
        self.ports.connections()
    }
}

/// 路由器状态
#[derive(Debug, Clone, Default)]
pub struct RouterState {
    interfaces: Vec<Ipv4Interface>,
    pub(crate) routes: RoutingTable,
    pub(crate) ports: PortTable,
}

/// 接口改址的结果：新地址，以及被替换的直连路由（网段未变时两者皆为 None）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renumbered {
    pub interface: Ipv4Interface,
    pub removed: Option<Route>,
    pub installed: Option<Route>,
}

impl RouterState {
    /// 配置新接口并安装对应的直连路由
    pub(crate) fn add_interface(&mut self, iface: Ipv4Interface) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len());
        self.interfaces.push(iface);
        self.routes.add_route(Route::connected(iface.network(), id));
        id
    }

    pub fn interfaces(&self) -> &[Ipv4Interface] {
        &self.interfaces
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn interface(&self, id: InterfaceId) -> NetResult<&Ipv4Interface> {
        self.interfaces
            .get(id.0)
            .ok_or_else(|| NetError::NotFound(format!("router interface {id}")))
    }

    /// 安装静态路由；出接口必须已配置
    pub(crate) fn add_route(&mut self, route: Route) -> NetResult<Option<Route>> {
        self.interface(route.interface)?;
        Ok(self.routes.add_route(route))
    }

    /// 就地修改接口地址的某个字节（语义同 `Ipv4Address::increment_octet`），网段变化时迁移直连路由
    pub(crate) fn increment_interface_octet(
        &mut self,
        id: InterfaceId,
        octet: usize,
        delta: i32,
    ) -> NetResult<Renumbered> {
        let iface = self
            .interfaces
            .get_mut(id.0)
            .ok_or_else(|| NetError::NotFound(format!("router interface {id}")))?;
        let old_network = iface.network();
        iface.address.increment_octet(octet, delta);
        let interface = *iface;
        if old_network == interface.network() {
            return Ok(Renumbered {
                interface,
                removed: None,
                installed: None,
            });
        }
        let removed = self.routes.remove_route(old_network, id);
        let installed = Route::connected(interface.network(), id);
        self.routes.add_route(installed);
        Ok(Renumbered {
            interface,
            removed,
            installed: Some(installed),
        })
    }

    pub fn owns_ip(&self, ip: Ipv4Address) -> bool {
        self.interfaces.iter().any(|i| i.address == ip)
    }
}

/// PC 状态
#[derive(Debug, Clone, Default)]
pub struct PcState {
    pub ip: Option<Ipv4Interface>,
    pub gateway: Option<Ipv4Address>,
}

/// 按种类区分的设备状态
#[derive(Debug, Clone)]
pub enum DeviceRole {
    Router(RouterState),
    Switch(SwitchState),
    Pc(PcState),
}

/// 网络设备
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    mac: MacAddress,
    name: String,
    pub(crate) role: DeviceRole,
}

impl Device {
    pub fn new(id: DeviceId, mac: MacAddress, name: impl Into<String>, role: DeviceRole) -> Self {
        Self {
            id,
            mac,
            name: name.into(),
            role,
        }
    }

    pub fn router(id: DeviceId, mac: MacAddress, name: impl Into<String>) -> Self {
        Self::new(id, mac, name, DeviceRole::Router(RouterState::default()))
    }

    pub fn switch(id: DeviceId, mac: MacAddress, name: impl Into<String>, cam: CamConfig) -> Self {
        Self::new(id, mac, name, DeviceRole::Switch(SwitchState::new(cam)))
    }

    pub fn pc(id: DeviceId, mac: MacAddress, name: impl Into<String>) -> Self {
        Self::new(id, mac, name, DeviceRole::Pc(PcState::default()))
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &DeviceRole {
        &self.role
    }

    pub fn kind(&self) -> DeviceKind {
        match self.role {
            DeviceRole::Router(_) => DeviceKind::Router,
            DeviceRole::Switch(_) => DeviceKind::Switch,
            DeviceRole::Pc(_) => DeviceKind::Pc,
        }
    }

    pub fn as_router(&self) -> Option<&RouterState> {
        match &self.role {
            DeviceRole::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_router_mut(&mut self) -> Option<&mut RouterState> {
        match &mut self.role {
            DeviceRole::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&SwitchState> {
        match &self.role {
            DeviceRole::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_switch_mut(&mut self) -> Option<&mut SwitchState> {
        match &mut self.role {
            DeviceRole::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pc(&self) -> Option<&PcState> {
        match &self.role {
            DeviceRole::Pc(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pc_mut(&mut self) -> Option<&mut PcState> {
        match &mut self.role {
            DeviceRole::Pc(p) => Some(p),
            _ => None,
        }
    }

    /// 多端口设备的连接表；PC 没有端口
    pub fn ports(&self) -> Option<&PortTable> {
        match &self.role {
            DeviceRole::Router(r) => Some(&r.ports),
            DeviceRole::Switch(s) => Some(&s.ports),
            DeviceRole::Pc(_) => None,
        }
    }

    pub(crate) fn ports_mut(&mut self) -> Option<&mut PortTable> {
        match &mut self.role {
            DeviceRole::Router(r) => Some(&mut r.ports),
            DeviceRole::Switch(s) => Some(&mut s.ports),
            DeviceRole::Pc(_) => None,
        }
    }

    /// 接入 `peer`，返回分配到的端口（PC 返回 None）
    pub(crate) fn attach(&mut self, peer: DeviceId) -> Option<Port> {
        match &mut self.role {
            DeviceRole::Router(r) => Some(r.ports.attach(peer)),
            DeviceRole::Switch(s) => Some(s.ports.attach(peer)),
            DeviceRole::Pc(_) => None,
        }
    }

    /// 断开 `peer`：释放端口；交换机同时遗忘该端口上学到的所有 MAC
    pub(crate) fn detach(&mut self, peer: DeviceId) -> Option<Port> {
        match &mut self.role {
            DeviceRole::Router(r) => r.ports.detach(peer),
            DeviceRole::Switch(s) => {
                let port = s.ports.detach(peer)?;
                s.cam.forget_port(port);
                Some(port)
            }
            DeviceRole::Pc(_) => None,
        }
    }

    /// 设备上配置的全部 IP 地址
    pub fn addresses(&self) -> Vec<Ipv4Interface> {
        match &self.role {
            DeviceRole::Router(r) => r.interfaces().to_vec(),
            DeviceRole::Switch(_) => Vec::new(),
            DeviceRole::Pc(p) => p.ip.into_iter().collect(),
        }
    }

    pub fn owns_ip(&self, ip: Ipv4Address) -> bool {
        self.addresses().iter().any(|i| i.address == ip)
    }
}
