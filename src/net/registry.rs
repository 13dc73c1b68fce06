//! 设备注册表
//!
//! 注册表是所有设备的唯一所有者（以 `DeviceId` 为键）。按种类的集合只保存 id，
//! MAC 通过独立的二级索引映射到 id，设备身份从不由 MAC 字符串推导。

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use super::addr::{Ipv4Address, MacAddress};
use super::cam::CamConfig;
use super::device::{Device, DeviceKind};
use super::error::{NetError, NetResult};
use super::id::DeviceId;
use super::names::NameGenerator;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Device>,
    by_mac: HashMap<MacAddress, DeviceId>,
    routers: Vec<DeviceId>,
    switches: Vec<DeviceId>,
    pcs: Vec<DeviceId>,
    next_id: usize,
    next_mac: u32,
    names: NameGenerator,
    cam: CamConfig,
}

impl DeviceRegistry {
    pub fn new(cam: CamConfig) -> Self {
        Self {
            cam,
            ..Self::default()
        }
    }

    pub fn allocate_id(&mut self) -> DeviceId {
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// 分配一个未被占用的本地管理 MAC
    pub fn allocate_mac(&mut self) -> MacAddress {
        loop {
            self.next_mac = self.next_mac.wrapping_add(1);
            let mac = MacAddress::locally_administered(self.next_mac);
            if !self.by_mac.contains_key(&mac) {
                return mac;
            }
        }
    }

    /// 注册设备。相同 id 的旧设备被静默覆盖（后写者胜）。
    ///
    /// 新旧设备都有端口时沿用旧端口表，连接图中记录的端口号保持有效；
    /// 端口模型不同的替换应经由 `Network::add_device`，先拆除旧链路。
    pub fn add(&mut self, mut device: Device) -> DeviceId {
        let id = device.id();
        if let Some(mut old) = self.devices.remove(&id) {
            debug!(%id, old_name = %old.name(), "覆盖已注册设备");
            if let (Some(from), Some(to)) = (old.ports_mut(), device.ports_mut()) {
                *to = std::mem::take(from);
            }
            self.unindex(&old);
        }
        if let Some(other) = self.by_mac.insert(device.mac(), id) {
            if other != id {
                warn!(mac = %device.mac(), previous = %other, now = %id, "MAC 索引被新设备接管");
            }
        }
        match device.kind() {
            DeviceKind::Router => self.routers.push(id),
            DeviceKind::Switch => self.switches.push(id),
            DeviceKind::Pc => self.pcs.push(id),
        }
        self.next_id = self.next_id.max(id.0 + 1);
        info!(%id, kind = %device.kind(), name = %device.name(), mac = %device.mac(), "注册设备");
        self.devices.insert(id, device);
        id
    }

    fn unindex(&mut self, old: &Device) {
        let id = old.id();
        if self.by_mac.get(&old.mac()) == Some(&id) {
            self.by_mac.remove(&old.mac());
        }
        let typed = match old.kind() {
            DeviceKind::Router => &mut self.routers,
            DeviceKind::Switch => &mut self.switches,
            DeviceKind::Pc => &mut self.pcs,
        };
        typed.retain(|d| *d != id);
    }

    /// 按种类创建并注册设备；`name` 为 None 时自动命名，`mac` 为 None 时自动分配
    pub fn create(
        &mut self,
        kind: DeviceKind,
        name: Option<String>,
        mac: Option<MacAddress>,
    ) -> DeviceId {
        let id = self.allocate_id();
        let mac = mac.unwrap_or_else(|| self.allocate_mac());
        let name = name.unwrap_or_else(|| self.names.next(kind));
        let device = match kind {
            DeviceKind::Router => Device::router(id, mac, name),
            DeviceKind::Switch => Device::switch(id, mac, name, self.cam),
            DeviceKind::Pc => Device::pc(id, mac, name),
        };
        self.add(device)
    }

    /// 以自动名称创建设备
    pub fn spawn(&mut self, kind: DeviceKind) -> DeviceId {
        self.create(kind, None, None)
    }

    pub fn add_router(&mut self, name: impl Into<String>) -> DeviceId {
        self.create(DeviceKind::Router, Some(name.into()), None)
    }

    pub fn add_switch(&mut self, name: impl Into<String>) -> DeviceId {
        self.create(DeviceKind::Switch, Some(name.into()), None)
    }

    pub fn add_pc(&mut self, name: impl Into<String>) -> DeviceId {
        self.create(DeviceKind::Pc, Some(name.into()), None)
    }

    pub fn get(&self, id: DeviceId) -> NetResult<&Device> {
        self.devices
            .get(&id)
            .ok_or_else(|| NetError::NotFound(format!("device {id}")))
    }

    pub fn get_mut(&mut self, id: DeviceId) -> NetResult<&mut Device> {
        self.devices
            .get_mut(&id)
            .ok_or_else(|| NetError::NotFound(format!("device {id}")))
    }

    pub fn id_by_mac(&self, mac: &MacAddress) -> NetResult<DeviceId> {
        self.by_mac
            .get(mac)
            .copied()
            .ok_or_else(|| NetError::NotFound(format!("device with MAC {mac}")))
    }

    pub fn get_by_mac(&self, mac: &MacAddress) -> NetResult<&Device> {
        self.get(self.id_by_mac(mac)?)
    }

    /// 找到配置了 `ip` 的设备（id 最小者）
    pub fn find_by_ip(&self, ip: Ipv4Address) -> NetResult<&Device> {
        self.devices
            .values()
            .find(|d| d.owns_ip(ip))
            .ok_or_else(|| NetError::NotFound(format!("device with IP {ip}")))
    }

    pub fn find_by_name(&self, name: &str) -> NetResult<&Device> {
        self.devices
            .values()
            .find(|d| d.name() == name)
            .ok_or_else(|| NetError::NotFound(format!("device named {name:?}")))
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// 按 id 顺序遍历全部设备
    pub fn iter(&self) -> impl Iterator<Item = &Device> + '_ {
        self.devices.values()
    }

    pub fn routers(&self) -> impl Iterator<Item = &Device> + '_ {
        self.typed(&self.routers)
    }

    pub fn switches(&self) -> impl Iterator<Item = &Device> + '_ {
        self.typed(&self.switches)
    }

    pub fn pcs(&self) -> impl Iterator<Item = &Device> + '_ {
        self.typed(&self.pcs)
    }

    fn typed<'a>(&'a self, ids: &'a [DeviceId]) -> impl Iterator<Item = &'a Device> + 'a {
        ids.iter().filter_map(|id| self.devices.get(id))
    }

    pub fn switch_ids(&self) -> &[DeviceId] {
        &self.switches
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
