//! 仿真引擎
//!
//! 状态机：`Idle -> Running <-> Paused -> Stopped`。引擎不自带时钟，
//! 由外部通过 `send_*` / `step` / `run` 显式驱动；每转发一跳逻辑时间前进一步。
//! 交换机在转发过程中学习源 MAC，路由器按最长前缀匹配转发并改写 MAC。

use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::event::{DropReason, EngineEvent, EngineEventKind, EngineObserver};
use super::scheduled_event::{FrameArrival, ScheduledEvent};
use super::time::SimTime;
use crate::net::{
    CamLookup, DeviceId, DeviceKind, Frame, InterfaceId, Ipv4Address, Ipv4Prefix, Link,
    MacAddress, NetError, NetResult, Network, Packet, Port, Renumbered, Route, Stats, SwitchState,
};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Stopped => "stopped",
        })
    }
}

/// 引擎配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 新建数据包的 TTL
    #[serde(default = "default_ttl")]
    pub default_ttl: u8,
    /// `run` 单次最多处理的事件数
    #[serde(default = "default_max_steps")]
    pub max_steps_per_run: u64,
}

fn default_ttl() -> u8 {
    64
}

fn default_max_steps() -> u64 {
    100_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            max_steps_per_run: default_max_steps(),
        }
    }
}

/// 路由器对一个到达帧的处理结论
enum RouterDecision {
    Drop(DropReason),
    Deliver,
    Forward {
        next: DeviceId,
        interface: InterfaceId,
        dst: Ipv4Address,
        frame: Frame,
    },
}

/// 事件驱动的转发引擎：持有拓扑、待处理的帧到达事件与统计。
pub struct Engine {
    net: Network,
    config: EngineConfig,
    state: EngineState,
    now: SimTime,
    next_seq: u64,
    next_frame_id: u64,
    queue: BinaryHeap<ScheduledEvent>,
    observers: Vec<Box<dyn EngineObserver>>,
    pub stats: Stats,
}

impl Engine {
    pub fn new(net: Network, config: EngineConfig) -> Self {
        Self {
            net,
            config,
            state: EngineState::Idle,
            now: SimTime::ZERO,
            next_seq: 0,
            next_frame_id: 0,
            queue: BinaryHeap::new(),
            observers: Vec::new(),
            stats: Stats::default(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn set_max_steps_per_run(&mut self, max_steps: u64) {
        self.config.max_steps_per_run = max_steps;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 尚未处理的帧到达事件数
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn simulation_started(&self) -> bool {
        self.state != EngineState::Idle
    }

    pub fn simulation_paused(&self) -> bool {
        self.state == EngineState::Paused
    }

    /// 注册观察者
    pub fn subscribe(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, kind: EngineEventKind) {
        let ev = EngineEvent {
            tick: self.now.0,
            kind,
        };
        for o in &mut self.observers {
            o.on_event(&ev);
        }
    }

    fn transition(&mut self, to: EngineState) {
        let from = self.state;
        self.state = to;
        info!(%from, %to, "引擎状态迁移");
        self.emit(EngineEventKind::StateChanged { from, to });
    }

    /// 仅允许从 `Idle` 启动
    pub fn start(&mut self) -> NetResult<()> {
        if self.state != EngineState::Idle {
            return Err(NetError::SimulationNotActive(self.state));
        }
        self.transition(EngineState::Running);
        Ok(())
    }

    /// `Running -> Paused`；已暂停时为空操作
    pub fn pause(&mut self) -> NetResult<()> {
        match self.state {
            EngineState::Running => self.transition(EngineState::Paused),
            EngineState::Paused => {}
            other => return Err(NetError::SimulationNotActive(other)),
        }
        Ok(())
    }

    /// `Paused -> Running`；已在运行时为空操作
    pub fn resume(&mut self) -> NetResult<()> {
        match self.state {
            EngineState::Paused => self.transition(EngineState::Running),
            EngineState::Running => {}
            other => return Err(NetError::SimulationNotActive(other)),
        }
        Ok(())
    }

    /// 结束仿真并丢弃未处理的事件；已停止时为空操作
    pub fn stop(&mut self) -> NetResult<()> {
        match self.state {
            EngineState::Running | EngineState::Paused => {
                let discarded = self.queue.len();
                self.queue.clear();
                debug!(discarded, "丢弃未处理事件");
                self.transition(EngineState::Stopped);
            }
            EngineState::Stopped => {}
            EngineState::Idle => return Err(NetError::SimulationNotActive(EngineState::Idle)),
        }
        Ok(())
    }

    /// 回到 `Idle`：清空事件队列与统计，保留拓扑与已学习的表项
    pub fn reset(&mut self) {
        self.queue.clear();
        self.stats = Stats::default();
        if self.state != EngineState::Idle {
            self.transition(EngineState::Idle);
        }
    }

    fn ensure_running(&self) -> NetResult<()> {
        if self.state == EngineState::Running {
            Ok(())
        } else {
            Err(NetError::SimulationNotActive(self.state))
        }
    }

    fn alloc_frame_id(&mut self) -> u64 {
        let id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        id
    }

    /// 调度帧在下一步到达 `to`
    fn schedule(&mut self, to: DeviceId, from: Option<DeviceId>, frame: Frame) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let at = self.now.after(1);
        trace!(now = self.now.0, at = at.0, seq, %to, frame_id = frame.id, "调度帧到达");
        self.queue.push(ScheduledEvent {
            at,
            seq,
            arrival: FrameArrival { to, from, frame },
        });
    }

    /// 从 `from` 的所有链路发出帧，返回帧 id
    fn emit_from(&mut self, from: DeviceId, frame: Frame) -> NetResult<u64> {
        let neighbors: Vec<DeviceId> = self.net.graph.neighbors(from).collect();
        if neighbors.is_empty() {
            return Err(NetError::InvalidTopology(format!("{from} has no links")));
        }
        let id = frame.id;
        self.stats.sent_frames += 1;
        self.emit(EngineEventKind::FrameSent {
            frame_id: id,
            device: from,
            dst_mac: frame.dst_mac,
        });
        for n in neighbors {
            self.schedule(n, Some(from), frame.clone());
        }
        Ok(id)
    }

    /// 由设备 `from` 发出一个二层帧
    #[tracing::instrument(skip(self))]
    pub fn send_frame(&mut self, from: DeviceId, dst_mac: MacAddress) -> NetResult<u64> {
        self.ensure_running()?;
        let src_mac = self.net.registry.get(from)?.mac();
        let frame = Frame::new(self.alloc_frame_id(), src_mac, dst_mac);
        info!(frame_id = frame.id, %src_mac, %dst_mac, "发送帧");
        self.emit_from(from, frame)
    }

    /// 由 PC `from` 发出一个 IP 数据包。
    ///
    /// 目的地址在本子网时直接解析其 MAC，否则发往默认网关。
    #[tracing::instrument(skip(self))]
    pub fn send_packet(&mut self, from: DeviceId, dst_ip: Ipv4Address) -> NetResult<u64> {
        self.ensure_running()?;
        let dev = self.net.registry.get(from)?;
        let src_mac = dev.mac();
        let pc = dev
            .as_pc()
            .ok_or_else(|| NetError::InvalidTopology(format!("{} is not a PC", dev.name())))?;
        let ip = pc
            .ip
            .ok_or_else(|| NetError::InvalidAddress(format!("{} has no IP address", dev.name())))?;
        let next_ip = if ip.same_subnet(dst_ip) {
            dst_ip
        } else {
            pc.gateway.ok_or(NetError::NoRoute(dst_ip))?
        };
        let dst_mac = self.net.registry.find_by_ip(next_ip)?.mac();
        let packet = Packet {
            src_ip: ip.address,
            dst_ip,
            ttl: self.config.default_ttl,
        };
        let frame = Frame::new(self.alloc_frame_id(), src_mac, dst_mac).with_packet(packet);
        info!(frame_id = frame.id, src_ip = %ip.address, %dst_ip, %dst_mac, "发送数据包");
        self.emit_from(from, frame)
    }

    /// 把一个帧直接交给设备 `to`，`from` 为入口方向的相邻设备
    pub fn inject(&mut self, to: DeviceId, from: Option<DeviceId>, frame: Frame) -> NetResult<()> {
        self.ensure_running()?;
        self.net.registry.get(to)?;
        if let Some(f) = from {
            if !self.net.graph.are_connected(f, to) {
                return Err(NetError::InvalidTopology(format!(
                    "{f} is not connected to {to}"
                )));
            }
        }
        self.schedule(to, from, frame);
        Ok(())
    }

    /// 处理下一个事件；队列为空时返回 `Ok(false)`
    pub fn step(&mut self) -> NetResult<bool> {
        self.ensure_running()?;
        let Some(item) = self.queue.pop() else {
            return Ok(false);
        };
        self.now = self.now.max(item.at);
        self.process(item.arrival)?;
        Ok(true)
    }

    /// 连续处理事件直到队列为空（或达到单次上限），返回处理的事件数
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> NetResult<u64> {
        info!("▶️  开始运行仿真");
        let mut steps = 0;
        while steps < self.config.max_steps_per_run && self.step()? {
            steps += 1;
        }
        info!(
            steps,
            now = self.now.0,
            remaining = self.queue.len(),
            "✅ 队列处理结束"
        );
        Ok(steps)
    }

    /// 安装静态路由并通知观察者；任何状态下都可调用
    pub fn add_route(&mut self, router: DeviceId, route: Route) -> NetResult<()> {
        self.net.add_route(router, route)?;
        self.emit(EngineEventKind::RouteInstalled { router, route });
        Ok(())
    }

    pub fn remove_route(
        &mut self,
        router: DeviceId,
        prefix: Ipv4Prefix,
        interface: InterfaceId,
    ) -> NetResult<Route> {
        let route = self.net.remove_route(router, prefix, interface)?;
        self.emit(EngineEventKind::RouteRemoved { router, route });
        Ok(route)
    }

    /// 修改路由器接口地址；直连路由迁移时依次通知 `RouteRemoved` 与 `RouteInstalled`
    pub fn increment_interface_octet(
        &mut self,
        router: DeviceId,
        interface: InterfaceId,
        octet: usize,
        delta: i32,
    ) -> NetResult<Renumbered> {
        let renumbered = self
            .net
            .increment_interface_octet(router, interface, octet, delta)?;
        if let Some(route) = renumbered.removed {
            self.emit(EngineEventKind::RouteRemoved { router, route });
        }
        if let Some(route) = renumbered.installed {
            self.emit(EngineEventKind::RouteInstalled { router, route });
        }
        Ok(renumbered)
    }

    /// 拆除链路，并为交换机在释放端口上遗忘的每个 MAC 通知观察者
    pub fn disconnect(&mut self, a: DeviceId, b: DeviceId) -> NetResult<Link> {
        let mut forgotten = Vec::new();
        for (dev, peer) in [(a, b), (b, a)] {
            let Some(port) = self.net.graph.port_towards(dev, peer) else {
                continue;
            };
            if let Some(sw) = self.net.registry.get(dev)?.as_switch() {
                forgotten.extend(
                    sw.cam()
                        .entries()
                        .into_iter()
                        .filter(|(_, e)| e.port == port)
                        .map(|(mac, _)| (dev, mac, port)),
                );
            }
        }
        let link = self.net.disconnect(a, b)?;
        for (switch, mac, port) in forgotten {
            self.emit(EngineEventKind::MacForgotten { switch, mac, port });
        }
        Ok(link)
    }

    /// 逻辑时间前进 `ticks` 步并执行一次 CAM 老化
    pub fn advance(&mut self, ticks: u64) -> Vec<(DeviceId, MacAddress)> {
        self.now = self.now.after(ticks);
        self.age_cam_tables()
    }

    /// 以当前时间清理所有交换机的过期 CAM 表项
    pub fn age_cam_tables(&mut self) -> Vec<(DeviceId, MacAddress)> {
        let now = self.now;
        let switches = self.net.registry.switch_ids().to_vec();
        let mut aged = Vec::new();
        for id in switches {
            let Ok(dev) = self.net.registry.get_mut(id) else {
                continue;
            };
            if let Some(sw) = dev.as_switch_mut() {
                aged.extend(sw.cam.age_entries(now).into_iter().map(|mac| (id, mac)));
            }
        }
        for &(switch, mac) in &aged {
            self.emit(EngineEventKind::MacAged { switch, mac });
        }
        aged
    }

    #[tracing::instrument(skip(self, arrival), fields(frame_id = arrival.frame.id, to = %arrival.to))]
    fn process(&mut self, arrival: FrameArrival) -> NetResult<()> {
        let FrameArrival { to, from, frame } = arrival;
        let frame = frame.advance();
        trace!(from = ?from, hops_taken = frame.hops_taken, "帧到达设备");
        if let Some(f) = from {
            if !self.net.graph.are_connected(f, to) {
                self.drop_frame(to, frame.id, DropReason::LinkDown);
                return Ok(());
            }
        }
        let kind = self.net.registry.get(to)?.kind();
        match kind {
            DeviceKind::Switch => self.on_switch(to, from, frame),
            DeviceKind::Router => self.on_router(to, frame),
            DeviceKind::Pc => self.on_pc(to, frame),
        }
    }

    fn switch_mut(&mut self, id: DeviceId) -> NetResult<&mut SwitchState> {
        let dev = self.net.registry.get_mut(id)?;
        let name = dev.name().to_string();
        dev.as_switch_mut()
            .ok_or_else(|| NetError::InvalidTopology(format!("{name} is not a switch")))
    }

    fn on_switch(&mut self, at: DeviceId, from: Option<DeviceId>, frame: Frame) -> NetResult<()> {
        debug!("🔀 Switch 处理帧");
        let ingress = from.and_then(|f| self.net.graph.port_towards(at, f));
        let now = self.now;

        let learned = match ingress {
            Some(port) if !frame.src_mac.is_broadcast() => {
                let prev = self
                    .switch_mut(at)?
                    .cam
                    .learn_mac_address(frame.src_mac, port, now);
                match prev {
                    Some(e) if e.port == port => None,
                    other => Some((port, other.map(|e| e.port))),
                }
            }
            _ => None,
        };
        if let Some((port, previous)) = learned {
            self.emit(EngineEventKind::MacLearned {
                switch: at,
                mac: frame.src_mac,
                port,
                previous,
            });
        }

        let lookup = self.switch_mut(at)?.cam.lookup(&frame.dst_mac);
        match lookup {
            CamLookup::Port(p) if Some(p) == ingress => {
                self.drop_frame(at, frame.id, DropReason::Filtered);
            }
            CamLookup::Port(p) => match self.net.graph.neighbor_on_port(at, p) {
                Some(next) => self.forward(at, next, frame),
                None => {
                    self.switch_mut(at)?.cam.forget_mac_address(&frame.dst_mac);
                    self.flood(at, ingress, frame);
                }
            },
            CamLookup::Flood => self.flood(at, ingress, frame),
        }
        Ok(())
    }

    /// 从除入端口外的所有端口泛洪
    fn flood(&mut self, at: DeviceId, ingress: Option<Port>, frame: Frame) {
        let targets: Vec<(Port, DeviceId)> = self
            .net
            .graph
            .ports_of(at)
            .into_iter()
            .filter(|(p, _)| Some(*p) != ingress)
            .collect();
        debug!(targets = targets.len(), "泛洪");
        self.stats.flooded_frames += 1;
        self.emit(EngineEventKind::Flooded {
            frame_id: frame.id,
            switch: at,
            ports: targets.iter().map(|(p, _)| *p).collect(),
        });
        for (_, next) in targets {
            self.stats.forwarded_hops += 1;
            self.schedule(next, Some(at), frame.clone());
        }
    }

    fn forward(&mut self, from: DeviceId, to: DeviceId, frame: Frame) {
        debug!(%from, %to, "转发到下一跳");
        self.stats.forwarded_hops += 1;
        self.emit(EngineEventKind::Forwarded {
            frame_id: frame.id,
            from,
            to,
        });
        self.schedule(to, Some(from), frame);
    }

    fn on_router(&mut self, at: DeviceId, frame: Frame) -> NetResult<()> {
        debug!("🧭 Router 处理帧");
        let decision = {
            let dev = self.net.registry.get(at)?;
            let router = dev.as_router().ok_or_else(|| {
                NetError::InvalidTopology(format!("{} is not a router", dev.name()))
            })?;
            if frame.dst_mac != dev.mac() && !frame.is_broadcast() {
                RouterDecision::Drop(DropReason::NotForUs)
            } else {
                match frame.packet {
                    None => RouterDecision::Deliver,
                    Some(p) if router.owns_ip(p.dst_ip) || frame.is_broadcast() => {
                        RouterDecision::Deliver
                    }
                    Some(p) if p.ttl <= 1 => RouterDecision::Drop(DropReason::TtlExpired),
                    Some(mut p) => match router.routes.route(p.dst_ip) {
                        Err(_) => RouterDecision::Drop(DropReason::NoRoute),
                        Ok(route) => {
                            let next_ip = route.next_hop.unwrap_or(p.dst_ip);
                            match (
                                self.net.graph.neighbor_on_port(at, route.interface.port()),
                                self.net.registry.find_by_ip(next_ip),
                            ) {
                                (None, _) => RouterDecision::Drop(DropReason::InterfaceDown),
                                (Some(_), Err(_)) => RouterDecision::Drop(DropReason::Unresolved),
                                (Some(next), Ok(hop)) => {
                                    p.ttl -= 1;
                                    RouterDecision::Forward {
                                        next,
                                        interface: route.interface,
                                        dst: p.dst_ip,
                                        frame: Frame {
                                            id: frame.id,
                                            src_mac: dev.mac(),
                                            dst_mac: hop.mac(),
                                            packet: Some(p),
                                            hops_taken: frame.hops_taken,
                                        },
                                    }
                                }
                            }
                        }
                    },
                }
            }
        };

        match decision {
            RouterDecision::Drop(reason) => self.drop_frame(at, frame.id, reason),
            RouterDecision::Deliver => self.deliver(at, frame.id),
            RouterDecision::Forward {
                next,
                interface,
                dst,
                frame,
            } => {
                self.emit(EngineEventKind::Routed {
                    frame_id: frame.id,
                    router: at,
                    dst,
                    interface,
                });
                self.forward(at, next, frame);
            }
        }
        Ok(())
    }

    fn on_pc(&mut self, at: DeviceId, frame: Frame) -> NetResult<()> {
        debug!("🖥️  PC 处理帧");
        let mac = self.net.registry.get(at)?.mac();
        if frame.dst_mac == mac || frame.is_broadcast() {
            self.deliver(at, frame.id);
        } else {
            self.drop_frame(at, frame.id, DropReason::NotForUs);
        }
        Ok(())
    }

    fn deliver(&mut self, at: DeviceId, frame_id: u64) {
        info!(%at, frame_id, "✅ 帧送达");
        self.stats.delivered_frames += 1;
        self.emit(EngineEventKind::Delivered {
            frame_id,
            device: at,
        });
    }

    fn drop_frame(&mut self, at: DeviceId, frame_id: u64, reason: DropReason) {
        debug!(%at, frame_id, ?reason, "丢弃帧");
        self.stats.dropped_frames += 1;
        self.emit(EngineEventKind::Dropped {
            frame_id,
            device: at,
            reason,
        });
    }
}
