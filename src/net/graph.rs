//! 连接图
//!
//! 设备之间的无向链路集合（一根线缆一条边，同一对设备之间不允许重复）。
//! 连接时为交换机/路由器一端分配端口，并在设备上记录 `SwitchConnection`；
//! 断开时释放端口，交换机遗忘该端口上学到的 MAC。

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::device::DeviceKind;
use super::error::{NetError, NetResult};
use super::id::{DeviceId, LinkId, Port};
use super::registry::DeviceRegistry;

/// 链路的一端；`port` 为 None 表示无端口概念的设备（PC 网卡）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub device: DeviceId,
    pub port: Option<Port>,
}

/// 一条无向链路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub a: Endpoint,
    pub b: Endpoint,
}

impl Link {
    /// `device` 所在的一端
    pub fn endpoint(&self, device: DeviceId) -> Option<Endpoint> {
        if self.a.device == device {
            Some(self.a)
        } else if self.b.device == device {
            Some(self.b)
        } else {
            None
        }
    }

    /// `device` 对面的一端
    pub fn other(&self, device: DeviceId) -> Option<Endpoint> {
        if self.a.device == device {
            Some(self.b)
        } else if self.b.device == device {
            Some(self.a)
        } else {
            None
        }
    }
}

/// 拓扑规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRules {
    /// PC 最多一条链路。关闭后 `connect` 不再拒绝，由 `validate` 报告违规。
    #[serde(default = "default_true")]
    pub single_link_hosts: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TopologyRules {
    fn default() -> Self {
        Self {
            single_link_hosts: true,
        }
    }
}

/// `validate` 发现的拓扑违规
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyViolation {
    /// PC 的链路数超过 1
    HostFanout { device: DeviceId, links: usize },
}

#[derive(Debug, Default)]
pub struct ConnectionGraph {
    links: BTreeMap<LinkId, Link>,
    edges: HashMap<(DeviceId, DeviceId), LinkId>,
    adj: BTreeMap<DeviceId, BTreeSet<DeviceId>>,
    next_link: usize,
    rules: TopologyRules,
}

fn edge_key(a: DeviceId, b: DeviceId) -> (DeviceId, DeviceId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl ConnectionGraph {
    pub fn new(rules: TopologyRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// 连接两个已注册设备
    #[tracing::instrument(skip(self, registry))]
    pub fn connect(
        &mut self,
        registry: &mut DeviceRegistry,
        a: DeviceId,
        b: DeviceId,
    ) -> NetResult<LinkId> {
        if a == b {
            return Err(NetError::InvalidTopology(format!(
                "cannot connect {a} to itself"
            )));
        }
        let kind_a = registry.get(a)?.kind();
        let kind_b = registry.get(b)?.kind();
        if self.edges.contains_key(&edge_key(a, b)) {
            return Err(NetError::AlreadyConnected(a, b));
        }
        if self.rules.single_link_hosts {
            for (dev, kind) in [(a, kind_a), (b, kind_b)] {
                if kind == DeviceKind::Pc && self.degree(dev) >= 1 {
                    return Err(NetError::InvalidTopology(format!(
                        "{dev} is a PC and already has a link"
                    )));
                }
            }
        }

        let port_a = registry.get_mut(a)?.attach(b);
        let port_b = registry.get_mut(b)?.attach(a);

        let id = LinkId(self.next_link);
        self.next_link += 1;
        let link = Link {
            id,
            a: Endpoint {
                device: a,
                port: port_a,
            },
            b: Endpoint {
                device: b,
                port: port_b,
            },
        };
        self.links.insert(id, link);
        self.edges.insert(edge_key(a, b), id);
        self.adj.entry(a).or_default().insert(b);
        self.adj.entry(b).or_default().insert(a);
        info!(%id, ?port_a, ?port_b, "建立链路");
        Ok(id)
    }

    /// 断开两个设备；不存在链路时返回 `NotFound`
    #[tracing::instrument(skip(self, registry))]
    pub fn disconnect(
        &mut self,
        registry: &mut DeviceRegistry,
        a: DeviceId,
        b: DeviceId,
    ) -> NetResult<Link> {
        let id = self
            .edges
            .remove(&edge_key(a, b))
            .ok_or_else(|| NetError::NotFound(format!("link between {a} and {b}")))?;
        let link = self
            .links
            .remove(&id)
            .ok_or_else(|| NetError::NotFound(format!("{id}")))?;
        for (dev, peer) in [(a, b), (b, a)] {
            if let Some(set) = self.adj.get_mut(&dev) {
                set.remove(&peer);
                if set.is_empty() {
                    self.adj.remove(&dev);
                }
            }
            if let Ok(device) = registry.get_mut(dev) {
                let released = device.detach(peer);
                debug!(device = %dev, ?released, "释放端口");
            }
        }
        info!(%id, "拆除链路");
        Ok(link)
    }

    /// 相邻设备（按 id 升序）。迭代器可 `clone` 后重新遍历。
    pub fn neighbors(&self, device: DeviceId) -> impl Iterator<Item = DeviceId> + Clone + '_ {
        self.adj
            .get(&device)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn are_connected(&self, a: DeviceId, b: DeviceId) -> bool {
        self.edges.contains_key(&edge_key(a, b))
    }

    pub fn degree(&self, device: DeviceId) -> usize {
        self.adj.get(&device).map_or(0, BTreeSet::len)
    }

    pub fn link_between(&self, a: DeviceId, b: DeviceId) -> Option<&Link> {
        self.edges
            .get(&edge_key(a, b))
            .and_then(|id| self.links.get(id))
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// 全部链路（按 id 升序）
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.links.values()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// `device` 上朝向 `neighbor` 的端口
    pub fn port_towards(&self, device: DeviceId, neighbor: DeviceId) -> Option<Port> {
        self.link_between(device, neighbor)?
            .endpoint(device)?
            .port
    }

    /// 接在 `device` 的 `port` 上的对端设备
    pub fn neighbor_on_port(&self, device: DeviceId, port: Port) -> Option<DeviceId> {
        self.neighbors(device)
            .find(|&n| self.port_towards(device, n) == Some(port))
    }

    /// `device` 的全部 (端口, 对端) 对，按端口号排序；无端口的一端不出现
    pub fn ports_of(&self, device: DeviceId) -> Vec<(Port, DeviceId)> {
        let mut out: Vec<(Port, DeviceId)> = self
            .neighbors(device)
            .filter_map(|n| self.port_towards(device, n).map(|p| (p, n)))
            .collect();
        out.sort();
        out
    }

    /// 按跳数的最短路径（含起点与终点）；BFS 时邻居按 id 升序展开，结果确定。
    pub fn shortest_path(&self, from: DeviceId, to: DeviceId) -> Option<Vec<DeviceId>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut prev: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut q: VecDeque<DeviceId> = VecDeque::new();
        q.push_back(from);
        while let Some(v) = q.pop_front() {
            for n in self.neighbors(v) {
                if n == from || prev.contains_key(&n) {
                    continue;
                }
                prev.insert(n, v);
                if n == to {
                    let mut path = vec![to];
                    let mut cur = to;
                    while let Some(&p) = prev.get(&cur) {
                        path.push(p);
                        cur = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                q.push_back(n);
            }
        }
        None
    }

    /// 检查拓扑规则，返回全部违规（PC 多于一条链路）
    pub fn validate(&self, registry: &DeviceRegistry) -> Vec<TopologyViolation> {
        registry
            .pcs()
            .filter_map(|pc| {
                let links = self.degree(pc.id());
                (links > 1).then_some(TopologyViolation::HostFanout {
                    device: pc.id(),
                    links,
                })
            })
            .collect()
    }
}
