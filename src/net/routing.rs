//! 静态路由表
//!
//! 路由器按“最长前缀匹配”选择出接口；前缀长度相同时选择编号最小的接口，
//! 保证同一张表对同一目的地址总是给出同一个结果。
//! 表项只通过管理操作增删（含接口配置时自动安装的直连路由），不运行动态路由协议。

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::addr::{Ipv4Address, Ipv4Prefix};
use super::error::{NetError, NetResult};
use super::id::InterfaceId;

/// 一条路由：目的前缀 -> (出接口, 下一跳)。`next_hop` 为 None 表示直连网络。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: Ipv4Prefix,
    pub interface: InterfaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<Ipv4Address>,
}

impl Route {
    pub fn connected(prefix: Ipv4Prefix, interface: InterfaceId) -> Self {
        Self {
            prefix,
            interface,
            next_hop: None,
        }
    }

    pub fn via(prefix: Ipv4Prefix, interface: InterfaceId, next_hop: Ipv4Address) -> Self {
        Self {
            prefix,
            interface,
            next_hop: Some(next_hop),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装路由。相同 (前缀, 接口) 的旧表项被替换并返回。
    pub fn add_route(&mut self, route: Route) -> Option<Route> {
        if let Some(slot) = self
            .routes
            .iter_mut()
            .find(|r| r.prefix == route.prefix && r.interface == route.interface)
        {
            return Some(std::mem::replace(slot, route));
        }
        self.routes.push(route);
        None
    }

    /// 删除 (前缀, 接口) 对应的表项
    pub fn remove_route(&mut self, prefix: Ipv4Prefix, interface: InterfaceId) -> Option<Route> {
        let idx = self
            .routes
            .iter()
            .position(|r| r.prefix == prefix && r.interface == interface)?;
        Some(self.routes.remove(idx))
    }

    /// 最长前缀匹配；无匹配返回 `NoRoute`。
    pub fn route(&self, dst: Ipv4Address) -> NetResult<&Route> {
        let best = self
            .routes
            .iter()
            .filter(|r| r.prefix.contains(dst))
            .max_by(|a, b| {
                a.prefix
                    .prefix_len()
                    .cmp(&b.prefix.prefix_len())
                    .then_with(|| b.interface.cmp(&a.interface))
            })
            .ok_or(NetError::NoRoute(dst))?;
        trace!(%dst, prefix = %best.prefix, interface = %best.interface, "路由命中");
        Ok(best)
    }

    pub fn entries(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
