//! CAM 表（交换机 MAC 学习表）
//!
//! 每个 MAC 至多一条表项；在新端口上再次学习会覆盖旧绑定。
//! 配置了 `max_age` 时可以通过 `age_entries` 显式清理过期表项，未配置则表项永久保留直到被遗忘。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::addr::MacAddress;
use super::id::Port;
use crate::sim::SimTime;

/// CAM 老化配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CamConfig {
    /// 表项最长保留的 tick 数；None 表示不老化
    #[serde(default)]
    pub max_age: Option<u64>,
}

/// 一条 CAM 表项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CamEntry {
    pub port: Port,
    pub last_seen: SimTime,
}

/// 按目的 MAC 查表的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamLookup {
    /// 已学习到的出端口
    Port(Port),
    /// 未知目的（或广播）：从除入端口外的所有端口泛洪
    Flood,
}

#[derive(Debug, Clone, Default)]
pub struct CamTable {
    entries: HashMap<MacAddress, CamEntry>,
    max_age: Option<u64>,
}

impl CamTable {
    pub fn new(config: CamConfig) -> Self {
        Self {
            entries: HashMap::new(),
            max_age: config.max_age,
        }
    }

    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    pub fn set_max_age(&mut self, max_age: Option<u64>) {
        self.max_age = max_age;
    }

    /// 学习（或刷新）`mac` 所在端口，返回此前的表项。
    pub fn learn_mac_address(&mut self, mac: MacAddress, port: Port, now: SimTime) -> Option<CamEntry> {
        let prev = self.entries.insert(
            mac,
            CamEntry {
                port,
                last_seen: now,
            },
        );
        match prev {
            Some(old) if old.port != port => {
                debug!(%mac, from = %old.port, to = %port, "MAC 迁移到新端口");
            }
            Some(_) => trace!(%mac, %port, "刷新 MAC 表项"),
            None => debug!(%mac, %port, "学习新 MAC"),
        }
        prev
    }

    /// 删除 `mac` 的表项；表项不存在不算错误。返回是否真的删除了表项。
    pub fn forget_mac_address(&mut self, mac: &MacAddress) -> bool {
        self.entries.remove(mac).is_some()
    }

    /// 删除所有绑定在 `port` 上的表项，返回删除数量
    pub fn forget_port(&mut self, port: Port) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.port != port);
        before - self.entries.len()
    }

    pub fn lookup(&self, mac: &MacAddress) -> CamLookup {
        if mac.is_broadcast() {
            return CamLookup::Flood;
        }
        match self.entries.get(mac) {
            Some(e) => CamLookup::Port(e.port),
            None => CamLookup::Flood,
        }
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&CamEntry> {
        self.entries.get(mac)
    }

    /// 只读快照（按 MAC 排序，便于展示与比较）
    pub fn entries(&self) -> Vec<(MacAddress, CamEntry)> {
        let mut out: Vec<_> = self.entries.iter().map(|(m, e)| (*m, *e)).collect();
        out.sort_by_key(|(m, _)| *m);
        out
    }

    /// 清除在 `now` 时刻已超过 `max_age` 的表项（`now - last_seen > max_age`），返回被清除的 MAC。
    pub fn age_entries(&mut self, now: SimTime) -> Vec<MacAddress> {
        let Some(max_age) = self.max_age else {
            return Vec::new();
        };
        let mut evicted: Vec<MacAddress> = self
            .entries
            .iter()
            .filter(|(_, e)| now.since(e.last_seen) > max_age)
            .map(|(m, _)| *m)
            .collect();
        evicted.sort();
        for mac in &evicted {
            self.entries.remove(mac);
        }
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), now = now.0, "CAM 老化清理");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
