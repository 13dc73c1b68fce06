//! 帧与数据包
//!
//! 二层帧携带源/目的 MAC，可选地封装一个三层数据包（源/目的 IP + TTL）。

use serde::{Deserialize, Serialize};

use super::addr::{Ipv4Address, MacAddress};

/// 三层数据包
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub src_ip: Ipv4Address,
    pub dst_ip: Ipv4Address,
    pub ttl: u8,
}

/// 二层帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<Packet>,
    /// 已经过的跳数
    #[serde(default)]
    pub hops_taken: u32,
}

impl Frame {
    pub fn new(id: u64, src_mac: MacAddress, dst_mac: MacAddress) -> Self {
        Self {
            id,
            src_mac,
            dst_mac,
            packet: None,
            hops_taken: 0,
        }
    }

    pub fn with_packet(mut self, packet: Packet) -> Self {
        self.packet = Some(packet);
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst_mac.is_broadcast()
    }

    /// 前进一跳
    pub fn advance(mut self) -> Self {
        self.hops_taken += 1;
        self
    }
}
