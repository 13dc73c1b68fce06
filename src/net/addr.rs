//! 地址类型
//!
//! IPv4 地址、前缀、接口地址与 MAC 地址的值类型。
//! 均以字符串形式（`10.0.0.1`、`10.0.0.0/24`、`02:00:00:00:00:01`）做 JSON 序列化。

use super::error::{NetError, NetResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IPv4 地址，`octets[0]` 为最高字节（大端序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Address {
    octets: [u8; 4],
}

impl Ipv4Address {
    /// 由四个字节构造；任一字节超出 0..=255 时返回 `InvalidAddress`
    pub fn new(o1: u32, o2: u32, o3: u32, o4: u32) -> NetResult<Self> {
        let mut octets = [0u8; 4];
        for (slot, value) in octets.iter_mut().zip([o1, o2, o3, o4]) {
            *slot = u8::try_from(value).map_err(|_| {
                NetError::InvalidAddress(format!(
                    "octet {value} out of range in {o1}.{o2}.{o3}.{o4}"
                ))
            })?;
        }
        Ok(Self { octets })
    }

    pub const fn from_octets(octets: [u8; 4]) -> Self {
        Self { octets }
    }

    pub fn octets(&self) -> [u8; 4] {
        self.octets
    }

    /// 按大端序打包为 32 位无符号整数
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.octets)
    }

    /// `to_u32` 的逆运算
    pub fn from_u32(v: u32) -> Self {
        Self {
            octets: v.to_be_bytes(),
        }
    }

    /// 原地修改第 `index` 个字节（1..=4）；序号越界时不做任何修改。
    ///
    /// 溢出按 256 取模回绕：`255 + 1 == 0`，`0 - 1 == 255`，不会进位到相邻字节。
    pub fn increment_octet(&mut self, index: usize, delta: i32) {
        let Some(slot) = index.checked_sub(1).and_then(|i| self.octets.get_mut(i)) else {
            return;
        };
        *slot = i32::from(*slot).wrapping_add(delta).rem_euclid(256) as u8;
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl FromStr for Ipv4Address {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetError::InvalidAddress(format!("malformed IPv4 address {s:?}"));
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        let mut octets = [0u8; 4];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse::<u8>().map_err(|_| invalid())?;
        }
        Ok(Self { octets })
    }
}

impl TryFrom<String> for Ipv4Address {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Address> for String {
    fn from(ip: Ipv4Address) -> Self {
        ip.to_string()
    }
}

fn prefix_mask(len: u8) -> u32 {
    if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len.min(32))) }
}

/// 网络前缀（网络地址 + 前缀长度），网络地址的主机位恒为 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    network: Ipv4Address,
    len: u8,
}

impl Ipv4Prefix {
    /// 由任意地址和前缀长度构造，主机位被清零；长度超过 32 返回 `InvalidAddress`
    pub fn new(addr: Ipv4Address, len: u8) -> NetResult<Self> {
        if len > 32 {
            return Err(NetError::InvalidAddress(format!(
                "prefix length {len} exceeds 32"
            )));
        }
        Ok(Self::masked(addr, len))
    }

    fn masked(addr: Ipv4Address, len: u8) -> Self {
        let len = len.min(32);
        Self {
            network: Ipv4Address::from_u32(addr.to_u32() & prefix_mask(len)),
            len,
        }
    }

    pub fn network(&self) -> Ipv4Address {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn contains(&self, ip: Ipv4Address) -> bool {
        ip.to_u32() & prefix_mask(self.len) == self.network.to_u32()
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

/// 拆分 `a.b.c.d/n` 形式
fn split_cidr(s: &str) -> NetResult<(Ipv4Address, u8)> {
    let (addr, len) = s
        .trim()
        .split_once('/')
        .ok_or_else(|| NetError::InvalidAddress(format!("missing prefix length in {s:?}")))?;
    let malformed = || NetError::InvalidAddress(format!("malformed prefix length in {s:?}"));
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let len = len.parse::<u8>().map_err(|_| malformed())?;
    Ok((addr.parse()?, len))
}

impl FromStr for Ipv4Prefix {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = split_cidr(s)?;
        Self::new(addr, len)
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(p: Ipv4Prefix) -> Self {
        p.to_string()
    }
}

/// 接口地址：主机地址 + 所在子网的前缀长度（如 `10.0.0.1/24`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Interface {
    pub address: Ipv4Address,
    prefix_len: u8,
}

impl Ipv4Interface {
    pub fn new(address: Ipv4Address, prefix_len: u8) -> NetResult<Self> {
        if prefix_len > 32 {
            return Err(NetError::InvalidAddress(format!(
                "prefix length {prefix_len} exceeds 32"
            )));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// 接口所在的子网
    pub fn network(&self) -> Ipv4Prefix {
        Ipv4Prefix::masked(self.address, self.prefix_len)
    }

    pub fn same_subnet(&self, ip: Ipv4Address) -> bool {
        self.network().contains(ip)
    }
}

impl fmt::Display for Ipv4Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Interface {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = split_cidr(s)?;
        Self::new(addr, len)
    }
}

impl TryFrom<String> for Ipv4Interface {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Interface> for String {
    fn from(i: Ipv4Interface) -> Self {
        i.to_string()
    }
}

/// 48 位 MAC 地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// 本地管理地址 `02:00:00:xx:xx:xx`，低 24 位取自 `n`
    pub fn locally_administered(n: u32) -> Self {
        let [_, a, b, c] = n.to_be_bytes();
        Self([0x02, 0x00, 0x00, a, b, c])
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// 稳定的字符串形式（小写、冒号分隔），可作为索引键
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = NetError;

    /// 接受 `aa:bb:cc:dd:ee:ff`、`aa-bb-cc-dd-ee-ff` 与 `aabb.ccdd.eeff` 三种写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetError::InvalidAddress(format!("malformed MAC address {s:?}"));
        let s = s.trim();
        let hex_pairs: Vec<String> = if s.contains('.') {
            let groups: Vec<&str> = s.split('.').collect();
            if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                return Err(invalid());
            }
            let joined = groups.concat();
            joined
                .as_bytes()
                .chunks(2)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect()
        } else {
            let sep = match (s.contains(':'), s.contains('-')) {
                (true, false) => ':',
                (false, true) => '-',
                _ => return Err(invalid()),
            };
            s.split(sep).map(str::to_owned).collect()
        };
        if hex_pairs.len() != 6 {
            return Err(invalid());
        }
        let mut bytes = [0u8; 6];
        for (slot, pair) in bytes.iter_mut().zip(&hex_pairs) {
            if pair.len() != 2 || !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}
