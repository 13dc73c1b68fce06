//! 设备自动命名（Router1、Switch1、PC1 ...，每个种类独立计数）

use super::device::DeviceKind;

#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    routers: u32,
    switches: u32,
    pcs: u32,
}

impl NameGenerator {
    pub fn next(&mut self, kind: DeviceKind) -> String {
        let counter = match kind {
            DeviceKind::Router => &mut self.routers,
            DeviceKind::Switch => &mut self.switches,
            DeviceKind::Pc => &mut self.pcs,
        };
        *counter += 1;
        format!("{kind}{counter}")
    }
}
