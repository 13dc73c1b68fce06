//! 仿真时间类型
//!
//! 仿真是离散的逻辑过程：时间以“步”（tick）计，每转发一跳前进一步，不对应真实线路时延。

use serde::{Deserialize, Serialize};

/// 逻辑仿真时间（tick 数）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// `ticks` 步之后的时刻（饱和加法）
    pub fn after(self, ticks: u64) -> SimTime {
        SimTime(self.0.saturating_add(ticks))
    }

    /// 距 `earlier` 经过的步数；`earlier` 更晚时为 0
    pub fn since(self, earlier: SimTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
