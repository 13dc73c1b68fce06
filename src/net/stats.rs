//! 统计信息
//!
//! 定义帧转发统计数据结构。

use serde::Serialize;

/// 转发统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub sent_frames: u64,
    pub delivered_frames: u64,
    pub dropped_frames: u64,
    pub flooded_frames: u64,
    pub forwarded_hops: u64,
}
