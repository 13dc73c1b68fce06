//! 调度事件
//!
//! 帧到达事件按 (到达时刻, 序列号) 排序；同一时刻按入队顺序处理。

use super::time::SimTime;
use crate::net::{DeviceId, Frame};
use std::cmp::Ordering;

/// 帧到达某个设备；`from` 为入口方向的相邻设备（由外部直接注入时为 None）
#[derive(Debug, Clone)]
pub struct FrameArrival {
    pub to: DeviceId,
    pub from: Option<DeviceId>,
    pub frame: Frame,
}

/// 排队中的帧到达
#[derive(Debug)]
pub struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) seq: u64,
    pub(crate) arrival: FrameArrival,
}

impl ScheduledEvent {
    fn key(&self) -> (SimTime, u64) {
        (self.at, self.seq)
    }
}

// 队列是 max-heap，键小者优先出队
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}
