//! 仿真核心模块
//!
//! 此模块包含离散事件驱动的转发引擎：逻辑时间、调度事件、引擎状态机与观察者。

// 子模块声明
mod engine;
mod event;
mod scheduled_event;
mod shared;
mod time;

// 重新导出公共接口
pub use engine::{Engine, EngineConfig, EngineState};
pub use event::{DropReason, EngineEvent, EngineEventKind, EngineObserver, EventLog};
pub use scheduled_event::{FrameArrival, ScheduledEvent};
pub use shared::SharedEngine;
pub use time::SimTime;
