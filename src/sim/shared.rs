//! 可跨线程共享的引擎句柄
//!
//! 所有修改都在同一把锁内串行执行；读操作拷贝出快照后立即释放锁。

use std::sync::{Arc, Mutex, PoisonError};

use super::engine::{Engine, EngineState};
use crate::net::{CamEntry, DeviceId, MacAddress, NetError, NetResult, TopologySnapshot};

#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// 在锁内对引擎执行 `f`
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn state(&self) -> EngineState {
        self.with(|e| e.state())
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.with(|e| e.network().snapshot())
    }

    /// 交换机 CAM 表的拷贝
    pub fn cam_entries(&self, switch: DeviceId) -> NetResult<Vec<(MacAddress, CamEntry)>> {
        self.with(|e| -> NetResult<Vec<(MacAddress, CamEntry)>> {
            let dev = e.network().registry.get(switch)?;
            dev.as_switch()
                .map(|s| s.cam().entries())
                .ok_or_else(|| NetError::InvalidTopology(format!("{} is not a switch", dev.name())))
        })
    }
}
