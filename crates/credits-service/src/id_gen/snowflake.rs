//! 雪花 ID 生成器
//!
//! 64 位布局：1 位符号 | 41 位毫秒时间戳 | 5 位数据中心 | 5 位工作节点 | 12 位序列号

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::error::{CreditsError, Result};

/// 自定义纪元：2024-01-01 00:00:00 UTC
const EPOCH_MS: i64 = 1_704_067_200_000;

const WORKER_ID_BITS: u64 = 5;
const DATACENTER_ID_BITS: u64 = 5;
const SEQUENCE_BITS: u64 = 12;

const MAX_WORKER_ID: u64 = (1 << WORKER_ID_BITS) - 1;
const MAX_DATACENTER_ID: u64 = (1 << DATACENTER_ID_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_ID_SHIFT: u64 = SEQUENCE_BITS;
const DATACENTER_ID_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

/// 毫秒时钟
///
/// 测试中可替换为可控时钟
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug)]
struct State {
    last_timestamp: i64,
    sequence: i64,
}

/// 雪花 ID 生成器
///
/// 同一实例内的所有调用串行执行，返回严格递增的 ID
pub struct SnowflakeGenerator {
    datacenter_id: i64,
    worker_id: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    pub fn new(datacenter_id: u64, worker_id: u64) -> Result<Self> {
        Self::with_clock(datacenter_id, worker_id, Arc::new(SystemClock))
    }

    pub fn with_clock(datacenter_id: u64, worker_id: u64, clock: Arc<dyn Clock>) -> Result<Self> {
        if datacenter_id > MAX_DATACENTER_ID {
            return Err(CreditsError::Validation(format!(
                "datacenter_id 超出范围: {} > {}",
                datacenter_id, MAX_DATACENTER_ID
            )));
        }
        if worker_id > MAX_WORKER_ID {
            return Err(CreditsError::Validation(format!(
                "worker_id 超出范围: {} > {}",
                worker_id, MAX_WORKER_ID
            )));
        }

        Ok(Self {
            datacenter_id: datacenter_id as i64,
            worker_id: worker_id as i64,
            clock,
            state: Mutex::new(State {
                last_timestamp: -1,
                sequence: 0,
            }),
        })
    }

    /// 生成下一个 ID
    ///
    /// 时钟回拨时返回错误，不会生成降级 ID
    pub fn next_id(&self) -> Result<i64> {
        let mut state = self.state.lock();
        let mut timestamp = self.clock.now_millis();

        if timestamp < state.last_timestamp {
            error!(
                last_timestamp = state.last_timestamp,
                now = timestamp,
                "Clock moved backwards, refusing to generate id"
            );
            return Err(CreditsError::ClockMovedBackwards {
                last_timestamp: state.last_timestamp,
                now: timestamp,
            });
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // 当前毫秒序列号用尽，自旋到下一毫秒
                timestamp = self.wait_next_millis(state.last_timestamp)?;
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        Ok(((timestamp - EPOCH_MS) << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_ID_SHIFT)
            | (self.worker_id << WORKER_ID_SHIFT)
            | state.sequence)
    }

    /// 生成字符串形式的 ID，用作积分流水的订单号
    pub fn next_order_id(&self) -> Result<String> {
        Ok(self.next_id()?.to_string())
    }

    /// 商城订单号：G + 雪花 ID
    pub fn next_goods_order_id(&self) -> Result<String> {
        Ok(format!("G{}", self.next_id()?))
    }

    fn wait_next_millis(&self, last_timestamp: i64) -> Result<i64> {
        loop {
            let now = self.clock.now_millis();
            if now > last_timestamp {
                return Ok(now);
            }
            if now < last_timestamp {
                return Err(CreditsError::ClockMovedBackwards {
                    last_timestamp,
                    now,
                });
            }
            std::hint::spin_loop();
        }
    }
}
