//! 藏品模型
//!
//! 藏品数据来自外部藏品平台，本地只保存持有关系和返利标记

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 外部平台返回的单条藏品持有记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasureRecord {
    pub commodity_uuid: String,
    /// 藏品编号，与 commodity_uuid 共同唯一
    pub number: i64,
    pub name: String,
    pub cover: String,
    pub type_market: i32,
}

/// 本地藏品持有记录
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserTreasure {
    pub id: i64,
    pub user_id: i64,
    pub commodity_uuid: String,
    pub number: i64,
    pub name: String,
    pub cover: String,
    pub type_market: i32,
    /// 返利是否已发放，只会从 false 变为 true
    pub is_rebate: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 藏品字段差异
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreasureDiff {
    pub name: Option<String>,
    pub cover: Option<String>,
    pub type_market: Option<i32>,
    pub user_id: Option<i64>,
}

impl TreasureDiff {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.cover.is_none()
            && self.type_market.is_none()
            && self.user_id.is_none()
    }
}

impl UserTreasure {
    /// 对比外部记录，只返回发生变化的字段
    pub fn diff(&self, owner_id: i64, record: &TreasureRecord) -> TreasureDiff {
        TreasureDiff {
            name: (self.name != record.name).then(|| record.name.clone()),
            cover: (self.cover != record.cover).then(|| record.cover.clone()),
            type_market: (self.type_market != record.type_market).then_some(record.type_market),
            user_id: (self.user_id != owner_id).then_some(owner_id),
        }
    }
}

/// 待返利的藏品记录
#[derive(Debug, Clone, FromRow)]
pub struct PendingRebate {
    pub treasure_id: i64,
    pub user_id: i64,
    pub commodity_uuid: String,
    pub number: i64,
    pub price: Decimal,
}

/// 单次同步的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// 一次同步调用的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl SyncReport {
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// 是否有新增记录，用于决定是否触发返利
    pub fn has_created(&self) -> bool {
        self.created > 0
    }
}
