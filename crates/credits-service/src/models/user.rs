//! 用户与开放应用模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::UserLevel;

/// 商城用户
///
/// 以手机号为唯一标识，邀请关系通过 parent_id 引用同表记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub phone: String,
    pub credits: i64,
    pub level: UserLevel,
    pub parent_id: Option<i64>,
    pub express_name: String,
    pub express_phone: String,
    pub express_area: String,
    pub express_address: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 收货信息快照
    pub fn shipping(&self) -> ShippingInfo {
        ShippingInfo {
            name: self.express_name.clone(),
            phone: self.express_phone.clone(),
            area: self.express_area.clone(),
            address: self.express_address.clone(),
        }
    }

    pub fn masked_phone(&self) -> String {
        mask_phone(&self.phone)
    }
}

/// 收货信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    pub phone: String,
    pub area: String,
    pub address: String,
}

impl ShippingInfo {
    /// 四项信息都填写后才允许下单
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.phone, &self.area, &self.address]
            .iter()
            .all(|s| !s.trim().is_empty())
    }
}

/// 开放平台应用
///
/// 外部调用方身份，积分流水的幂等键按应用隔离
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpenApp {
    pub id: i64,
    pub name: String,
    pub app_id: String,
    #[serde(skip_serializing)]
    pub app_secret: String,
    pub created_at: DateTime<Utc>,
}

/// 手机号脱敏：保留前 3 位和后 4 位
///
/// 长度不足 7 位时原样返回
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 7 {
        return phone.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User {
            id: 1,
            phone: "13812345678".to_string(),
            credits: 0,
            level: UserLevel::C,
            parent_id: None,
            express_name: "张三".to_string(),
            express_phone: "13812345678".to_string(),
            express_area: "浙江省杭州市".to_string(),
            express_address: "西湖区文三路 1 号".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("13812345678"), "138****5678");
        assert_eq!(mask_phone("12345"), "12345");
        assert_eq!(mask_phone("1234567"), "123****4567");
    }

    #[test]
    fn test_shipping_complete() {
        let user = create_test_user();
        assert!(user.shipping().is_complete());
        assert_eq!(user.masked_phone(), "138****5678");
    }

    #[test]
    fn test_shipping_incomplete() {
        let mut user = create_test_user();
        user.express_area = "  ".to_string();
        assert!(!user.shipping().is_complete());
        assert!(!ShippingInfo::default().is_complete());
    }
}
