//! 积分查询服务
//!
//! 只读查询。排行榜和最新兑换记录是全站共享数据，先读缓存：
//!
//! - 积分排行榜: TTL 60 秒
//! - 最新兑换记录: TTL 60 秒，兑换成功后主动失效

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{instrument, warn};

use credits_shared::cache::{Cache, CacheKey};

use crate::error::Result;
use crate::models::{OpenApp, mask_phone};
use crate::repository::{
    CreditsLogRepositoryTrait, GoodsRepositoryTrait, OrderRepositoryTrait, UserRepositoryTrait,
};
use crate::service::dto::{
    CreditsLogDto, GoodsDto, OrderDto, PageResponse, PaginationParams, RankingEntryDto, RecentOrderDto,
};

const RANKING_SIZE: i64 = 10;
const RECENT_ORDERS_SIZE: i64 = 10;
const RANKING_TTL: Duration = Duration::from_secs(60);
const RECENT_ORDERS_TTL: Duration = Duration::from_secs(60);

pub struct QueryService<UR, LR, OR, GR>
where
    UR: UserRepositoryTrait,
    LR: CreditsLogRepositoryTrait,
    OR: OrderRepositoryTrait,
    GR: GoodsRepositoryTrait,
{
    user_repo: Arc<UR>,
    log_repo: Arc<LR>,
    order_repo: Arc<OR>,
    goods_repo: Arc<GR>,
    cache: Arc<Cache>,
}

impl<UR, LR, OR, GR> QueryService<UR, LR, OR, GR>
where
    UR: UserRepositoryTrait,
    LR: CreditsLogRepositoryTrait,
    OR: OrderRepositoryTrait,
    GR: GoodsRepositoryTrait,
{
    pub fn new(
        user_repo: Arc<UR>,
        log_repo: Arc<LR>,
        order_repo: Arc<OR>,
        goods_repo: Arc<GR>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            user_repo,
            log_repo,
            order_repo,
            goods_repo,
            cache,
        }
    }

    /// 缓存读写失败只记录日志，始终以数据库结果为准
    async fn get_cached_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache get failed, falling back to database"),
        }

        let data = fetch().await?;

        if let Err(e) = self.cache.set(key, &data, ttl).await {
            warn!(key = %key, error = %e, "Cache set failed");
        }

        Ok(data)
    }

    /// 查询余额，未注册的手机号余额为 0
    #[instrument(skip(self))]
    pub async fn get_balance(&self, phone: &str) -> Result<i64> {
        Ok(self
            .user_repo
            .find_by_phone(phone)
            .await?
            .map(|u| u.credits)
            .unwrap_or(0))
    }

    /// 累计获得的积分
    #[instrument(skip(self))]
    pub async fn get_earned_credits(&self, user_id: i64) -> Result<i64> {
        self.log_repo.sum_earned(user_id).await
    }

    /// 某个应用下用户的积分流水，新的在前
    #[instrument(skip(self, app, params), fields(app = %app.app_id))]
    pub async fn list_credits_logs(
        &self,
        app: &OpenApp,
        phone: &str,
        params: &PaginationParams,
    ) -> Result<PageResponse<CreditsLogDto>> {
        let Some(user) = self.user_repo.find_by_phone(phone).await? else {
            return Ok(PageResponse::new(Vec::new(), 0, params));
        };

        let total = self.log_repo.count_by_user_and_app(user.id, app.id).await?;
        let logs = self
            .log_repo
            .list_by_user_and_app(user.id, app.id, params.limit(), params.offset())
            .await?;

        Ok(PageResponse::new(
            logs.into_iter().map(CreditsLogDto::from).collect(),
            total,
            params,
        ))
    }

    /// 积分排行榜前 10 名，手机号脱敏
    #[instrument(skip(self))]
    pub async fn credits_ranking(&self) -> Result<Vec<RankingEntryDto>> {
        let key = CacheKey::credits_ranking(self.cache.key_prefix());
        self.get_cached_or_fetch(&key, RANKING_TTL, || async {
            let users = self.user_repo.top_by_credits(RANKING_SIZE).await?;
            Ok(users
                .iter()
                .enumerate()
                .map(|(i, user)| RankingEntryDto {
                    rank: i as u32 + 1,
                    phone: mask_phone(&user.phone),
                    credits: user.credits,
                })
                .collect())
        })
        .await
    }

    /// 用户自己的订单，新的在前
    #[instrument(skip(self, params))]
    pub async fn list_user_orders(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> Result<PageResponse<OrderDto>> {
        let total = self.order_repo.count_by_user(user_id).await?;
        let orders = self
            .order_repo
            .list_by_user(user_id, params.limit(), params.offset())
            .await?;

        Ok(PageResponse::new(
            orders.into_iter().map(OrderDto::from).collect(),
            total,
            params,
        ))
    }

    /// 上架商品列表，新的在前
    #[instrument(skip(self, params))]
    pub async fn list_goods(&self, params: &PaginationParams) -> Result<PageResponse<GoodsDto>> {
        let total = self.goods_repo.count_on_shelf().await?;
        let goods = self
            .goods_repo
            .list_on_shelf(params.limit(), params.offset())
            .await?;

        let now = Utc::now();
        Ok(PageResponse::new(
            goods.into_iter().map(|g| GoodsDto::new(g, now)).collect(),
            total,
            params,
        ))
    }

    /// 全站最新 10 条兑换记录，手机号脱敏
    #[instrument(skip(self))]
    pub async fn recent_orders(&self) -> Result<Vec<RecentOrderDto>> {
        let key = CacheKey::recent_orders(self.cache.key_prefix());
        self.get_cached_or_fetch(&key, RECENT_ORDERS_TTL, || async {
            let rows = self.order_repo.list_recent(RECENT_ORDERS_SIZE).await?;
            Ok(rows
                .into_iter()
                .map(|row| RecentOrderDto::new(&row.phone, row.goods_name, row.quantity, row.created_at))
                .collect())
        })
        .await
    }
}
