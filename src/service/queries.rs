use crate::api::{FavoriteEndpoints, HttpGateway, PlaceEndpoints, ScheduleEndpoints};
use crate::cache::{FavoritesCache, PlacesCache, SchedulesCache, Tag};
use crate::error::SyncError;
use crate::service::cache_actor::CacheHandle;
use crate::types::{EntityId, ScheduleFilter, ViewerSchedule};
use tracing::debug;

/// Read side: fetch pages from the server into the cache and hand out
/// snapshots. Every returned snapshot already reflects the fetch it follows.
#[derive(Clone)]
pub struct Queries {
    gateway: HttpGateway,
    cache: CacheHandle,
}

impl Queries {
    pub fn new(gateway: HttpGateway, cache: CacheHandle) -> Self {
        Self { gateway, cache }
    }

    pub async fn schedules(&self) -> Result<SchedulesCache, SyncError> {
        self.cache.schedules().await
    }

    pub async fn favorites(&self) -> Result<FavoritesCache, SyncError> {
        self.cache.favorites().await
    }

    pub async fn places(&self) -> Result<PlacesCache, SyncError> {
        self.cache.places().await
    }

    /// Page 1 of the filtered schedule list, replacing whatever was loaded.
    pub async fn refresh_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<SchedulesCache, SyncError> {
        let page = ScheduleEndpoints::list(&self.gateway, &filter.with_page(1)).await?;
        debug!(total = page.meta.total, rows = page.data.len(), "schedules page 1");
        self.cache.replace_schedules(page);
        self.cache.schedules().await
    }

    /// Next page, appended. Does nothing once every row is loaded.
    pub async fn load_more_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<SchedulesCache, SyncError> {
        let current = self.cache.schedules().await?;
        if current.page() == 0 {
            return self.refresh_schedules(filter).await;
        }
        if !current.has_more() {
            return Ok(current);
        }
        let next = current.next_page();
        let page = ScheduleEndpoints::list(&self.gateway, &filter.with_page(next)).await?;
        debug!(page = next, rows = page.data.len(), "schedules page appended");
        self.cache.append_schedules(page);
        self.cache.schedules().await
    }

    /// Refetch page 1 only when the cached list was invalidated or never loaded.
    pub async fn schedules_if_stale(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<SchedulesCache, SyncError> {
        let current = self.cache.schedules().await?;
        if current.page() == 0 || current.is_stale() {
            return self.refresh_schedules(filter).await;
        }
        Ok(current)
    }

    /// Single schedule with its points in arrival order. The cached copy, if
    /// any, takes over the fetched canonical fields.
    pub async fn schedule(&self, id: EntityId) -> Result<ViewerSchedule, SyncError> {
        let mut fetched = ScheduleEndpoints::get(&self.gateway, id).await?;
        fetched.schedule.sort_points();
        self.cache.patch_schedule(fetched.schedule.clone());
        Ok(fetched)
    }

    pub async fn refresh_favorites(&self) -> Result<FavoritesCache, SyncError> {
        let page = FavoriteEndpoints::list(&self.gateway, 1).await?;
        self.cache.replace_favorites(page);
        self.cache.favorites().await
    }

    pub async fn load_more_favorites(&self) -> Result<FavoritesCache, SyncError> {
        let current = self.cache.favorites().await?;
        if current.page() == 0 {
            return self.refresh_favorites().await;
        }
        if !current.has_more() {
            return Ok(current);
        }
        let page = FavoriteEndpoints::list(&self.gateway, current.next_page()).await?;
        self.cache.append_favorites(page);
        self.cache.favorites().await
    }

    pub async fn favorites_if_stale(&self) -> Result<FavoritesCache, SyncError> {
        let current = self.cache.favorites().await?;
        if current.page() == 0 || current.is_stale() {
            return self.refresh_favorites().await;
        }
        Ok(current)
    }

    pub async fn refresh_places(&self, search: Option<&str>) -> Result<PlacesCache, SyncError> {
        let page = PlaceEndpoints::list(&self.gateway, search, 1).await?;
        self.cache.replace_places(page);
        self.cache.places().await
    }

    pub async fn load_more_places(&self, search: Option<&str>) -> Result<PlacesCache, SyncError> {
        let current = self.cache.places().await?;
        if current.page() == 0 {
            return self.refresh_places(search).await;
        }
        if !current.has_more() {
            return Ok(current);
        }
        let page = PlaceEndpoints::list(&self.gateway, search, current.next_page()).await?;
        self.cache.append_places(page);
        self.cache.places().await
    }

    pub async fn places_if_stale(&self, search: Option<&str>) -> Result<PlacesCache, SyncError> {
        let current = self.cache.places().await?;
        if current.page() == 0 || current.is_stale() {
            return self.refresh_places(search).await;
        }
        Ok(current)
    }

    /// Mark a resource group stale so the next `*_if_stale` read refetches it.
    pub fn invalidate(&self, tag: Tag) {
        self.cache.invalidate(tag);
    }
}
