use crate::api::{AuthEndpoints, FavoriteEndpoints, HttpGateway, PlaceEndpoints, ScheduleEndpoints};
use crate::cache::Tag;
use crate::error::SyncError;
use crate::service::auth_store::AuthStore;
use crate::service::cache_actor::CacheHandle;
use crate::types::{
    CreatePlaceDto, CreateScheduleDto, EntityId, Favorite, Place, UpdatePlaceDto,
    UpdateProfileDto, UpdateScheduleDto, User, Validate, ViewerSchedule,
};
use tracing::{debug, warn};

/// Write side. Every mutation is confirmed by the server before its effect
/// reaches the cache; a rejected mutation leaves the cache untouched.
#[derive(Clone)]
pub struct MutationCoordinator {
    gateway: HttpGateway,
    cache: CacheHandle,
    auth: AuthStore,
}

impl MutationCoordinator {
    pub fn new(gateway: HttpGateway, cache: CacheHandle, auth: AuthStore) -> Self {
        Self {
            gateway,
            cache,
            auth,
        }
    }

    pub async fn create_schedule(
        &self,
        dto: &CreateScheduleDto,
    ) -> Result<ViewerSchedule, SyncError> {
        dto.validate()?;
        let created = ScheduleEndpoints::create(&self.gateway, dto).await?;
        debug!(id = created.id(), "schedule created");
        self.cache.insert_schedule(created.clone());
        Ok(created)
    }

    pub async fn update_schedule(
        &self,
        id: EntityId,
        dto: &UpdateScheduleDto,
    ) -> Result<ViewerSchedule, SyncError> {
        dto.validate()?;
        let updated = ScheduleEndpoints::update(&self.gateway, id, dto).await?;
        // Only the canonical fields; the viewer's favorite flag is kept.
        self.cache.patch_schedule(updated.schedule.clone());
        Ok(updated)
    }

    pub async fn delete_schedule(&self, id: EntityId) -> Result<(), SyncError> {
        ScheduleEndpoints::delete(&self.gateway, id).await?;
        self.cache.remove_schedule(id);
        Ok(())
    }

    pub async fn create_place(&self, dto: &CreatePlaceDto) -> Result<Place, SyncError> {
        dto.validate()?;
        let place = PlaceEndpoints::create(&self.gateway, dto).await?;
        self.cache.insert_place(place.clone());
        Ok(place)
    }

    pub async fn update_place(
        &self,
        id: EntityId,
        dto: &UpdatePlaceDto,
    ) -> Result<Place, SyncError> {
        dto.validate()?;
        let place = PlaceEndpoints::update(&self.gateway, id, dto).await?;
        self.cache.patch_place(place.clone());
        // Schedules embed place names.
        self.cache.invalidate(Tag::Schedules);
        Ok(place)
    }

    pub async fn delete_place(&self, id: EntityId) -> Result<(), SyncError> {
        PlaceEndpoints::delete(&self.gateway, id).await?;
        self.cache.remove_place(id);
        self.cache.invalidate(Tag::Schedules);
        Ok(())
    }

    pub async fn update_profile(&self, dto: &UpdateProfileDto) -> Result<User, SyncError> {
        dto.validate()?;
        let user = AuthEndpoints::update_profile(&self.gateway, dto).await?;
        self.auth.set_user(user.clone());
        Ok(user)
    }

    pub async fn add_favorite(&self, schedule_id: EntityId) -> Result<Favorite, SyncError> {
        match FavoriteEndpoints::add(&self.gateway, schedule_id).await {
            Ok(favorite) => {
                self.cache.set_favorite(schedule_id, true);
                self.cache.invalidate(Tag::Favorites);
                Ok(favorite)
            }
            Err(e) => {
                warn!(schedule_id, error = %e, "add favorite failed");
                Err(e)
            }
        }
    }

    pub async fn remove_favorite(&self, schedule_id: EntityId) -> Result<(), SyncError> {
        match FavoriteEndpoints::remove(&self.gateway, schedule_id).await {
            Ok(()) => {
                self.cache.set_favorite(schedule_id, false);
                self.cache.remove_favorite_by_schedule(schedule_id);
                Ok(())
            }
            Err(e) => {
                warn!(schedule_id, error = %e, "remove favorite failed");
                Err(e)
            }
        }
    }

    /// Add or remove depending on the flag the viewer currently sees. A
    /// schedule outside the loaded window falls back to the favorites list.
    pub async fn toggle_favorite(&self, schedule_id: EntityId) -> Result<bool, SyncError> {
        let is_favorite = match self.cache.schedules().await?.get(schedule_id) {
            Some(cached) => cached.is_favorite,
            None => self
                .cache
                .favorites()
                .await?
                .items()
                .iter()
                .any(|f| f.schedule_id == schedule_id),
        };
        if is_favorite {
            self.remove_favorite(schedule_id).await?;
        } else {
            self.add_favorite(schedule_id).await?;
        }
        Ok(!is_favorite)
    }
}
