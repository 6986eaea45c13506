//! Stateless REST endpoint groups. Each call goes through [`HttpGateway`],
//! so every one of them carries the bearer credential and the refresh protocol.

use super::gateway::{HttpGateway, RequestSpec};
use crate::error::SyncError;
use crate::types::{
    AuthTokens, CreateFavoriteDto, CreatePlaceDto, CreateScheduleDto, EntityId, Favorite,
    ListOrPage, LoginDto, Paginated, Place, RegisterDto, ScheduleFilter, UpdatePasswordDto,
    UpdatePlaceDto, UpdateProfileDto, UpdateScheduleDto, User, ViewerSchedule,
};

pub struct AuthEndpoints;

impl AuthEndpoints {
    pub async fn register(gw: &HttpGateway, dto: &RegisterDto) -> Result<AuthTokens, SyncError> {
        Ok(gw.request(RequestSpec::post("/auth/register").json(dto)?).await?)
    }

    pub async fn login(gw: &HttpGateway, dto: &LoginDto) -> Result<AuthTokens, SyncError> {
        Ok(gw.request(RequestSpec::post("/auth/login").json(dto)?).await?)
    }

    pub async fn logout(gw: &HttpGateway) -> Result<(), SyncError> {
        Ok(gw.send(RequestSpec::post("/auth/logout")).await?)
    }

    pub async fn me(gw: &HttpGateway) -> Result<User, SyncError> {
        Ok(gw.request(RequestSpec::get("/users/me")).await?)
    }

    pub async fn update_profile(
        gw: &HttpGateway,
        dto: &UpdateProfileDto,
    ) -> Result<User, SyncError> {
        Ok(gw.request(RequestSpec::patch("/users/me").json(dto)?).await?)
    }

    pub async fn update_password(
        gw: &HttpGateway,
        dto: &UpdatePasswordDto,
    ) -> Result<User, SyncError> {
        Ok(gw
            .request(RequestSpec::patch("/users/password").json(dto)?)
            .await?)
    }
}

pub struct ScheduleEndpoints;

impl ScheduleEndpoints {
    pub async fn list(
        gw: &HttpGateway,
        filter: &ScheduleFilter,
    ) -> Result<Paginated<ViewerSchedule>, SyncError> {
        Ok(gw
            .request(RequestSpec::get("/schedules").query(filter.to_query()))
            .await?)
    }

    pub async fn get(gw: &HttpGateway, id: EntityId) -> Result<ViewerSchedule, SyncError> {
        Ok(gw.request(RequestSpec::get(format!("/schedules/{id}"))).await?)
    }

    pub async fn create(
        gw: &HttpGateway,
        dto: &CreateScheduleDto,
    ) -> Result<ViewerSchedule, SyncError> {
        Ok(gw.request(RequestSpec::post("/schedules").json(dto)?).await?)
    }

    pub async fn update(
        gw: &HttpGateway,
        id: EntityId,
        dto: &UpdateScheduleDto,
    ) -> Result<ViewerSchedule, SyncError> {
        Ok(gw
            .request(RequestSpec::patch(format!("/schedules/{id}")).json(dto)?)
            .await?)
    }

    pub async fn delete(gw: &HttpGateway, id: EntityId) -> Result<(), SyncError> {
        Ok(gw.send(RequestSpec::delete(format!("/schedules/{id}"))).await?)
    }
}

pub struct PlaceEndpoints;

impl PlaceEndpoints {
    pub async fn list(
        gw: &HttpGateway,
        search: Option<&str>,
        page: u32,
    ) -> Result<Paginated<Place>, SyncError> {
        let mut query = Vec::new();
        if let Some(s) = search.filter(|s| !s.is_empty()) {
            query.push(("search".to_string(), s.to_string()));
        }
        query.push(("page".to_string(), page.max(1).to_string()));
        let raw: ListOrPage<Place> = gw.request(RequestSpec::get("/places").query(query)).await?;
        Ok(raw.into())
    }

    pub async fn create(gw: &HttpGateway, dto: &CreatePlaceDto) -> Result<Place, SyncError> {
        Ok(gw.request(RequestSpec::post("/places").json(dto)?).await?)
    }

    pub async fn update(
        gw: &HttpGateway,
        id: EntityId,
        dto: &UpdatePlaceDto,
    ) -> Result<Place, SyncError> {
        Ok(gw
            .request(RequestSpec::patch(format!("/places/{id}")).json(dto)?)
            .await?)
    }

    pub async fn delete(gw: &HttpGateway, id: EntityId) -> Result<(), SyncError> {
        Ok(gw.send(RequestSpec::delete(format!("/places/{id}"))).await?)
    }
}

pub struct FavoriteEndpoints;

impl FavoriteEndpoints {
    pub async fn list(gw: &HttpGateway, page: u32) -> Result<Paginated<Favorite>, SyncError> {
        let query = vec![("page".to_string(), page.max(1).to_string())];
        Ok(gw
            .request(RequestSpec::get("/favorites").query(query))
            .await?)
    }

    pub async fn add(gw: &HttpGateway, schedule_id: EntityId) -> Result<Favorite, SyncError> {
        let dto = CreateFavoriteDto { schedule_id };
        Ok(gw.request(RequestSpec::post("/favorites").json(&dto)?).await?)
    }

    pub async fn remove(gw: &HttpGateway, schedule_id: EntityId) -> Result<(), SyncError> {
        Ok(gw
            .send(RequestSpec::delete(format!("/favorites/{schedule_id}")))
            .await?)
    }
}
