use super::models::{EntityId, Role, TrainType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Token pair returned by `/auth/register` and `/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `/auth/refresh` may or may not rotate the refresh credential.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDto {
    pub name: String,
    pub login: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginDto {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordDto {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaceDto {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlaceDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDto {
    pub place_id: EntityId,
    pub time_to_arrive: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScheduleDto {
    #[serde(rename = "type")]
    pub train_type: TrainType,
    pub points: Vec<PointDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateScheduleDto {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub train_type: Option<TrainType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<PointDto>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFavoriteDto {
    pub schedule_id: EntityId,
}

/// Query for `GET /schedules`. Absent fields are left out of the query string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduleFilter {
    pub train_type: Option<TrainType>,
    pub start_date: Option<DateTime<Utc>>,
    pub start_place_id: Option<EntityId>,
    pub end_date: Option<DateTime<Utc>>,
    pub end_place_id: Option<EntityId>,
    pub page: u32,
}

impl ScheduleFilter {
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(t) = self.train_type {
            query.push(("type".to_string(), t.as_str().to_string()));
        }
        if let Some(d) = self.start_date {
            query.push(("startDate".to_string(), iso(d)));
        }
        if let Some(id) = self.start_place_id {
            query.push(("startPlaceId".to_string(), id.to_string()));
        }
        if let Some(d) = self.end_date {
            query.push(("endDate".to_string(), iso(d)));
        }
        if let Some(id) = self.end_place_id {
            query.push(("endPlaceId".to_string(), id.to_string()));
        }
        query.push(("page".to_string(), self.page.max(1).to_string()));
        query
    }
}

fn iso(d: DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}
