use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned identifier shared by every entity.
pub type EntityId = i64;

/// Closed set of train categories the schedule filter can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainType {
    HighSpeed,
    Express,
    Intercity,
    Regional,
    Commuter,
    Freight,
}

impl TrainType {
    pub const ALL: [TrainType; 6] = [
        TrainType::Regional,
        TrainType::Intercity,
        TrainType::HighSpeed,
        TrainType::Express,
        TrainType::Commuter,
        TrainType::Freight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainType::HighSpeed => "HIGH_SPEED",
            TrainType::Express => "EXPRESS",
            TrainType::Intercity => "INTERCITY",
            TrainType::Regional => "REGIONAL",
            TrainType::Commuter => "COMMUTER",
            TrainType::Freight => "FREIGHT",
        }
    }
}

impl fmt::Display for TrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown train type `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub role: Role,
    pub login: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePoint {
    pub id: EntityId,
    pub place_id: EntityId,
    pub place: Place,
    pub time_to_arrive: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Canonical schedule as the server describes it, without any per-viewer state.
///
/// Payloads that carry `isFavorite` still decode into this type; the flag is
/// dropped here and only ever tracked by [`ViewerSchedule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub train_type: TrainType,
    pub points: Vec<SchedulePoint>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Points ordered by arrival time. Ties keep their server order.
    pub fn sorted_points(&self) -> Vec<&SchedulePoint> {
        let mut points: Vec<&SchedulePoint> = self.points.iter().collect();
        points.sort_by_key(|p| p.time_to_arrive);
        points
    }

    pub fn sort_points(&mut self) {
        self.points.sort_by_key(|p| p.time_to_arrive);
    }

    pub fn origin(&self) -> Option<&SchedulePoint> {
        self.points.iter().min_by_key(|p| p.time_to_arrive)
    }

    pub fn destination(&self) -> Option<&SchedulePoint> {
        self.points.iter().max_by_key(|p| p.time_to_arrive)
    }
}

/// A schedule as seen by the current viewer: the canonical entity plus the
/// viewer's favorite flag, kept in a separate field so core updates and flag
/// flips never overwrite each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSchedule {
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(default)]
    pub is_favorite: bool,
}

impl ViewerSchedule {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            is_favorite: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.schedule.id
    }
}

impl From<Schedule> for ViewerSchedule {
    fn from(schedule: Schedule) -> Self {
        Self::new(schedule)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: EntityId,
    pub user_id: EntityId,
    pub schedule_id: EntityId,
    /// Absent on some write responses, which only echo the join row.
    #[serde(default)]
    pub schedule: Option<Schedule>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: EntityId, at: &str) -> serde_json::Value {
        json!({
            "id": id,
            "placeId": id * 10,
            "place": {"id": id * 10, "name": format!("P{id}"), "createdAt": "2024-01-01T00:00:00Z"},
            "timeToArrive": at,
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn viewer_schedule_splits_favorite_flag_from_core() {
        let raw = json!({
            "id": 3,
            "type": "HIGH_SPEED",
            "isFavorite": true,
            "points": [point(1, "2024-05-01T10:00:00Z"), point(2, "2024-05-01T08:00:00Z")],
            "createdAt": "2024-01-01T00:00:00Z"
        });

        let viewer: ViewerSchedule = serde_json::from_value(raw.clone()).unwrap();
        assert!(viewer.is_favorite);
        assert_eq!(viewer.schedule.train_type, TrainType::HighSpeed);

        let core: Schedule = serde_json::from_value(raw).unwrap();
        assert_eq!(core, viewer.schedule);
    }

    #[test]
    fn origin_and_destination_follow_arrival_time() {
        let schedule: Schedule = serde_json::from_value(json!({
            "id": 1,
            "type": "REGIONAL",
            "points": [
                point(1, "2024-05-01T12:00:00Z"),
                point(2, "2024-05-01T08:00:00Z"),
                point(3, "2024-05-01T10:00:00Z")
            ],
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let ids: Vec<_> = schedule.sorted_points().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(schedule.origin().map(|p| p.id), Some(2));
        assert_eq!(schedule.destination().map(|p| p.id), Some(1));
    }

    #[test]
    fn train_type_parses_case_insensitively() {
        assert_eq!("express".parse::<TrainType>(), Ok(TrainType::Express));
        assert_eq!(TrainType::Freight.to_string(), "FREIGHT");
        assert!("MAGLEV".parse::<TrainType>().is_err());
    }
}
