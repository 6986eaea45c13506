use super::models::{EntityId, Schedule};
use serde::Deserialize;

pub const SCHEDULE_CREATED: &str = "schedule_created";
pub const SCHEDULE_UPDATED: &str = "schedule_updated";
pub const SCHEDULE_DELETED: &str = "schedule_deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScheduleDeleted {
    pub id: EntityId,
}

/// Out-of-band entity change pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    ScheduleCreated(Schedule),
    ScheduleUpdated(Schedule),
    ScheduleDeleted(ScheduleDeleted),
}

impl RealtimeEvent {
    /// Decode an event by its wire name. Unknown names yield `Ok(None)`.
    pub fn from_named(name: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            SCHEDULE_CREATED => Self::ScheduleCreated(serde_json::from_str(data)?),
            SCHEDULE_UPDATED => Self::ScheduleUpdated(serde_json::from_str(data)?),
            SCHEDULE_DELETED => Self::ScheduleDeleted(serde_json::from_str(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ScheduleCreated(_) => SCHEDULE_CREATED,
            Self::ScheduleUpdated(_) => SCHEDULE_UPDATED,
            Self::ScheduleDeleted(_) => SCHEDULE_DELETED,
        }
    }

    pub fn schedule_id(&self) -> EntityId {
        match self {
            Self::ScheduleCreated(s) | Self::ScheduleUpdated(s) => s.id,
            Self::ScheduleDeleted(d) => d.id,
        }
    }
}
