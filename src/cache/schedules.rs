use super::collection::{CollectionCache, Entity};
use crate::types::{EntityId, Favorite, Place, Schedule, ViewerSchedule};

pub type SchedulesCache = CollectionCache<ViewerSchedule>;
pub type FavoritesCache = CollectionCache<Favorite>;
pub type PlacesCache = CollectionCache<Place>;

impl Entity for ViewerSchedule {
    fn id(&self) -> EntityId {
        self.schedule.id
    }

    /// The viewer's flag is never taken from a re-delivered copy.
    fn merged_over(self, existing: &Self) -> Self {
        Self {
            schedule: self.schedule,
            is_favorite: existing.is_favorite,
        }
    }
}

impl Entity for Favorite {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Entity for Place {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl SchedulesCache {
    /// Replace the canonical fields of a cached schedule, leaving the viewer's
    /// favorite flag untouched. Absent ids are a no-op.
    pub fn apply_schedule_update(&mut self, schedule: Schedule) -> bool {
        self.patch_by_id(schedule.id, |existing| ViewerSchedule {
            schedule,
            is_favorite: existing.is_favorite,
        })
    }

    /// Flip the viewer's favorite flag and nothing else. Returns the new value,
    /// or `None` when the schedule is not in the loaded window.
    pub fn toggle_favorite_flag(&mut self, schedule_id: EntityId) -> Option<bool> {
        let now = !self.get(schedule_id)?.is_favorite;
        self.set_favorite_flag(schedule_id, now);
        Some(now)
    }

    /// Set the viewer's favorite flag to a confirmed value. Idempotent, so a
    /// re-applied confirmation cannot undo itself. Returns whether the
    /// schedule is loaded.
    pub fn set_favorite_flag(&mut self, schedule_id: EntityId, is_favorite: bool) -> bool {
        self.patch_by_id(schedule_id, |existing| ViewerSchedule {
            schedule: existing.schedule.clone(),
            is_favorite,
        })
    }
}

impl FavoritesCache {
    /// Refresh the embedded schedule of every favorite pointing at it.
    pub fn apply_schedule_update(&mut self, schedule: &Schedule) -> usize {
        self.patch_where(
            |f| f.schedule_id == schedule.id,
            |f| Favorite {
                schedule: Some(schedule.clone()),
                ..f.clone()
            },
        )
    }

    /// A favorite cannot outlive its schedule.
    pub fn remove_by_schedule_id(&mut self, schedule_id: EntityId) -> usize {
        self.remove_where(|f| f.schedule_id == schedule_id)
    }
}

impl PlacesCache {
    /// Apply an edit response; only the mutable `name` is taken over.
    pub fn apply_place_update(&mut self, place: &Place) -> bool {
        self.patch_by_id(place.id, |existing| Place {
            name: place.name.clone(),
            ..existing.clone()
        })
    }
}
