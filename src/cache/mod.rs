//! In-memory copies of paginated server collections and the rules for
//! merging pages, local mutation results and pushed events into them.

pub mod collection;
pub mod schedules;

pub use collection::{CollectionCache, Entity};
pub use schedules::{FavoritesCache, PlacesCache, SchedulesCache};

/// Resource groups whose cached reads can be marked stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Schedules,
    Favorites,
    Places,
    User,
}
