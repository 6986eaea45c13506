use crate::cache::{FavoritesCache, PlacesCache, SchedulesCache, Tag};
use crate::error::SyncError;
use crate::types::{
    EntityId, Favorite, Paginated, Place, RealtimeEvent, Schedule, ViewerSchedule,
};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{debug, info};

/// Messages handled by the cache actor. Every cache mutation, whatever its
/// origin, is one of these and is applied in mailbox order.
#[derive(Debug)]
pub enum CacheMessage {
    ReplaceSchedules(Paginated<ViewerSchedule>),
    AppendSchedules(Paginated<ViewerSchedule>),
    ReplaceFavorites(Paginated<Favorite>),
    AppendFavorites(Paginated<Favorite>),
    ReplacePlaces(Paginated<Place>),
    AppendPlaces(Paginated<Place>),

    /// A schedule confirmed created (mutation response).
    InsertSchedule(ViewerSchedule),
    /// A schedule confirmed edited; canonical fields only.
    PatchSchedule(Schedule),
    /// A schedule confirmed deleted; cascades to favorites.
    RemoveSchedule(EntityId),
    /// Favorite add (`true`) or remove (`false`) confirmed for this schedule.
    SetFavorite(EntityId, bool),
    RemoveFavoriteBySchedule(EntityId),

    InsertPlace(Place),
    PatchPlace(Place),
    RemovePlace(EntityId),

    /// Event pushed by the realtime channel.
    Realtime(RealtimeEvent),

    Invalidate(Tag),
    /// Drop everything (logout, session expiry).
    Clear,

    GetSchedules(RpcReplyPort<SchedulesCache>),
    GetFavorites(RpcReplyPort<FavoritesCache>),
    GetPlaces(RpcReplyPort<PlacesCache>),
    IsStale(Tag, RpcReplyPort<bool>),
}

/// Handle for interacting with the cache actor.
#[derive(Clone)]
pub struct CacheHandle {
    actor: ActorRef<CacheMessage>,
}

impl CacheHandle {
    fn cast(&self, msg: CacheMessage) {
        if let Err(e) = ractor::cast!(self.actor, msg) {
            debug!("cache actor unreachable: {}", e);
        }
    }

    pub fn replace_schedules(&self, page: Paginated<ViewerSchedule>) {
        self.cast(CacheMessage::ReplaceSchedules(page));
    }

    pub fn append_schedules(&self, page: Paginated<ViewerSchedule>) {
        self.cast(CacheMessage::AppendSchedules(page));
    }

    pub fn replace_favorites(&self, page: Paginated<Favorite>) {
        self.cast(CacheMessage::ReplaceFavorites(page));
    }

    pub fn append_favorites(&self, page: Paginated<Favorite>) {
        self.cast(CacheMessage::AppendFavorites(page));
    }

    pub fn replace_places(&self, page: Paginated<Place>) {
        self.cast(CacheMessage::ReplacePlaces(page));
    }

    pub fn append_places(&self, page: Paginated<Place>) {
        self.cast(CacheMessage::AppendPlaces(page));
    }

    pub fn insert_schedule(&self, schedule: ViewerSchedule) {
        self.cast(CacheMessage::InsertSchedule(schedule));
    }

    pub fn patch_schedule(&self, schedule: Schedule) {
        self.cast(CacheMessage::PatchSchedule(schedule));
    }

    pub fn remove_schedule(&self, id: EntityId) {
        self.cast(CacheMessage::RemoveSchedule(id));
    }

    pub fn set_favorite(&self, schedule_id: EntityId, is_favorite: bool) {
        self.cast(CacheMessage::SetFavorite(schedule_id, is_favorite));
    }

    pub fn remove_favorite_by_schedule(&self, schedule_id: EntityId) {
        self.cast(CacheMessage::RemoveFavoriteBySchedule(schedule_id));
    }

    pub fn insert_place(&self, place: Place) {
        self.cast(CacheMessage::InsertPlace(place));
    }

    pub fn patch_place(&self, place: Place) {
        self.cast(CacheMessage::PatchPlace(place));
    }

    pub fn remove_place(&self, id: EntityId) {
        self.cast(CacheMessage::RemovePlace(id));
    }

    pub fn apply_realtime(&self, event: RealtimeEvent) {
        self.cast(CacheMessage::Realtime(event));
    }

    pub fn invalidate(&self, tag: Tag) {
        self.cast(CacheMessage::Invalidate(tag));
    }

    pub fn clear(&self) {
        self.cast(CacheMessage::Clear);
    }

    /// Snapshot of the schedules collection after every queued mutation.
    pub async fn schedules(&self) -> Result<SchedulesCache, SyncError> {
        ractor::call!(self.actor, CacheMessage::GetSchedules)
            .map_err(|e| SyncError::RactorError(format!("GetSchedules RPC failed: {e}")))
    }

    pub async fn favorites(&self) -> Result<FavoritesCache, SyncError> {
        ractor::call!(self.actor, CacheMessage::GetFavorites)
            .map_err(|e| SyncError::RactorError(format!("GetFavorites RPC failed: {e}")))
    }

    pub async fn places(&self) -> Result<PlacesCache, SyncError> {
        ractor::call!(self.actor, CacheMessage::GetPlaces)
            .map_err(|e| SyncError::RactorError(format!("GetPlaces RPC failed: {e}")))
    }

    pub async fn is_stale(&self, tag: Tag) -> Result<bool, SyncError> {
        ractor::call!(self.actor, CacheMessage::IsStale, tag)
            .map_err(|e| SyncError::RactorError(format!("IsStale RPC failed: {e}")))
    }

    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

/// State owned by the cache actor.
#[derive(Default)]
pub struct CacheState {
    pub schedules: SchedulesCache,
    pub favorites: FavoritesCache,
    pub places: PlacesCache,
    user_stale: bool,
}

impl CacheState {
    fn apply(&mut self, message: CacheMessage) {
        match message {
            CacheMessage::ReplaceSchedules(page) => self.schedules.replace_all(page),
            CacheMessage::AppendSchedules(page) => self.schedules.append_page(page),
            CacheMessage::ReplaceFavorites(page) => self.favorites.replace_all(page),
            CacheMessage::AppendFavorites(page) => self.favorites.append_page(page),
            CacheMessage::ReplacePlaces(page) => self.places.replace_all(page),
            CacheMessage::AppendPlaces(page) => self.places.append_page(page),

            CacheMessage::InsertSchedule(schedule) => {
                self.schedules.insert(schedule);
            }
            CacheMessage::PatchSchedule(schedule) => self.patch_schedule(schedule),
            CacheMessage::RemoveSchedule(id) => self.remove_schedule(id),
            CacheMessage::SetFavorite(id, is_favorite) => {
                if self.schedules.set_favorite_flag(id, is_favorite) {
                    debug!("ID: {id}, favorite flag now {is_favorite}");
                }
            }
            CacheMessage::RemoveFavoriteBySchedule(id) => {
                self.favorites.remove_by_schedule_id(id);
            }

            CacheMessage::InsertPlace(place) => {
                self.places.insert(place);
            }
            CacheMessage::PatchPlace(place) => {
                self.places.apply_place_update(&place);
            }
            CacheMessage::RemovePlace(id) => {
                self.places.remove_by_id(id);
            }

            CacheMessage::Realtime(event) => self.apply_realtime(event),

            CacheMessage::Invalidate(tag) => match tag {
                Tag::Schedules => self.schedules.invalidate(),
                Tag::Favorites => self.favorites.invalidate(),
                Tag::Places => self.places.invalidate(),
                Tag::User => self.user_stale = true,
            },
            CacheMessage::Clear => *self = Self::default(),

            CacheMessage::GetSchedules(rp) => {
                let _ = rp.send(self.schedules.clone());
            }
            CacheMessage::GetFavorites(rp) => {
                let _ = rp.send(self.favorites.clone());
            }
            CacheMessage::GetPlaces(rp) => {
                let _ = rp.send(self.places.clone());
            }
            CacheMessage::IsStale(tag, rp) => {
                let stale = match tag {
                    Tag::Schedules => self.schedules.is_stale(),
                    Tag::Favorites => self.favorites.is_stale(),
                    Tag::Places => self.places.is_stale(),
                    Tag::User => std::mem::take(&mut self.user_stale),
                };
                let _ = rp.send(stale);
            }
        }
    }

    fn patch_schedule(&mut self, schedule: Schedule) {
        self.favorites.apply_schedule_update(&schedule);
        self.schedules.apply_schedule_update(schedule);
    }

    fn remove_schedule(&mut self, id: EntityId) {
        self.schedules.remove_by_id(id);
        self.favorites.remove_by_schedule_id(id);
    }

    /// Pushed events use the same merge rules as HTTP-originated data.
    pub fn apply_realtime(&mut self, event: RealtimeEvent) {
        debug!(event = event.name(), id = event.schedule_id(), "applying realtime event");
        match event {
            RealtimeEvent::ScheduleCreated(schedule) => {
                self.schedules.insert(ViewerSchedule::new(schedule));
            }
            RealtimeEvent::ScheduleUpdated(schedule) => self.patch_schedule(schedule),
            RealtimeEvent::ScheduleDeleted(deleted) => self.remove_schedule(deleted.id),
        }
    }
}

struct CacheActor;

#[ractor::async_trait]
impl Actor for CacheActor {
    type Msg = CacheMessage;
    type State = CacheState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _arguments: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("CacheActor started");
        Ok(CacheState::default())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.apply(message);
        Ok(())
    }
}

/// Spawn the cache actor and return a handle.
pub async fn spawn() -> Result<CacheHandle, SyncError> {
    let (actor, _jh) = Actor::spawn(None, CacheActor, ())
        .await
        .map_err(|e| SyncError::RactorError(format!("failed to spawn CacheActor: {e}")))?;
    Ok(CacheHandle { actor })
}
