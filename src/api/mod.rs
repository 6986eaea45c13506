pub mod endpoints;
pub mod gateway;

pub use endpoints::{AuthEndpoints, FavoriteEndpoints, PlaceEndpoints, ScheduleEndpoints};
pub use gateway::{HttpGateway, RequestSpec, SessionEvent};
