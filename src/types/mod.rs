pub mod dto;
pub mod events;
pub mod models;
pub mod pagination;
pub mod validate;

pub use dto::*;
pub use events::{RealtimeEvent, ScheduleDeleted};
pub use models::*;
pub use pagination::{ListOrPage, PageMeta, Paginated};
pub use validate::{FieldError, Validate, ValidationErrors};
