pub mod auth_store;
pub mod cache_actor;
pub mod mutations;
pub mod queries;
pub mod realtime;
pub mod session;
pub mod token_store;

pub use auth_store::{AuthState, AuthStore};
pub use cache_actor::{CacheHandle, CacheMessage};
pub use mutations::MutationCoordinator;
pub use queries::Queries;
pub use realtime::{
    ChannelState, ConnectPolicy, EventStream, MemoryTransport, PushTransport, RealtimeChannel,
    SseTransport,
};
pub use session::SessionService;
pub use token_store::{CredentialPair, TokenStore};
