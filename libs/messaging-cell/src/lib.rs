pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod websocket;

pub use models::*;
pub use router::messaging_routes;
pub use services::{
    MessageLog, RealtimeEvent, RealtimeHub, RoomDirectory, TypingPresence, TypingService,
    UnreadAggregator,
};
pub use state::MessagingState;
