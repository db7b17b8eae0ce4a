pub mod messages;
pub mod presence;
pub mod realtime;
pub mod rooms;
pub mod typing;
pub mod unread;

pub use messages::{decode_cursor, encode_cursor, MessageLog};
pub use presence::TypingPresence;
pub use realtime::{RealtimeEvent, RealtimeHub};
pub use rooms::RoomDirectory;
pub use typing::TypingService;
pub use unread::UnreadAggregator;
