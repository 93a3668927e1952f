pub mod card_pool;
pub mod room_service;

pub use card_pool::CardPool;
pub use room_service::{Membership, RoomService};
