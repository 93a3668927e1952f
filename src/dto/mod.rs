pub mod room;

pub use room::{
    CardView, CreateRoomRequest, HandEntryView, MembershipResponse, PersonalitySummary,
    PlayerView, RoomSnapshot,
};
