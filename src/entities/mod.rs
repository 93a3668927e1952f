pub mod card;
pub mod hand_entry;
pub mod personality;
pub mod player;
pub mod room;
pub mod room_card_history;
pub mod room_state;
pub mod seat;
pub mod topic;
pub mod user;

pub use card::CardKind;
pub use room_state::{GameState, RoundPhase};
pub use seat::SeatStatus;
