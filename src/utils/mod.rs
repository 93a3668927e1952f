pub mod room_code;

pub use room_code::{generate_room_code, is_valid_room_code, normalize_room_code};
