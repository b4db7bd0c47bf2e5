// Maximum field lengths, counted in characters. These mirror what the
// authority accepts; checking them early only saves a round trip.

pub const SERVER_NAME_MAX: usize = 100;
pub const SERVER_DESCRIPTION_MAX: usize = 500;

pub const ROOM_NAME_MAX: usize = 100;
pub const ROOM_DESCRIPTION_MAX: usize = 300;

pub const CHARACTER_NAME_MAX: usize = 100;
pub const CHARACTER_DESCRIPTION_MAX: usize = 1000;
pub const CHARACTER_APPEARANCE_MAX: usize = 500;

pub const PROFILE_NAME_MAX: usize = 50;
pub const PROFILE_BIO_MAX: usize = 500;

pub const POST_CONTENT_MAX: usize = 2000;

/// Whether `text` is at most `max` characters long.
pub fn fits(text: &str, max: usize) -> bool {
	text.chars().count() <= max
}
