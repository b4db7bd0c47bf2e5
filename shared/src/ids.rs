//! Client-generated identifiers for servers, rooms and characters.
//!
//! Ids look like `server-1700000000000-ab12cd3ef`: a kind prefix, the creation
//! time in Unix milliseconds and nine random base36 characters. The format
//! makes collisions unlikely but the authority still rejects duplicates.

use chrono::Utc;
use rand::Rng;

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn server_id() -> String {
	generate("server")
}

pub fn room_id() -> String {
	generate("room")
}

pub fn character_id() -> String {
	generate("char")
}

pub fn generate(prefix: &str) -> String {
	let mut rng = rand::thread_rng();
	let suffix: String = (0..SUFFIX_LEN)
		.map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
		.collect();

	format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}
