use serde::{Deserialize, Serialize};

/// Error codes returned by the authority over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
	Error,
	Unauthorized,
	Forbidden,
	InvalidInput,
	AlreadyExists,

	ServerNotFound,
	RoomNotFound,
	PostNotFound,
	CharacterNotFound,
	MemberNotFound,

	RPCError,
}

impl ErrorCode {
	/// Missing entities and invisible entities are reported the same way.
	pub fn is_not_found(&self) -> bool {
		matches!(self, ErrorCode::ServerNotFound | ErrorCode::RoomNotFound | ErrorCode::PostNotFound
			| ErrorCode::CharacterNotFound | ErrorCode::MemberNotFound)
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let text = match self {
			ErrorCode::Error => "request failed",
			ErrorCode::Unauthorized => "sign in required",
			ErrorCode::Forbidden => "permission denied",
			ErrorCode::InvalidInput => "invalid input",
			ErrorCode::AlreadyExists => "already exists",
			ErrorCode::ServerNotFound => "server not found",
			ErrorCode::RoomNotFound => "room not found",
			ErrorCode::PostNotFound => "post not found",
			ErrorCode::CharacterNotFound => "character not found",
			ErrorCode::MemberNotFound => "member not found",
			ErrorCode::RPCError => "unable to reach server",
		};
		f.write_str(text)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_family() {
		assert!(ErrorCode::RoomNotFound.is_not_found());
		assert!(ErrorCode::MemberNotFound.is_not_found());
		assert!(!ErrorCode::Forbidden.is_not_found());
		assert!(!ErrorCode::RPCError.is_not_found());
	}
}
