use thiserror::Error;

use tavern_shared::ErrorCode;

/// What went wrong with a field before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Problem {
	#[error("is required")]
	Required,
	#[error("must be at most {max} characters")]
	TooLong { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
	/// Missing, or not visible to the caller. The two look the same.
	#[error("{0}")]
	NotFound(ErrorCode),
	#[error("sign in required")]
	Unauthorized,
	#[error("{field} {problem}")]
	Validation { field: &'static str, problem: Problem },
	/// Refused by the local permission check; nothing was sent.
	#[error("not permitted: {0}")]
	Forbidden(&'static str),
	/// The request failed in transit or the authority rejected it.
	#[error("{0}")]
	Remote(ErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	NotFound,
	Unauthorized,
	Validation,
	Forbidden,
	RemoteFailure,
}

impl ClientError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			ClientError::NotFound(_) => ErrorKind::NotFound,
			ClientError::Unauthorized => ErrorKind::Unauthorized,
			ClientError::Validation { .. } => ErrorKind::Validation,
			ClientError::Forbidden(_) => ErrorKind::Forbidden,
			ClientError::Remote(_) => ErrorKind::RemoteFailure,
		}
	}

	/// The single message shown to the user for a failed action.
	pub fn notice(&self, action: &str) -> String {
		format!("Failed to {}: {}", action, self)
	}
}

impl From<ErrorCode> for ClientError {
	fn from(code: ErrorCode) -> Self {
		match code {
			ErrorCode::Unauthorized => ClientError::Unauthorized,
			code if code.is_not_found() => ClientError::NotFound(code),
			code => ClientError::Remote(code),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_codes_map_to_kinds() {
		assert_eq!(ClientError::from(ErrorCode::RoomNotFound).kind(), ErrorKind::NotFound);
		assert_eq!(ClientError::from(ErrorCode::Unauthorized).kind(), ErrorKind::Unauthorized);
		assert_eq!(ClientError::from(ErrorCode::Forbidden).kind(), ErrorKind::RemoteFailure);
		assert_eq!(ClientError::from(ErrorCode::RPCError).kind(), ErrorKind::RemoteFailure);
	}

	#[test]
	fn notice_text() {
		let err = ClientError::Validation { field: "name", problem: Problem::TooLong { max: 100 } };
		assert_eq!(err.notice("create server"), "Failed to create server: name must be at most 100 characters");
		assert_eq!(ClientError::from(ErrorCode::ServerNotFound).notice("load server"), "Failed to load server: server not found");
	}
}
