use tavern_shared::{ErrorCode, Principal};

/// Source of the current caller identity.
///
/// Sign-in and sign-out happen outside this process, so consumers ask again on
/// every operation instead of holding on to an earlier answer.
pub trait IdentityResolver: Send + Sync {
	fn current(&self) -> Option<Principal>;
}

impl<T: IdentityResolver + ?Sized> IdentityResolver for std::sync::Arc<T> {
	fn current(&self) -> Option<Principal> {
		(**self).current()
	}
}

/// The caller for an operation that cannot run anonymously.
pub fn require_caller(resolver: &dyn IdentityResolver) -> Result<Principal, ErrorCode> {
	resolver.current().ok_or(ErrorCode::Unauthorized)
}
