use tokio::sync::watch;
use tracing::*;

use crate::types::IdentityResolver;
use tavern_shared::Principal;

/// Identity state driven by the authentication provider.
pub struct Session {
	tx: watch::Sender<Option<Principal>>,
}

impl Session {
	pub fn new() -> Session {
		let (tx, _) = watch::channel(None);
		Session { tx }
	}

	pub fn signed_in(principal: Principal) -> Session {
		let session = Session::new();
		session.sign_in(principal);
		session
	}

	pub fn sign_in(&self, principal: Principal) {
		info!("Signed in as {}", principal);
		self.tx.send_replace(Some(principal));
	}

	pub fn sign_out(&self) {
		if let Some(previous) = self.tx.send_replace(None) {
			info!("Signed out {}", previous);
		}
	}

	/// Observe sign-in/out transitions.
	pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
		self.tx.subscribe()
	}
}

impl Default for Session {
	fn default() -> Self {
		Session::new()
	}
}

impl IdentityResolver for Session {
	fn current(&self) -> Option<Principal> {
		self.tx.borrow().clone()
	}
}

/// Resolver for a caller who never signs in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityResolver for Anonymous {
	fn current(&self) -> Option<Principal> {
		None
	}
}
