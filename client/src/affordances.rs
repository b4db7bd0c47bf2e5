use tavern_server::roles;
use tavern_server::types::{Server, ServerRole};
use tavern_shared::Principal;

/// What the caller may do on a server's page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAffordances {
	pub role: Option<ServerRole>,
	/// Anonymous visitors see a sign-in prompt where the join action would be.
	pub sign_in_prompt: bool,
	pub can_join: bool,
	pub can_leave: bool,
	pub can_compose: bool,
	pub can_edit: bool,
	pub can_moderate: bool,
	pub removable_members: Vec<Principal>,
}

impl ServerAffordances {
	pub fn resolve(server: &Server, caller: Option<&Principal>) -> ServerAffordances {
		let member = roles::is_member(server, caller);

		ServerAffordances {
			role: roles::role_of(server, caller),
			sign_in_prompt: caller.is_none(),
			can_join: caller.is_some() && !member,
			can_leave: roles::can_leave(server, caller),
			can_compose: member,
			can_edit: roles::can_edit_server(server, caller),
			can_moderate: roles::can_moderate_posts(server, caller),
			removable_members: roles::removable_members(server, caller).into_iter()
				.map(|m| m.user_id.clone())
				.collect(),
		}
	}

	pub fn badge(&self) -> Option<&'static str> {
		self.role.map(|role| role.label())
	}
}
