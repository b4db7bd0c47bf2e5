//! Per-server authorization.
//!
//! Everything here is a pure function of a [`Server`] snapshot and the caller,
//! so it can run anywhere (view code, the client before a mutation, the
//! authority before applying one). An absent caller is an anonymous visitor.
//!
//! There are only two capability tiers: "some member" and "owner or admin".
//! Checks are membership tests against the moderator set, never comparisons on
//! the display ordering of [`ServerRole`].

use tavern_shared::Principal;

use crate::types::{RoleplayPost, Server, ServerMembership, ServerRole};

const MODERATORS: [ServerRole; 2] = [ServerRole::Owner, ServerRole::Admin];

/// The caller's role according to the membership list, first match wins.
pub fn role_of(server: &Server, caller: Option<&Principal>) -> Option<ServerRole> {
	let caller = caller?;
	server.membership(caller).map(|m| m.role)
}

fn is_moderator(server: &Server, caller: Option<&Principal>) -> bool {
	role_of(server, caller).is_some_and(|role| MODERATORS.contains(&role))
}

/// Editing name/description/banner and creating rooms.
pub fn can_edit_server(server: &Server, caller: Option<&Principal>) -> bool {
	is_moderator(server, caller)
}

pub fn can_moderate_posts(server: &Server, caller: Option<&Principal>) -> bool {
	is_moderator(server, caller)
}

pub fn can_remove_members(server: &Server, caller: Option<&Principal>) -> bool {
	is_moderator(server, caller)
}

pub fn is_member(server: &Server, caller: Option<&Principal>) -> bool {
	role_of(server, caller).is_some()
}

/// The owner's membership is permanent, so only members and admins may leave.
pub fn can_leave(server: &Server, caller: Option<&Principal>) -> bool {
	matches!(role_of(server, caller), Some(ServerRole::Member | ServerRole::Admin))
}

/// Removal never targets the owner, and callers leave rather than remove
/// themselves.
pub fn is_removal_target(server: &Server, caller: Option<&Principal>, member: &ServerMembership) -> bool {
	can_remove_members(server, caller)
		&& member.role != ServerRole::Owner
		&& caller != Some(&member.user_id)
}

pub fn removable_members<'a>(server: &'a Server, caller: Option<&Principal>) -> Vec<&'a ServerMembership> {
	server.memberships.iter()
		.filter(|m| is_removal_target(server, caller, m))
		.collect()
}

/// Deleting a post is a moderation action only; authors get no extra right
/// over their own posts.
pub fn can_delete_post(server: &Server, caller: Option<&Principal>, _post: &RoleplayPost) -> bool {
	can_moderate_posts(server, caller)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user(name: &str) -> Principal {
		Principal::parse(name).unwrap()
	}

	fn server(memberships: &[(&str, ServerRole)]) -> Server {
		Server {
			id: "server-1".to_string(),
			owner: user("u1"),
			name: "Harbour".to_string(),
			description: String::new(),
			banner_image_url: None,
			memberships: memberships.iter()
				.map(|(name, role)| ServerMembership { user_id: user(name), role: *role })
				.collect(),
			rooms: vec![],
		}
	}

	fn scenario_a() -> Server {
		server(&[("u1", ServerRole::Owner), ("u2", ServerRole::Admin), ("u3", ServerRole::Member)])
	}

	#[test]
	fn scenario_a_removal() {
		let s = scenario_a();
		let u1 = user("u1");
		let u2 = user("u2");
		let u3 = user("u3");

		assert!(can_remove_members(&s, Some(&u2)));
		assert!(is_removal_target(&s, Some(&u2), &s.memberships[2]));
		assert!(!is_removal_target(&s, Some(&u2), &s.memberships[0]));
		assert!(!is_removal_target(&s, Some(&u2), &s.memberships[1]));

		assert!(!can_remove_members(&s, Some(&u3)));
		assert!(removable_members(&s, Some(&u3)).is_empty());

		let by_owner: Vec<&Principal> = removable_members(&s, Some(&u1)).iter().map(|m| &m.user_id).collect();
		assert_eq!(by_owner, vec![&u2, &u3]);
	}

	#[test]
	fn anonymous_has_no_role() {
		let s = scenario_a();
		assert_eq!(role_of(&s, None), None);
		assert!(!is_member(&s, None));
		assert!(!can_edit_server(&s, None));
		assert!(!can_moderate_posts(&s, None));
		assert!(!can_remove_members(&s, None));
		assert!(!can_leave(&s, None));
	}

	#[test]
	fn predicates_collapse_to_moderator_tier() {
		let s = scenario_a();
		for name in ["u1", "u2", "u3", "stranger"] {
			let caller = user(name);
			let caller = Some(&caller);
			let moderator = matches!(role_of(&s, caller), Some(ServerRole::Owner | ServerRole::Admin));

			assert_eq!(can_edit_server(&s, caller), moderator);
			assert_eq!(can_moderate_posts(&s, caller), moderator);
			assert_eq!(can_remove_members(&s, caller), moderator);
			assert_eq!(is_member(&s, caller), s.memberships.iter().any(|m| Some(&m.user_id) == caller));
		}
	}

	#[test]
	fn identity_matches_by_canonical_form() {
		let s = scenario_a();
		let padded = Principal::parse(" u2 ").unwrap();
		assert_eq!(role_of(&s, Some(&padded)), Some(ServerRole::Admin));

		let shouted = Principal::parse("U2").unwrap();
		assert_eq!(role_of(&s, Some(&shouted)), None);
		assert!(!can_edit_server(&s, Some(&shouted)));
	}

	#[test]
	fn duplicate_membership_uses_first() {
		let s = server(&[("u1", ServerRole::Owner), ("u4", ServerRole::Member), ("u4", ServerRole::Admin)]);
		assert_eq!(role_of(&s, Some(&user("u4"))), Some(ServerRole::Member));
		assert!(!can_edit_server(&s, Some(&user("u4"))));
	}

	#[test]
	fn empty_membership_list_is_reported_as_is() {
		let s = server(&[]);
		assert!(!is_member(&s, Some(&s.owner)));
		assert!(!can_edit_server(&s, Some(&s.owner)));
	}

	#[test]
	fn owner_cannot_leave() {
		let s = scenario_a();
		assert!(!can_leave(&s, Some(&user("u1"))));
		assert!(can_leave(&s, Some(&user("u2"))));
		assert!(can_leave(&s, Some(&user("u3"))));
		assert!(!can_leave(&s, Some(&user("stranger"))));
	}

	#[test]
	fn authors_cannot_delete_their_own_posts() {
		let s = scenario_a();
		let post = RoleplayPost {
			id: 1,
			content: "hello".to_string(),
			author: user("u3"),
			timestamp: 0,
			room_id: "room-1".to_string(),
		};
		assert!(!can_delete_post(&s, Some(&user("u3")), &post));
		assert!(can_delete_post(&s, Some(&user("u2")), &post));
	}
}
