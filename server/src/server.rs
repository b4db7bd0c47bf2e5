use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tarpc::context::Context;
use tokio::sync::RwLock;
use tracing::*;

use tavern_shared::limits::*;
use tavern_shared::ErrorCode::*;
use tavern_shared::{ErrorCode, Principal};

use crate::roles;
use crate::types::{
	CharacterId, CharacterProfile, PostId, RoleplayPost, Room, RoomId, Server, ServerId, ServerMembership, ServerRole,
	TavernApi, UserProfile, UserRole,
};

#[derive(Default)]
struct Store {
	profiles: HashMap<Principal, UserProfile>,
	user_roles: HashMap<Principal, UserRole>,
	servers: BTreeMap<ServerId, Server>,
	characters: BTreeMap<CharacterId, CharacterProfile>,
	last_post_id: PostId,
}

impl Store {
	fn server(&self, server_id: &str) -> Result<&Server, ErrorCode> {
		self.servers.get(server_id).ok_or(ServerNotFound)
	}

	fn server_mut(&mut self, server_id: &str) -> Result<&mut Server, ErrorCode> {
		self.servers.get_mut(server_id).ok_or(ServerNotFound)
	}

	fn room(&self, server_id: &str, room_id: &str) -> Result<&Room, ErrorCode> {
		self.server(server_id)?.room(room_id).ok_or(RoomNotFound)
	}
}

/// In-memory authority. Every permission the client checks is checked again
/// here against the stored snapshot.
#[derive(Clone, Default)]
pub struct TavernServer {
	store: Arc<RwLock<Store>>,
}

impl TavernServer {
	pub fn new() -> TavernServer {
		TavernServer::default()
	}

	/// Authority whose global role table starts with one admin.
	pub fn with_admin(admin: Principal) -> TavernServer {
		let mut store = Store::default();
		store.user_roles.insert(admin, UserRole::Admin);
		TavernServer { store: Arc::new(RwLock::new(store)) }
	}

	fn check_text(&self, text: &str, max: usize, required: bool) -> Result<(), ErrorCode> {
		if required && text.trim().is_empty() {
			return Err(InvalidInput)
		}
		if !fits(text, max) {
			return Err(InvalidInput)
		}
		Ok(())
	}

	fn check_optional(&self, text: &Option<String>, max: usize) -> Result<(), ErrorCode> {
		match text {
			Some(text) => self.check_text(text, max, false),
			None => Ok(()),
		}
	}

	fn check_character(&self, profile: &CharacterProfile) -> Result<(), ErrorCode> {
		self.check_text(&profile.name, CHARACTER_NAME_MAX, true)?;
		self.check_text(&profile.description, CHARACTER_DESCRIPTION_MAX, false)?;
		self.check_text(&profile.appearance, CHARACTER_APPEARANCE_MAX, false)
	}

	fn role_for(store: &Store, caller: Option<&Principal>) -> UserRole {
		match caller {
			Some(caller) => store.user_roles.get(caller).copied().unwrap_or(UserRole::User),
			None => UserRole::Guest,
		}
	}
}

impl TavernApi for TavernServer {
	async fn get_caller_user_profile(self, _: Context, caller: Principal) -> Option<UserProfile> {
		info!("API Request: get_caller_user_profile( caller -> {} )", caller);

		self.store.read().await.profiles.get(&caller).cloned()
	}

	async fn get_user_profile(self, _: Context, user: Principal) -> Option<UserProfile> {
		info!("API Request: get_user_profile( user -> {} )", user);

		self.store.read().await.profiles.get(&user).cloned()
	}

	async fn save_caller_user_profile(self, _: Context, caller: Principal, profile: UserProfile) -> Result<(), ErrorCode> {
		info!("API Request: save_caller_user_profile( caller -> {}, name -> {} )", caller, profile.name);

		self.check_text(&profile.name, PROFILE_NAME_MAX, true)?;
		self.check_optional(&profile.bio, PROFILE_BIO_MAX)?;

		self.store.write().await.profiles.insert(caller, profile);
		Ok(())
	}

	async fn list_servers(self, _: Context) -> Vec<Server> {
		info!("API Request: list_servers()");

		self.store.read().await.servers.values().cloned().collect()
	}

	async fn get_server(self, _: Context, server_id: ServerId) -> Result<Server, ErrorCode> {
		info!("API Request: get_server( server_id -> {} )", server_id);

		self.store.read().await.server(&server_id).cloned()
	}

	async fn create_server(self, _: Context, caller: Principal, server_id: ServerId, name: String, description: String, banner_image_url: Option<String>) -> Result<(), ErrorCode> {
		info!("API Request: create_server( caller -> {}, server_id -> {}, name -> {} )", caller, server_id, name);

		self.check_text(&server_id, usize::MAX, true)?;
		self.check_text(&name, SERVER_NAME_MAX, true)?;
		self.check_text(&description, SERVER_DESCRIPTION_MAX, false)?;

		let mut store = self.store.write().await;
		if store.servers.contains_key(&server_id) {
			error!("Server id collision in create_server()! server_id -> {}", server_id);
			return Err(AlreadyExists)
		}

		let server = Server {
			id: server_id.clone(),
			owner: caller.clone(),
			name,
			description,
			banner_image_url,
			memberships: vec![ServerMembership { user_id: caller, role: ServerRole::Owner }],
			rooms: vec![],
		};
		store.servers.insert(server_id, server);
		Ok(())
	}

	async fn update_server(self, _: Context, caller: Principal, server_id: ServerId, name: String, description: String, banner_image_url: Option<String>) -> Result<(), ErrorCode> {
		info!("API Request: update_server( caller -> {}, server_id -> {}, name -> {} )", caller, server_id, name);

		self.check_text(&name, SERVER_NAME_MAX, true)?;
		self.check_text(&description, SERVER_DESCRIPTION_MAX, false)?;

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		if !roles::can_edit_server(server, Some(&caller)) {
			error!("Unauthorized request made for update_server()! caller -> {}, server_id -> {}", caller, server_id);
			return Err(Forbidden)
		}

		server.name = name;
		server.description = description;
		server.banner_image_url = banner_image_url;
		Ok(())
	}

	async fn join_server(self, _: Context, caller: Principal, server_id: ServerId) -> Result<(), ErrorCode> {
		info!("API Request: join_server( caller -> {}, server_id -> {} )", caller, server_id);

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		if server.membership(&caller).is_none() {
			server.memberships.push(ServerMembership { user_id: caller, role: ServerRole::Member });
		}
		Ok(())
	}

	async fn leave_server(self, _: Context, caller: Principal, server_id: ServerId) -> Result<(), ErrorCode> {
		info!("API Request: leave_server( caller -> {}, server_id -> {} )", caller, server_id);

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		if roles::role_of(server, Some(&caller)) == Some(ServerRole::Owner) {
			error!("Owner attempted to leave their own server! caller -> {}, server_id -> {}", caller, server_id);
			return Err(Forbidden)
		}

		server.memberships.retain(|m| m.user_id != caller);
		Ok(())
	}

	async fn remove_member(self, _: Context, caller: Principal, server_id: ServerId, member_id: Principal) -> Result<(), ErrorCode> {
		info!("API Request: remove_member( caller -> {}, server_id -> {}, member_id -> {} )", caller, server_id, member_id);

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		let target = server.membership(&member_id).ok_or(MemberNotFound)?;
		if !roles::is_removal_target(server, Some(&caller), target) {
			error!("Unauthorized request made for remove_member()! caller -> {}, server_id -> {}, member_id -> {}", caller, server_id, member_id);
			return Err(Forbidden)
		}

		server.memberships.retain(|m| m.user_id != member_id);
		Ok(())
	}

	async fn list_rooms(self, _: Context, server_id: ServerId) -> Result<Vec<Room>, ErrorCode> {
		info!("API Request: list_rooms( server_id -> {} )", server_id);

		Ok(self.store.read().await.server(&server_id)?.rooms.clone())
	}

	async fn get_room(self, _: Context, server_id: ServerId, room_id: RoomId) -> Result<Room, ErrorCode> {
		info!("API Request: get_room( server_id -> {}, room_id -> {} )", server_id, room_id);

		self.store.read().await.room(&server_id, &room_id).cloned()
	}

	async fn create_room(self, _: Context, caller: Principal, server_id: ServerId, room_id: RoomId, name: String, description: String) -> Result<(), ErrorCode> {
		info!("API Request: create_room( caller -> {}, server_id -> {}, room_id -> {}, name -> {} )", caller, server_id, room_id, name);

		self.check_text(&room_id, usize::MAX, true)?;
		self.check_text(&name, ROOM_NAME_MAX, true)?;
		self.check_text(&description, ROOM_DESCRIPTION_MAX, false)?;

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		if !roles::can_edit_server(server, Some(&caller)) {
			error!("Unauthorized request made for create_room()! caller -> {}, server_id -> {}", caller, server_id);
			return Err(Forbidden)
		}
		if server.room(&room_id).is_some() {
			error!("Room id collision in create_room()! server_id -> {}, room_id -> {}", server_id, room_id);
			return Err(AlreadyExists)
		}

		server.rooms.push(Room {
			id: room_id,
			creator: caller.clone(),
			members: vec![caller],
			name,
			description,
			roleplay_posts: vec![],
			server_id,
		});
		Ok(())
	}

	async fn list_roleplay_posts(self, _: Context, server_id: ServerId, room_id: RoomId) -> Result<Vec<RoleplayPost>, ErrorCode> {
		info!("API Request: list_roleplay_posts( server_id -> {}, room_id -> {} )", server_id, room_id);

		Ok(self.store.read().await.room(&server_id, &room_id)?.roleplay_posts.clone())
	}

	async fn get_roleplay_post(self, _: Context, server_id: ServerId, room_id: RoomId, post_id: PostId) -> Result<RoleplayPost, ErrorCode> {
		info!("API Request: get_roleplay_post( server_id -> {}, room_id -> {}, post_id -> {} )", server_id, room_id, post_id);

		let store = self.store.read().await;
		let room = store.room(&server_id, &room_id)?;
		room.roleplay_posts.iter().find(|p| p.id == post_id).cloned().ok_or(PostNotFound)
	}

	async fn create_roleplay_post(self, _: Context, caller: Principal, server_id: ServerId, room_id: RoomId, content: String) -> Result<PostId, ErrorCode> {
		info!("API Request: create_roleplay_post( caller -> {}, server_id -> {}, room_id -> {} )", caller, server_id, room_id);

		self.check_text(&content, POST_CONTENT_MAX, true)?;

		let mut store = self.store.write().await;
		let server = store.server(&server_id)?;
		if !roles::is_member(server, Some(&caller)) {
			error!("Non-member attempted to post! caller -> {}, server_id -> {}", caller, server_id);
			return Err(Forbidden)
		}
		server.room(&room_id).ok_or(RoomNotFound)?;

		let post_id = store.last_post_id + 1;
		store.last_post_id = post_id;

		let room = store.server_mut(&server_id)?.room_mut(&room_id).ok_or(RoomNotFound)?;
		if !room.members.contains(&caller) {
			room.members.push(caller.clone());
		}
		room.roleplay_posts.push(RoleplayPost {
			id: post_id,
			content,
			author: caller,
			timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
			room_id,
		});
		Ok(post_id)
	}

	async fn delete_roleplay_post(self, _: Context, caller: Principal, server_id: ServerId, room_id: RoomId, post_id: PostId) -> Result<(), ErrorCode> {
		info!("API Request: delete_roleplay_post( caller -> {}, server_id -> {}, room_id -> {}, post_id -> {} )", caller, server_id, room_id, post_id);

		let mut store = self.store.write().await;
		let server = store.server_mut(&server_id)?;
		let allowed = {
			let room = server.room(&room_id).ok_or(RoomNotFound)?;
			let post = room.roleplay_posts.iter().find(|p| p.id == post_id).ok_or(PostNotFound)?;
			roles::can_delete_post(server, Some(&caller), post)
		};
		if !allowed {
			error!("Unauthorized request made for delete_roleplay_post()! caller -> {}, server_id -> {}, post_id -> {}", caller, server_id, post_id);
			return Err(Forbidden)
		}

		let room = server.room_mut(&room_id).ok_or(RoomNotFound)?;
		room.roleplay_posts.retain(|p| p.id != post_id);
		Ok(())
	}

	async fn list_character_profiles(self, _: Context, owner: Principal, server_id: Option<ServerId>) -> Vec<CharacterProfile> {
		info!("API Request: list_character_profiles( owner -> {}, server_id -> {:?} )", owner, server_id);

		self.store.read().await.characters.values()
			.filter(|c| c.owner == owner && c.usable_in(server_id.as_ref()))
			.cloned()
			.collect()
	}

	async fn get_character_profile(self, _: Context, character_id: CharacterId) -> Result<CharacterProfile, ErrorCode> {
		info!("API Request: get_character_profile( character_id -> {} )", character_id);

		self.store.read().await.characters.get(&character_id).cloned().ok_or(CharacterNotFound)
	}

	async fn create_character_profile(self, _: Context, caller: Principal, profile: CharacterProfile) -> Result<(), ErrorCode> {
		info!("API Request: create_character_profile( caller -> {}, character_id -> {} )", caller, profile.id);

		self.check_text(&profile.id, usize::MAX, true)?;
		self.check_character(&profile)?;
		if profile.owner != caller {
			error!("Character created on behalf of another user! caller -> {}, owner -> {}", caller, profile.owner);
			return Err(Forbidden)
		}

		let mut store = self.store.write().await;
		if let Some(server_id) = &profile.server_id {
			store.server(server_id)?;
		}
		if store.characters.contains_key(&profile.id) {
			error!("Character id collision in create_character_profile()! character_id -> {}", profile.id);
			return Err(AlreadyExists)
		}

		store.characters.insert(profile.id.clone(), profile);
		Ok(())
	}

	async fn edit_character_profile(self, _: Context, caller: Principal, profile: CharacterProfile) -> Result<(), ErrorCode> {
		info!("API Request: edit_character_profile( caller -> {}, character_id -> {} )", caller, profile.id);

		self.check_character(&profile)?;

		let mut store = self.store.write().await;
		if let Some(server_id) = &profile.server_id {
			store.server(server_id)?;
		}
		let existing = store.characters.get(&profile.id).ok_or(CharacterNotFound)?;
		if existing.owner != caller || profile.owner != caller {
			error!("Unauthorized request made for edit_character_profile()! caller -> {}, character_id -> {}", caller, profile.id);
			return Err(Forbidden)
		}

		store.characters.insert(profile.id.clone(), profile);
		Ok(())
	}

	async fn get_caller_user_role(self, _: Context, caller: Option<Principal>) -> UserRole {
		info!("API Request: get_caller_user_role( caller -> {:?} )", caller);

		TavernServer::role_for(&*self.store.read().await, caller.as_ref())
	}

	async fn is_caller_admin(self, _: Context, caller: Option<Principal>) -> bool {
		info!("API Request: is_caller_admin( caller -> {:?} )", caller);

		TavernServer::role_for(&*self.store.read().await, caller.as_ref()) == UserRole::Admin
	}

	async fn assign_caller_user_role(self, _: Context, caller: Principal, user: Principal, role: UserRole) -> Result<(), ErrorCode> {
		info!("API Request: assign_caller_user_role( caller -> {}, user -> {}, role -> {:?} )", caller, user, role);

		let mut store = self.store.write().await;
		if TavernServer::role_for(&store, Some(&caller)) != UserRole::Admin {
			error!("Unauthorized request made for assign_caller_user_role()! caller -> {}", caller);
			return Err(Forbidden)
		}

		store.user_roles.insert(user, role);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tarpc::context;

	fn user(name: &str) -> Principal {
		Principal::parse(name).unwrap()
	}

	async fn seeded() -> TavernServer {
		let authority = TavernServer::new();
		authority.clone().create_server(context::current(), user("u1"), "server-1".into(), "Harbour".into(), String::new(), None)
			.await.unwrap();
		authority.clone().join_server(context::current(), user("u2"), "server-1".into()).await.unwrap();
		authority.clone().create_room(context::current(), user("u1"), "server-1".into(), "room-1".into(), "Tavern".into(), String::new())
			.await.unwrap();
		authority
	}

	#[tokio::test]
	async fn creator_is_sole_owner() {
		let authority = seeded().await;
		let server = authority.clone().get_server(context::current(), "server-1".into()).await.unwrap();

		let owners: Vec<_> = server.memberships.iter().filter(|m| m.role == ServerRole::Owner).collect();
		assert_eq!(owners.len(), 1);
		assert_eq!(owners[0].user_id, server.owner);
	}

	#[tokio::test]
	async fn duplicate_server_id_rejected() {
		let authority = seeded().await;
		let result = authority.create_server(context::current(), user("u3"), "server-1".into(), "Other".into(), String::new(), None).await;
		assert_eq!(result, Err(AlreadyExists));
	}

	#[tokio::test]
	async fn join_is_idempotent() {
		let authority = seeded().await;
		authority.clone().join_server(context::current(), user("u2"), "server-1".into()).await.unwrap();
		let server = authority.get_server(context::current(), "server-1".into()).await.unwrap();
		assert_eq!(server.memberships.iter().filter(|m| m.user_id == user("u2")).count(), 1);
	}

	#[tokio::test]
	async fn owner_membership_is_permanent() {
		let authority = seeded().await;
		assert_eq!(authority.clone().leave_server(context::current(), user("u1"), "server-1".into()).await, Err(Forbidden));

		authority.clone().assign_member_role_for_test("server-1", "u2", ServerRole::Admin).await;
		let result = authority.clone().remove_member(context::current(), user("u2"), "server-1".into(), user("u1")).await;
		assert_eq!(result, Err(Forbidden));
	}

	#[tokio::test]
	async fn admin_removes_member() {
		let authority = seeded().await;
		authority.clone().join_server(context::current(), user("u3"), "server-1".into()).await.unwrap();
		authority.clone().assign_member_role_for_test("server-1", "u2", ServerRole::Admin).await;

		let result = authority.clone().remove_member(context::current(), user("u2"), "server-1".into(), user("u3")).await;
		assert_eq!(result, Ok(()));

		let server = authority.get_server(context::current(), "server-1".into()).await.unwrap();
		assert!(server.membership(&user("u3")).is_none());
		assert_eq!(server.memberships.len(), 2);
	}

	#[tokio::test]
	async fn post_ids_increase() {
		let authority = seeded().await;
		let mut ids = vec![];
		for n in 0..3 {
			let id = authority.clone()
				.create_roleplay_post(context::current(), user("u2"), "server-1".into(), "room-1".into(), format!("line {}", n))
				.await.unwrap();
			ids.push(id);
		}
		assert!(ids.windows(2).all(|w| w[0] < w[1]));

		let outsider = authority.create_roleplay_post(context::current(), user("u9"), "server-1".into(), "room-1".into(), "hi".into()).await;
		assert_eq!(outsider, Err(Forbidden));
	}

	#[tokio::test]
	async fn only_moderators_delete_posts() {
		let authority = seeded().await;
		let id = authority.clone()
			.create_roleplay_post(context::current(), user("u2"), "server-1".into(), "room-1".into(), "mine".into())
			.await.unwrap();

		let by_author = authority.clone().delete_roleplay_post(context::current(), user("u2"), "server-1".into(), "room-1".into(), id).await;
		assert_eq!(by_author, Err(Forbidden));

		authority.clone().delete_roleplay_post(context::current(), user("u1"), "server-1".into(), "room-1".into(), id).await.unwrap();
		let gone = authority.get_roleplay_post(context::current(), "server-1".into(), "room-1".into(), id).await;
		assert_eq!(gone, Err(PostNotFound));
	}

	#[tokio::test]
	async fn global_roles_are_separate() {
		let admin = user("root");
		let authority = TavernServer::with_admin(admin.clone());

		assert_eq!(authority.clone().get_caller_user_role(context::current(), None).await, UserRole::Guest);
		assert_eq!(authority.clone().get_caller_user_role(context::current(), Some(user("u1"))).await, UserRole::User);
		assert!(authority.clone().is_caller_admin(context::current(), Some(admin.clone())).await);

		let denied = authority.clone().assign_caller_user_role(context::current(), user("u1"), user("u1"), UserRole::Admin).await;
		assert_eq!(denied, Err(Forbidden));

		authority.clone().assign_caller_user_role(context::current(), admin.clone(), user("u1"), UserRole::Admin).await.unwrap();
		assert!(authority.clone().is_caller_admin(context::current(), Some(user("u1"))).await);

		// A global admin gets nothing extra inside a server.
		authority.clone().create_server(context::current(), user("u2"), "server-2".into(), "Keep".into(), String::new(), None)
			.await.unwrap();
		let result = authority.update_server(context::current(), admin, "server-2".into(), "Mine".into(), String::new(), None).await;
		assert_eq!(result, Err(Forbidden));
	}

	impl TavernServer {
		async fn assign_member_role_for_test(self, server_id: &str, user_id: &str, role: ServerRole) {
			let mut store = self.store.write().await;
			let server = store.servers.get_mut(server_id).unwrap();
			for membership in server.memberships.iter_mut().filter(|m| m.user_id.as_str() == user_id) {
				membership.role = role;
			}
		}
	}
}
