use tarpc::serde::{Deserialize, Serialize};

use tavern_shared::{ErrorCode, Principal};

pub type ServerId = String;
pub type RoomId = String;
pub type CharacterId = String;
pub type PostId = u64;

/// Remote procedure contract of the authority.
///
/// Operations whose outcome depends on who is asking take the caller
/// explicitly; the authority re-checks every permission itself.
#[tarpc::service]
pub trait TavernApi {
	async fn get_caller_user_profile(caller: Principal) -> Option<UserProfile>;
	async fn get_user_profile(user: Principal) -> Option<UserProfile>;
	async fn save_caller_user_profile(caller: Principal, profile: UserProfile) -> Result<(), ErrorCode>;

	async fn list_servers() -> Vec<Server>;
	async fn get_server(server_id: ServerId) -> Result<Server, ErrorCode>;
	async fn create_server(caller: Principal, server_id: ServerId, name: String, description: String, banner_image_url: Option<String>) -> Result<(), ErrorCode>;
	async fn update_server(caller: Principal, server_id: ServerId, name: String, description: String, banner_image_url: Option<String>) -> Result<(), ErrorCode>;
	async fn join_server(caller: Principal, server_id: ServerId) -> Result<(), ErrorCode>;
	async fn leave_server(caller: Principal, server_id: ServerId) -> Result<(), ErrorCode>;
	async fn remove_member(caller: Principal, server_id: ServerId, member_id: Principal) -> Result<(), ErrorCode>;

	async fn list_rooms(server_id: ServerId) -> Result<Vec<Room>, ErrorCode>;
	async fn get_room(server_id: ServerId, room_id: RoomId) -> Result<Room, ErrorCode>;
	async fn create_room(caller: Principal, server_id: ServerId, room_id: RoomId, name: String, description: String) -> Result<(), ErrorCode>;

	async fn list_roleplay_posts(server_id: ServerId, room_id: RoomId) -> Result<Vec<RoleplayPost>, ErrorCode>;
	async fn get_roleplay_post(server_id: ServerId, room_id: RoomId, post_id: PostId) -> Result<RoleplayPost, ErrorCode>;
	async fn create_roleplay_post(caller: Principal, server_id: ServerId, room_id: RoomId, content: String) -> Result<PostId, ErrorCode>;
	async fn delete_roleplay_post(caller: Principal, server_id: ServerId, room_id: RoomId, post_id: PostId) -> Result<(), ErrorCode>;

	async fn list_character_profiles(owner: Principal, server_id: Option<ServerId>) -> Vec<CharacterProfile>;
	async fn get_character_profile(character_id: CharacterId) -> Result<CharacterProfile, ErrorCode>;
	async fn create_character_profile(caller: Principal, profile: CharacterProfile) -> Result<(), ErrorCode>;
	async fn edit_character_profile(caller: Principal, profile: CharacterProfile) -> Result<(), ErrorCode>;

	async fn get_caller_user_role(caller: Option<Principal>) -> UserRole;
	async fn is_caller_admin(caller: Option<Principal>) -> bool;
	async fn assign_caller_user_role(caller: Principal, user: Principal, role: UserRole) -> Result<(), ErrorCode>;
}

/// Role inside one server. The ordering only drives badge display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
	Member,
	Admin,
	Owner,
}

impl ServerRole {
	pub fn label(&self) -> &'static str {
		match self {
			ServerRole::Member => "Member",
			ServerRole::Admin => "Admin",
			ServerRole::Owner => "Owner",
		}
	}
}

/// Platform-wide role, independent of any server membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
	Admin,
	User,
	Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	pub name: String,
	pub bio: Option<String>,
	pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
	pub id: CharacterId,
	pub owner: Principal,
	pub name: String,
	pub description: String,
	pub appearance: String,
	pub avatar_image_url: Option<String>,
	/// `None` makes the character usable in every server.
	pub server_id: Option<ServerId>,
}

impl CharacterProfile {
	/// Whether the character may be used inside `server_id`, or anywhere when
	/// no server is given.
	pub fn usable_in(&self, server_id: Option<&ServerId>) -> bool {
		match (server_id, &self.server_id) {
			(None, _) => true,
			(Some(_), None) => true,
			(Some(wanted), Some(scope)) => wanted == scope,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMembership {
	pub user_id: Principal,
	pub role: ServerRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
	pub id: ServerId,
	pub owner: Principal,
	pub name: String,
	pub description: String,
	pub banner_image_url: Option<String>,
	pub memberships: Vec<ServerMembership>,
	pub rooms: Vec<Room>,
}

impl Server {
	/// First membership for `user`. Duplicates should not exist; if they do the
	/// earliest one wins.
	pub fn membership(&self, user: &Principal) -> Option<&ServerMembership> {
		self.memberships.iter().find(|m| &m.user_id == user)
	}

	pub fn room(&self, room_id: &str) -> Option<&Room> {
		self.rooms.iter().find(|r| r.id == room_id)
	}

	pub fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
		self.rooms.iter_mut().find(|r| r.id == room_id)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
	pub id: RoomId,
	pub creator: Principal,
	pub members: Vec<Principal>,
	pub name: String,
	pub description: String,
	pub roleplay_posts: Vec<RoleplayPost>,
	pub server_id: ServerId,
}

impl Room {
	pub fn sorted_posts(&self) -> Vec<RoleplayPost> {
		let mut posts = self.roleplay_posts.clone();
		sort_posts(&mut posts);
		posts
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleplayPost {
	pub id: PostId,
	pub content: String,
	pub author: Principal,
	/// Nanoseconds since the Unix epoch, stamped by the authority.
	pub timestamp: i64,
	pub room_id: RoomId,
}

/// Post ids are the only ordering the authority guarantees; arrival order and
/// timestamps are not.
pub fn sort_posts(posts: &mut [RoleplayPost]) {
	posts.sort_by_key(|p| p.id);
}
