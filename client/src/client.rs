use std::sync::Arc;

use tarpc::client::RpcError;
use tarpc::context;
use tarpc::tokio_serde::formats::Json;
use tracing::*;

use tavern_auth::IdentityResolver;
use tavern_server::roles;
use tavern_server::types::{
	sort_posts, CharacterId, CharacterProfile, PostId, RoleplayPost, Room, RoomId, Server, ServerId, TavernApiClient,
	UserProfile, UserRole,
};
use tavern_shared::{ids, ErrorCode, Principal};

use crate::cache::{CacheKey, EntityCache};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::validate::{self, CharacterDraft, RoomDraft, ServerDraft};

/// Typed access to the authority for one signed-in (or anonymous) user.
///
/// Reads go through the entity cache. Mutations validate their input, run the
/// local permission check where one applies, and invalidate the affected cache
/// keys once the authority confirms them. Nothing is retried.
#[derive(Clone)]
pub struct TavernClient {
	rpc: TavernApiClient,
	identity: Arc<dyn IdentityResolver>,
	cache: EntityCache,
}

fn answer<T>(op: &str, result: Result<Result<T, ErrorCode>, RpcError>) -> Result<T, ClientError> {
	match result {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(code)) => {
			warn!("{} rejected by server: {:?}", op, code);
			Err(code.into())
		}
		Err(e) => {
			error!("Failed to reach server for {}: {}", op, e);
			Err(ClientError::Remote(ErrorCode::RPCError))
		}
	}
}

fn delivered<T>(op: &str, result: Result<T, RpcError>) -> Result<T, ClientError> {
	answer(op, result.map(Ok))
}

impl TavernClient {
	pub fn new(rpc: TavernApiClient, identity: Arc<dyn IdentityResolver>, config: &ClientConfig) -> TavernClient {
		TavernClient {
			rpc,
			identity,
			cache: EntityCache::new(config),
		}
	}

	pub async fn connect(config: &ClientConfig, identity: Arc<dyn IdentityResolver>) -> anyhow::Result<TavernClient> {
		let mut transport = tarpc::serde_transport::tcp::connect(config.server_address.as_str(), Json::default);
		transport.config_mut().max_frame_length(usize::MAX);

		let connection = transport.await?;
		info!("Connected to {}", config.server_address);

		let rpc = TavernApiClient::new(tarpc::client::Config::default(), connection).spawn();
		Ok(TavernClient::new(rpc, identity, config))
	}

	/// The caller as of right now.
	pub fn caller(&self) -> Option<Principal> {
		self.identity.current()
	}

	fn require_caller(&self) -> Result<Principal, ClientError> {
		tavern_auth::require_caller(self.identity.as_ref()).map_err(ClientError::from)
	}

	/// Forget every cached read.
	pub fn refresh(&self) {
		self.cache.invalidate_all();
	}

	// -- User profiles --

	pub async fn caller_profile(&self) -> Result<Option<UserProfile>, ClientError> {
		let caller = self.require_caller()?;
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::CallerProfile(caller.clone()), async move {
			delivered("get_caller_user_profile", rpc.get_caller_user_profile(context::current(), caller).await)
		}).await
	}

	pub async fn user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
		let user = user.clone();
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::UserProfile(user.clone()), async move {
			delivered("get_user_profile", rpc.get_user_profile(context::current(), user).await)
		}).await
	}

	/// Replaces the caller's whole profile; omitted optional fields are cleared.
	pub async fn save_caller_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
		let profile = validate::profile(profile)?;
		let caller = self.require_caller()?;

		answer("save_caller_user_profile", self.rpc.save_caller_user_profile(context::current(), caller.clone(), profile).await)?;

		self.cache.invalidate(&[CacheKey::CallerProfile(caller.clone()), CacheKey::UserProfile(caller)]).await;
		Ok(())
	}

	// -- Servers --

	pub async fn list_servers(&self) -> Result<Vec<Server>, ClientError> {
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::Servers, async move {
			delivered("list_servers", rpc.list_servers(context::current()).await)
		}).await
	}

	pub async fn server(&self, server_id: &str) -> Result<Server, ClientError> {
		let server_id = server_id.to_string();
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::Server(server_id.clone()), async move {
			answer("get_server", rpc.get_server(context::current(), server_id).await)
		}).await
	}

	/// Creates a server owned by the caller and returns its new id.
	pub async fn create_server(&self, draft: &ServerDraft) -> Result<ServerId, ClientError> {
		let draft = draft.validated()?;
		let caller = self.require_caller()?;
		let server_id = ids::server_id();

		answer("create_server", self.rpc.create_server(
			context::current(),
			caller,
			server_id.clone(),
			draft.name,
			draft.description,
			draft.banner_image_url,
		).await)?;

		self.cache.invalidate(&[CacheKey::Servers]).await;
		Ok(server_id)
	}

	pub async fn update_server(&self, server_id: &str, draft: &ServerDraft) -> Result<(), ClientError> {
		let draft = draft.validated()?;
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		if !roles::can_edit_server(&server, Some(&caller)) {
			return Err(ClientError::Forbidden("only owners and admins can edit a server"))
		}

		answer("update_server", self.rpc.update_server(
			context::current(),
			caller,
			server_id.to_string(),
			draft.name,
			draft.description,
			draft.banner_image_url,
		).await)?;

		self.cache.invalidate(&[CacheKey::Server(server_id.to_string()), CacheKey::Servers]).await;
		Ok(())
	}

	/// Concurrent joins are deduplicated by the authority, not here.
	pub async fn join_server(&self, server_id: &str) -> Result<(), ClientError> {
		let caller = self.require_caller()?;

		answer("join_server", self.rpc.join_server(context::current(), caller, server_id.to_string()).await)?;

		self.cache.invalidate(&[CacheKey::Server(server_id.to_string()), CacheKey::Servers]).await;
		Ok(())
	}

	pub async fn leave_server(&self, server_id: &str) -> Result<(), ClientError> {
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		if !roles::can_leave(&server, Some(&caller)) {
			return Err(ClientError::Forbidden("only members other than the owner can leave"))
		}

		answer("leave_server", self.rpc.leave_server(context::current(), caller, server_id.to_string()).await)?;

		self.cache.invalidate(&[CacheKey::Server(server_id.to_string()), CacheKey::Servers]).await;
		Ok(())
	}

	pub async fn remove_member(&self, server_id: &str, member_id: &Principal) -> Result<(), ClientError> {
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		let target = server.membership(member_id).ok_or(ClientError::NotFound(ErrorCode::MemberNotFound))?;
		if !roles::is_removal_target(&server, Some(&caller), target) {
			return Err(ClientError::Forbidden("members can only be removed by owners and admins, and never the owner"))
		}

		answer("remove_member", self.rpc.remove_member(
			context::current(),
			caller,
			server_id.to_string(),
			member_id.clone(),
		).await)?;

		self.cache.invalidate(&[CacheKey::Server(server_id.to_string()), CacheKey::Servers]).await;
		Ok(())
	}

	// -- Rooms --

	pub async fn list_rooms(&self, server_id: &str) -> Result<Vec<Room>, ClientError> {
		let server_id = server_id.to_string();
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::Rooms(server_id.clone()), async move {
			answer("list_rooms", rpc.list_rooms(context::current(), server_id).await)
		}).await
	}

	pub async fn room(&self, server_id: &str, room_id: &str) -> Result<Room, ClientError> {
		let key = CacheKey::Room(server_id.to_string(), room_id.to_string());
		let (server_id, room_id) = (server_id.to_string(), room_id.to_string());
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(key, async move {
			answer("get_room", rpc.get_room(context::current(), server_id, room_id).await)
		}).await
	}

	pub async fn create_room(&self, server_id: &str, draft: &RoomDraft) -> Result<RoomId, ClientError> {
		let draft = draft.validated()?;
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		if !roles::can_edit_server(&server, Some(&caller)) {
			return Err(ClientError::Forbidden("only owners and admins can create rooms"))
		}

		let room_id = ids::room_id();
		answer("create_room", self.rpc.create_room(
			context::current(),
			caller,
			server_id.to_string(),
			room_id.clone(),
			draft.name,
			draft.description,
		).await)?;

		self.cache.invalidate(&[CacheKey::Rooms(server_id.to_string()), CacheKey::Server(server_id.to_string())]).await;
		Ok(room_id)
	}

	// -- Roleplay posts --

	fn post_keys(server_id: &str, room_id: &str) -> [CacheKey; 4] {
		[
			CacheKey::Posts(server_id.to_string(), room_id.to_string()),
			CacheKey::Room(server_id.to_string(), room_id.to_string()),
			CacheKey::Rooms(server_id.to_string()),
			CacheKey::Server(server_id.to_string()),
		]
	}

	/// Posts in ascending id order, whatever order they arrived in.
	pub async fn list_posts(&self, server_id: &str, room_id: &str) -> Result<Vec<RoleplayPost>, ClientError> {
		let key = CacheKey::Posts(server_id.to_string(), room_id.to_string());
		let (server_id, room_id) = (server_id.to_string(), room_id.to_string());
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(key, async move {
			let mut posts = answer("list_roleplay_posts", rpc.list_roleplay_posts(context::current(), server_id, room_id).await)?;
			sort_posts(&mut posts);
			Ok(posts)
		}).await
	}

	/// Re-read a room's posts, ignoring anything cached.
	pub async fn refresh_posts(&self, server_id: &str, room_id: &str) -> Result<Vec<RoleplayPost>, ClientError> {
		self.cache.invalidate(&[CacheKey::Posts(server_id.to_string(), room_id.to_string())]).await;
		self.list_posts(server_id, room_id).await
	}

	pub async fn post(&self, server_id: &str, room_id: &str, post_id: PostId) -> Result<RoleplayPost, ClientError> {
		answer("get_roleplay_post", self.rpc.get_roleplay_post(
			context::current(),
			server_id.to_string(),
			room_id.to_string(),
			post_id,
		).await)
	}

	pub async fn create_post(&self, server_id: &str, room_id: &str, content: &str) -> Result<PostId, ClientError> {
		let content = validate::post_content(content)?;
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		if !roles::is_member(&server, Some(&caller)) {
			return Err(ClientError::Forbidden("join the server to post"))
		}

		let post_id = answer("create_roleplay_post", self.rpc.create_roleplay_post(
			context::current(),
			caller,
			server_id.to_string(),
			room_id.to_string(),
			content,
		).await)?;

		self.cache.invalidate(&TavernClient::post_keys(server_id, room_id)).await;
		Ok(post_id)
	}

	pub async fn delete_post(&self, server_id: &str, room_id: &str, post_id: PostId) -> Result<(), ClientError> {
		let caller = self.require_caller()?;
		let server = self.server(server_id).await?;
		let post = self.post(server_id, room_id, post_id).await?;
		if !roles::can_delete_post(&server, Some(&caller), &post) {
			return Err(ClientError::Forbidden("only owners and admins can delete posts"))
		}

		answer("delete_roleplay_post", self.rpc.delete_roleplay_post(
			context::current(),
			caller,
			server_id.to_string(),
			room_id.to_string(),
			post_id,
		).await)?;

		self.cache.invalidate(&TavernClient::post_keys(server_id, room_id)).await;
		Ok(())
	}

	// -- Character profiles --

	/// Characters of `owner`. With a server scope, only characters usable in
	/// that server are returned; the authority does the filtering.
	pub async fn list_characters(&self, owner: &Principal, server_id: Option<&str>) -> Result<Vec<CharacterProfile>, ClientError> {
		let owner = owner.clone();
		let server_id = server_id.map(str::to_string);
		let key = CacheKey::Characters(owner.clone(), server_id.clone());
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(key, async move {
			delivered("list_character_profiles", rpc.list_character_profiles(context::current(), owner, server_id).await)
		}).await
	}

	pub async fn character(&self, character_id: &str) -> Result<CharacterProfile, ClientError> {
		let character_id: CharacterId = character_id.to_string();
		let rpc = self.rpc.clone();

		self.cache.get_or_fetch(CacheKey::Character(character_id.clone()), async move {
			answer("get_character_profile", rpc.get_character_profile(context::current(), character_id).await)
		}).await
	}

	pub async fn create_character(&self, draft: &CharacterDraft) -> Result<CharacterProfile, ClientError> {
		let draft = draft.validated()?;
		let caller = self.require_caller()?;

		let profile = CharacterProfile {
			id: ids::character_id(),
			owner: caller.clone(),
			name: draft.name,
			description: draft.description,
			appearance: draft.appearance,
			avatar_image_url: draft.avatar_image_url,
			server_id: draft.server_id,
		};
		answer("create_character_profile", self.rpc.create_character_profile(context::current(), caller.clone(), profile.clone()).await)?;

		self.cache.invalidate_characters_of(&caller).await;
		Ok(profile)
	}

	/// Replaces a character in full. Only its owner may do this.
	pub async fn edit_character(&self, profile: &CharacterProfile) -> Result<(), ClientError> {
		let profile = validate::character(profile)?;
		let caller = self.require_caller()?;
		if profile.owner != caller {
			return Err(ClientError::Forbidden("only the owner can edit a character"))
		}

		let character_id = profile.id.clone();
		answer("edit_character_profile", self.rpc.edit_character_profile(context::current(), caller.clone(), profile).await)?;

		self.cache.invalidate(&[CacheKey::Character(character_id)]).await;
		self.cache.invalidate_characters_of(&caller).await;
		Ok(())
	}

	// -- Global role --

	pub async fn caller_user_role(&self) -> Result<UserRole, ClientError> {
		delivered("get_caller_user_role", self.rpc.get_caller_user_role(context::current(), self.caller()).await)
	}

	pub async fn is_caller_admin(&self) -> Result<bool, ClientError> {
		delivered("is_caller_admin", self.rpc.is_caller_admin(context::current(), self.caller()).await)
	}

	pub async fn assign_user_role(&self, user: &Principal, role: UserRole) -> Result<(), ClientError> {
		let caller = self.require_caller()?;

		answer("assign_caller_user_role", self.rpc.assign_caller_user_role(context::current(), caller, user.clone(), role).await)
	}
}
