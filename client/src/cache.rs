//! Read-through cache for entity queries.
//!
//! Entries are keyed by a normalised [`CacheKey`] and are only ever dropped,
//! never patched: after a confirmed mutation the affected keys are invalidated
//! and the next read goes back to the authority. Two reads of the same key at
//! different times are not guaranteed to agree unless an invalidation happened
//! in between.
//!
//! Every invalidation advances an epoch. A fetch that overlaps an invalidation
//! hands its result to the caller but does not write it back, so an in-flight
//! read can't resurrect a snapshot the mutation just dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;
use tracing::*;

use tavern_server::types::{CharacterId, CharacterProfile, RoleplayPost, Room, RoomId, Server, ServerId, UserProfile};
use tavern_shared::Principal;

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
	CallerProfile(Principal),
	UserProfile(Principal),
	Servers,
	Server(ServerId),
	Rooms(ServerId),
	Room(ServerId, RoomId),
	Posts(ServerId, RoomId),
	Characters(Principal, Option<ServerId>),
	Character(CharacterId),
}

#[derive(Debug, Clone)]
pub enum Cached {
	Profile(Option<UserProfile>),
	Servers(Vec<Server>),
	Server(Server),
	Rooms(Vec<Room>),
	Room(Room),
	Posts(Vec<RoleplayPost>),
	Characters(Vec<CharacterProfile>),
	Character(CharacterProfile),
}

/// Conversion between a query result and its cache slot.
pub trait CacheValue: Clone + Sized {
	fn into_cached(self) -> Cached;
	fn from_cached(cached: Cached) -> Option<Self>;
}

macro_rules! cache_value {
	($ty:ty, $variant:ident) => {
		impl CacheValue for $ty {
			fn into_cached(self) -> Cached {
				Cached::$variant(self)
			}

			fn from_cached(cached: Cached) -> Option<Self> {
				match cached {
					Cached::$variant(value) => Some(value),
					_ => None,
				}
			}
		}
	};
}

cache_value!(Option<UserProfile>, Profile);
cache_value!(Vec<Server>, Servers);
cache_value!(Server, Server);
cache_value!(Vec<Room>, Rooms);
cache_value!(Room, Room);
cache_value!(Vec<RoleplayPost>, Posts);
cache_value!(Vec<CharacterProfile>, Characters);
cache_value!(CharacterProfile, Character);

#[derive(Clone)]
pub struct EntityCache {
	inner: Cache<CacheKey, Cached>,
	epoch: Arc<AtomicU64>,
}

impl EntityCache {
	pub fn new(config: &ClientConfig) -> EntityCache {
		let inner = Cache::builder()
			.max_capacity(config.cache_capacity)
			.time_to_live(config.cache_ttl)
			.build();
		EntityCache { inner, epoch: Arc::new(AtomicU64::new(0)) }
	}

	pub async fn get<T: CacheValue>(&self, key: &CacheKey) -> Option<T> {
		self.inner.get(key).await.and_then(T::from_cached)
	}

	pub async fn insert<T: CacheValue>(&self, key: CacheKey, value: T) {
		self.inner.insert(key, value.into_cached()).await;
	}

	/// Serve `key` from the cache, or run `fetch` and remember its result.
	/// Failures are not cached.
	pub async fn get_or_fetch<T, Fut>(&self, key: CacheKey, fetch: Fut) -> Result<T, ClientError>
	where
		T: CacheValue,
		Fut: Future<Output = Result<T, ClientError>>,
	{
		if let Some(hit) = self.get::<T>(&key).await {
			trace!("Cache hit for {:?}", key);
			return Ok(hit)
		}

		let started = self.epoch.load(Ordering::Acquire);
		let value = fetch.await?;
		if self.epoch.load(Ordering::Acquire) != started {
			debug!("Discarding fetch of {:?} that overlapped an invalidation", key);
			return Ok(value)
		}

		self.insert(key.clone(), value.clone()).await;
		// An invalidation may have landed while the insert was pending.
		if self.epoch.load(Ordering::Acquire) != started {
			self.inner.invalidate(&key).await;
		}
		Ok(value)
	}

	pub async fn invalidate(&self, keys: &[CacheKey]) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		for key in keys {
			debug!("Invalidating {:?}", key);
			self.inner.invalidate(key).await;
		}
	}

	/// Drop every character listing of `owner`, whatever its server scope. An
	/// unscoped character shows up in all of them.
	pub async fn invalidate_characters_of(&self, owner: &Principal) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		let stale: Vec<CacheKey> = self.inner.iter()
			.filter(|(key, _)| matches!(key.as_ref(), CacheKey::Characters(o, _) if o == owner))
			.map(|(key, _)| key.as_ref().clone())
			.collect();

		self.invalidate(&stale).await;
	}

	pub fn invalidate_all(&self) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		self.inner.invalidate_all();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tavern_shared::ErrorCode;
	use tokio::sync::oneshot;

	fn owner(name: &str) -> Principal {
		Principal::parse(name).unwrap()
	}

	fn character(id: &str, owner_name: &str) -> CharacterProfile {
		CharacterProfile {
			id: id.to_string(),
			owner: owner(owner_name),
			name: "Ilse".to_string(),
			description: String::new(),
			appearance: String::new(),
			avatar_image_url: None,
			server_id: None,
		}
	}

	#[tokio::test]
	async fn wrong_slot_type_is_a_miss() {
		let cache = EntityCache::new(&ClientConfig::default());
		cache.insert(CacheKey::Servers, Vec::<Server>::new()).await;

		assert!(cache.get::<Vec<Server>>(&CacheKey::Servers).await.is_some());
		assert!(cache.get::<Vec<Room>>(&CacheKey::Servers).await.is_none());
	}

	#[tokio::test]
	async fn read_through_fetches_once() {
		let cache = EntityCache::new(&ClientConfig::default());
		let key = CacheKey::Character("char-1".to_string());

		let first: CharacterProfile = cache.get_or_fetch(key.clone(), async { Ok(character("char-1", "alice")) }).await.unwrap();
		let second: CharacterProfile = cache.get_or_fetch(key, async { Err(ClientError::Remote(ErrorCode::Error)) }).await.unwrap();
		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn failures_are_not_cached() {
		let cache = EntityCache::new(&ClientConfig::default());
		let key = CacheKey::Character("char-2".to_string());

		let failed: Result<CharacterProfile, _> = cache.get_or_fetch(key.clone(), async { Err(ClientError::Remote(ErrorCode::RPCError)) }).await;
		assert!(failed.is_err());
		assert!(cache.get::<CharacterProfile>(&key).await.is_none());
	}

	#[tokio::test]
	async fn fetch_overlapping_invalidation_is_not_kept() {
		let cache = EntityCache::new(&ClientConfig::default());
		let (started_tx, started) = oneshot::channel::<()>();
		let (release, held) = oneshot::channel::<Vec<Server>>();

		let reader = {
			let cache = cache.clone();
			tokio::spawn(async move {
				cache.get_or_fetch(CacheKey::Servers, async move {
					started_tx.send(()).unwrap();
					Ok(held.await.unwrap())
				}).await
			})
		};

		started.await.unwrap();
		cache.invalidate(&[CacheKey::Servers]).await;
		release.send(Vec::new()).unwrap();

		let fetched: Vec<Server> = reader.await.unwrap().unwrap();
		assert!(fetched.is_empty());
		assert!(cache.get::<Vec<Server>>(&CacheKey::Servers).await.is_none());

		// Without an overlapping invalidation the result is kept as usual.
		cache.get_or_fetch(CacheKey::Servers, async { Ok(Vec::<Server>::new()) }).await.unwrap();
		assert!(cache.get::<Vec<Server>>(&CacheKey::Servers).await.is_some());
	}

	#[tokio::test]
	async fn owner_wide_character_invalidation() {
		let cache = EntityCache::new(&ClientConfig::default());
		let alice_global = CacheKey::Characters(owner("alice"), None);
		let alice_scoped = CacheKey::Characters(owner("alice"), Some("server-a".to_string()));
		let bob_global = CacheKey::Characters(owner("bob"), None);

		for key in [&alice_global, &alice_scoped, &bob_global] {
			cache.insert(key.clone(), vec![character("char-3", "alice")]).await;
		}

		cache.invalidate_characters_of(&owner("alice")).await;

		assert!(cache.get::<Vec<CharacterProfile>>(&alice_global).await.is_none());
		assert!(cache.get::<Vec<CharacterProfile>>(&alice_scoped).await.is_none());
		assert!(cache.get::<Vec<CharacterProfile>>(&bob_global).await.is_some());
	}
}
