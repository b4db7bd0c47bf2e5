//! Input checks run before any request is made.
//!
//! Text is trimmed, required fields must be non-blank, and every field is held
//! to the maximum length the authority accepts. Blank optional fields become
//! `None`.

use tavern_server::types::{CharacterProfile, ServerId, UserProfile};
use tavern_shared::limits::*;

use crate::error::{ClientError, Problem};

pub fn required(field: &'static str, text: &str, max: usize) -> Result<String, ClientError> {
	let text = text.trim();
	if text.is_empty() {
		return Err(ClientError::Validation { field, problem: Problem::Required })
	}
	bounded(field, text, max)
}

pub fn bounded(field: &'static str, text: &str, max: usize) -> Result<String, ClientError> {
	let text = text.trim();
	if !fits(text, max) {
		return Err(ClientError::Validation { field, problem: Problem::TooLong { max } })
	}
	Ok(text.to_string())
}

pub fn optional(field: &'static str, text: Option<&str>, max: usize) -> Result<Option<String>, ClientError> {
	match text.map(str::trim).filter(|t| !t.is_empty()) {
		Some(text) => bounded(field, text, max).map(Some),
		None => Ok(None),
	}
}

fn url(text: Option<&str>) -> Option<String> {
	text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

/// Fields for creating or updating a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerDraft {
	pub name: String,
	pub description: String,
	pub banner_image_url: Option<String>,
}

impl ServerDraft {
	pub fn validated(&self) -> Result<ServerDraft, ClientError> {
		Ok(ServerDraft {
			name: required("name", &self.name, SERVER_NAME_MAX)?,
			description: bounded("description", &self.description, SERVER_DESCRIPTION_MAX)?,
			banner_image_url: url(self.banner_image_url.as_deref()),
		})
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomDraft {
	pub name: String,
	pub description: String,
}

impl RoomDraft {
	pub fn validated(&self) -> Result<RoomDraft, ClientError> {
		Ok(RoomDraft {
			name: required("name", &self.name, ROOM_NAME_MAX)?,
			description: bounded("description", &self.description, ROOM_DESCRIPTION_MAX)?,
		})
	}
}

/// A new character before it has an id and owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterDraft {
	pub name: String,
	pub description: String,
	pub appearance: String,
	pub avatar_image_url: Option<String>,
	pub server_id: Option<ServerId>,
}

impl CharacterDraft {
	pub fn validated(&self) -> Result<CharacterDraft, ClientError> {
		Ok(CharacterDraft {
			name: required("name", &self.name, CHARACTER_NAME_MAX)?,
			description: bounded("description", &self.description, CHARACTER_DESCRIPTION_MAX)?,
			appearance: bounded("appearance", &self.appearance, CHARACTER_APPEARANCE_MAX)?,
			avatar_image_url: url(self.avatar_image_url.as_deref()),
			server_id: url(self.server_id.as_deref()),
		})
	}
}

pub fn character(profile: &CharacterProfile) -> Result<CharacterProfile, ClientError> {
	let draft = CharacterDraft {
		name: profile.name.clone(),
		description: profile.description.clone(),
		appearance: profile.appearance.clone(),
		avatar_image_url: profile.avatar_image_url.clone(),
		server_id: profile.server_id.clone(),
	}.validated()?;

	Ok(CharacterProfile {
		id: profile.id.clone(),
		owner: profile.owner.clone(),
		name: draft.name,
		description: draft.description,
		appearance: draft.appearance,
		avatar_image_url: draft.avatar_image_url,
		server_id: draft.server_id,
	})
}

pub fn profile(profile: &UserProfile) -> Result<UserProfile, ClientError> {
	Ok(UserProfile {
		name: required("name", &profile.name, PROFILE_NAME_MAX)?,
		bio: optional("bio", profile.bio.as_deref(), PROFILE_BIO_MAX)?,
		avatar_url: url(profile.avatar_url.as_deref()),
	})
}

pub fn post_content(content: &str) -> Result<String, ClientError> {
	required("content", content, POST_CONTENT_MAX)
}
