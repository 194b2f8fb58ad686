/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

pub type UserId = i32;
pub type SetId = i32;
pub type CardId = i32;
pub type ProgressId = i32;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A named collection of cards owned by one user.
///
/// `card_count` is never stored. Every operation returning a set fills it
/// from the live number of cards referencing the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySet {
    pub id: SetId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub card_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub set_id: SetId,
    pub term: String,
    pub definition: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's self-assessed recall of a card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MasteryLevel {
    #[default]
    Unknown = 0,
    Known = 1,
}

impl TryFrom<i32> for MasteryLevel {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MasteryLevel::Unknown),
            1 => Ok(MasteryLevel::Known),
            other => Err(Error::InvalidMasteryLevel(other)),
        }
    }
}

impl From<MasteryLevel> for i32 {
    fn from(item: MasteryLevel) -> i32 {
        item as i32
    }
}

/// The single progress record of a (user, card) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub id: ProgressId,
    pub user_id: UserId,
    pub card_id: CardId,
    pub mastery_level: MasteryLevel,
    pub last_studied: DateTime<Utc>,
}

/// The insertion type of a new set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSet {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// The insertion type of a new card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCard {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// A partial update to a set.
///
/// `None` leaves a field alone. For `description`, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SetPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl SetPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_public.is_none()
    }

    pub fn apply(self, set: &mut StudySet) {
        if let Some(title) = self.title {
            set.title = title;
        }
        if let Some(description) = self.description {
            set.description = description;
        }
        if let Some(is_public) = self.is_public {
            set.is_public = is_public;
        }
    }
}

/// A partial update to a card. Same conventions as [`SetPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardPatch {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub audio_url: Option<Option<String>>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.term.is_none()
            && self.definition.is_none()
            && self.image_url.is_none()
            && self.audio_url.is_none()
    }

    pub fn apply(self, card: &mut Card) {
        if let Some(term) = self.term {
            card.term = term;
        }
        if let Some(definition) = self.definition {
            card.definition = definition;
        }
        if let Some(image_url) = self.image_url {
            card.image_url = image_url;
        }
        if let Some(audio_url) = self.audio_url {
            card.audio_url = audio_url;
        }
    }
}

// Only called when the key is present, so an explicit null becomes Some(None).
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A set together with its cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetWithCards {
    #[serde(flatten)]
    pub set: StudySet,
    pub cards: Vec<Card>,
}

/// One user's progress over one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetProgress {
    pub set_id: SetId,
    pub total_cards: i64,
    pub known: i64,
    pub unknown: i64,
}
