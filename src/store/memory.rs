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

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::Store;
use crate::{
    access::{self, Visibility},
    aggregate,
    models::*,
    password, Error,
};

/// A store held entirely in process memory.
///
/// Every operation runs under one lock over all tables, which makes each of
/// them atomic. Records are kept in id order, the same order `PgStore`
/// returns them in.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    last_user_id: UserId,
    last_set_id: SetId,
    last_card_id: CardId,
    last_progress_id: ProgressId,
    users: BTreeMap<UserId, User>,
    sets: BTreeMap<SetId, StudySet>,
    cards: BTreeMap<CardId, Card>,
    progress: BTreeMap<ProgressId, Progress>,
}

/// Now, or just after `prev` if the clock has not moved past it.
fn later_than(prev: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(prev + Duration::microseconds(1))
}

fn page<'a, I>(sets: I, skip: u32, limit: u32) -> impl Iterator<Item = &'a StudySet>
where
    I: Iterator<Item = &'a StudySet>,
{
    sets.skip(skip as usize).take(limit as usize)
}

impl Tables {
    fn annotated(&self, set: &StudySet) -> StudySet {
        StudySet {
            card_count: aggregate::card_count(self.cards.values(), set.id),
            ..set.clone()
        }
    }

    fn readable_set(&self, set_id: SetId, requester: Option<UserId>) -> Option<&StudySet> {
        let set = self.sets.get(&set_id)?;
        if access::can_read(Visibility::from(set), requester) {
            Some(set)
        } else {
            debug!(set_id, ?requester, "set not readable");
            None
        }
    }

    fn writable_set(&self, set_id: SetId, user: UserId) -> Option<&StudySet> {
        let set = self.sets.get(&set_id)?;
        if access::can_write(Visibility::from(set), user) {
            Some(set)
        } else {
            debug!(set_id, user, "set not writable");
            None
        }
    }

    fn cards_of(&self, set_id: SetId) -> Vec<Card> {
        self.cards
            .values()
            .filter(|c| c.set_id == set_id)
            .cloned()
            .collect()
    }

    fn progress_on_set(&self, set_id: SetId, user_id: UserId) -> Vec<Progress> {
        self.progress
            .values()
            .filter(|p| {
                p.user_id == user_id
                    && self
                        .cards
                        .get(&p.card_id)
                        .map_or(false, |c| c.set_id == set_id)
            })
            .cloned()
            .collect()
    }

    fn remove_card(&mut self, card_id: CardId) {
        self.cards.remove(&card_id);
        self.progress.retain(|_, p| p.card_id != card_id);
    }

    fn remove_set(&mut self, set_id: SetId) {
        let card_ids: Vec<CardId> = self
            .cards
            .values()
            .filter(|c| c.set_id == set_id)
            .map(|c| c.id)
            .collect();
        for card_id in card_ids {
            self.remove_card(card_id);
        }
        self.sets.remove(&set_id);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[tracing::instrument(skip(self, password))]
    async fn create_user(&self, email: &str, password: &str) -> Result<User, Error> {
        let password_hash = password::hash_password(password);
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(Error::ConstraintViolation(format!(
                "duplicate key value violates unique constraint \"users_email_key\": {}",
                email
            )));
        }
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, Error> {
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, Error> {
        let tables = self.tables.lock().await;
        tables.users.get(&id).cloned().ok_or(Error::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: UserId) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        let set_ids: Vec<SetId> = tables
            .sets
            .values()
            .filter(|s| s.user_id == id)
            .map(|s| s.id)
            .collect();
        for set_id in set_ids {
            tables.remove_set(set_id);
        }
        tables.progress.retain(|_, p| p.user_id != id);
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn create_set(&self, new_set: NewSet, owner_id: UserId) -> Result<StudySet, Error> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&owner_id) {
            return Err(Error::ConstraintViolation(format!(
                "sets.user_id references missing user {}",
                owner_id
            )));
        }
        tables.last_set_id += 1;
        let now = Utc::now();
        let set = StudySet {
            id: tables.last_set_id,
            user_id: owner_id,
            title: new_set.title,
            description: new_set.description,
            is_public: new_set.is_public,
            created_at: now,
            updated_at: now,
            card_count: 0,
        };
        tables.sets.insert(set.id, set.clone());
        Ok(set)
    }

    async fn list_sets_by_owner(
        &self,
        owner_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error> {
        let tables = self.tables.lock().await;
        let owned = tables.sets.values().filter(|s| s.user_id == owner_id);
        Ok(page(owned, skip, limit).map(|s| tables.annotated(s)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_set(&self, set_id: SetId, requester: Option<UserId>) -> Result<StudySet, Error> {
        let tables = self.tables.lock().await;
        let set = tables.readable_set(set_id, requester).ok_or(Error::NotFound)?;
        Ok(tables.annotated(set))
    }

    #[tracing::instrument(skip(self))]
    async fn get_set_with_cards(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<SetWithCards, Error> {
        let tables = self.tables.lock().await;
        let set = tables.readable_set(set_id, requester).ok_or(Error::NotFound)?;
        Ok(SetWithCards {
            set: tables.annotated(set),
            cards: tables.cards_of(set_id),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn update_set(
        &self,
        set_id: SetId,
        owner_id: UserId,
        patch: SetPatch,
    ) -> Result<StudySet, Error> {
        let mut tables = self.tables.lock().await;
        let mut set = tables
            .writable_set(set_id, owner_id)
            .cloned()
            .ok_or(Error::NotFound)?;
        if !patch.is_empty() {
            patch.apply(&mut set);
            set.updated_at = later_than(set.updated_at);
            tables.sets.insert(set.id, set.clone());
        }
        Ok(tables.annotated(&set))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_set(&self, set_id: SetId, owner_id: UserId) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        if tables.writable_set(set_id, owner_id).is_none() {
            return Ok(false);
        }
        tables.remove_set(set_id);
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn search_public_sets(
        &self,
        query: &str,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error> {
        let needle = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(needle.as_str());
        let tables = self.tables.lock().await;
        let found = tables.sets.values().filter(|s| {
            s.is_public
                && (matches(&s.title) || s.description.as_deref().map_or(false, |d| matches(d)))
        });
        Ok(page(found, skip, limit).map(|s| tables.annotated(s)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn create_card(
        &self,
        set_id: SetId,
        owner_id: UserId,
        new_card: NewCard,
    ) -> Result<Card, Error> {
        let mut tables = self.tables.lock().await;
        if tables.writable_set(set_id, owner_id).is_none() {
            return Err(Error::NotFound);
        }
        tables.last_card_id += 1;
        let now = Utc::now();
        let card = Card {
            id: tables.last_card_id,
            set_id,
            term: new_card.term,
            definition: new_card.definition,
            image_url: new_card.image_url,
            audio_url: new_card.audio_url,
            created_at: now,
            updated_at: now,
        };
        tables.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn list_cards_by_set(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Vec<Card>, Error> {
        let tables = self.tables.lock().await;
        if tables.readable_set(set_id, requester).is_none() {
            return Ok(Vec::new());
        }
        Ok(tables.cards_of(set_id))
    }

    async fn get_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Card, Error> {
        let tables = self.tables.lock().await;
        tables
            .readable_set(set_id, requester)
            .and_then(|_| tables.cards.get(&card_id))
            .filter(|c| c.set_id == set_id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn update_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
        patch: CardPatch,
    ) -> Result<Card, Error> {
        let mut tables = self.tables.lock().await;
        if tables.writable_set(set_id, owner_id).is_none() {
            return Err(Error::NotFound);
        }
        let card = tables
            .cards
            .get_mut(&card_id)
            .filter(|c| c.set_id == set_id)
            .ok_or(Error::NotFound)?;
        if !patch.is_empty() {
            patch.apply(card);
            card.updated_at = later_than(card.updated_at);
        }
        Ok(card.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
    ) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        if tables.writable_set(set_id, owner_id).is_none() {
            return Ok(false);
        }
        let in_set = tables
            .cards
            .get(&card_id)
            .map_or(false, |c| c.set_id == set_id);
        if in_set {
            tables.remove_card(card_id);
        }
        Ok(in_set)
    }

    #[tracing::instrument(skip(self))]
    async fn upsert_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
        mastery_level: MasteryLevel,
    ) -> Result<Progress, Error> {
        let mut tables = self.tables.lock().await;
        if !tables.cards.contains_key(&card_id) {
            return Err(Error::NotFound);
        }
        if !tables.users.contains_key(&user_id) {
            return Err(Error::ConstraintViolation(format!(
                "user_card_progress.user_id references missing user {}",
                user_id
            )));
        }
        let existing = tables
            .progress
            .values_mut()
            .find(|p| p.user_id == user_id && p.card_id == card_id);
        if let Some(progress) = existing {
            progress.mastery_level = mastery_level;
            progress.last_studied = later_than(progress.last_studied);
            return Ok(progress.clone());
        }
        tables.last_progress_id += 1;
        let progress = Progress {
            id: tables.last_progress_id,
            user_id,
            card_id,
            mastery_level,
            last_studied: Utc::now(),
        };
        tables.progress.insert(progress.id, progress.clone());
        Ok(progress)
    }

    async fn list_progress_for_user(&self, user_id: UserId) -> Result<Vec<Progress>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_progress_for_set(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<Vec<Progress>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.progress_on_set(set_id, user_id))
    }

    #[tracing::instrument(skip(self))]
    async fn set_progress_summary(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<SetProgress, Error> {
        let tables = self.tables.lock().await;
        if tables.readable_set(set_id, Some(user_id)).is_none() {
            return Err(Error::NotFound);
        }
        let total_cards = aggregate::card_count(tables.cards.values(), set_id);
        let progress = tables.progress_on_set(set_id, user_id);
        Ok(aggregate::summarize(set_id, total_cards, &progress))
    }
}
