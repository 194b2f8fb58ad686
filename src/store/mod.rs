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

//! The data-access operations.
//!
//! Every method is one atomic unit: either all of its writes land or none
//! do. Errors that hide a record from an unauthorized caller are always
//! [`Error::NotFound`], whether or not the record exists.

use async_trait::async_trait;

use crate::{models::*, password, Error};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_SET_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_SEARCH_PAGE_LIMIT: u32 = 20;

#[async_trait]
pub trait Store: Send + Sync {
    // Users.

    /// Insert a user with a freshly hashed password. A taken email is a
    /// [`Error::ConstraintViolation`]; callers check with
    /// [`Store::get_user_by_email`] first.
    async fn create_user(&self, email: &str, password: &str) -> Result<User, Error>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, Error>;

    async fn get_user_by_id(&self, id: UserId) -> Result<User, Error>;

    /// Delete a user along with their sets, those sets' cards, and every
    /// progress record touching either.
    async fn delete_user(&self, id: UserId) -> Result<bool, Error>;

    /// The user owning `email`, if `password` matches. A wrong password and
    /// an unknown email are indistinguishable.
    async fn authenticate_user(&self, email: &str, password: &str) -> Result<User, Error> {
        let user = self.get_user_by_email(email).await?;
        if password::verify_password(password, &user.password_hash) {
            Ok(user)
        } else {
            Err(Error::NotFound)
        }
    }

    // Sets.

    async fn create_set(&self, new_set: NewSet, owner_id: UserId) -> Result<StudySet, Error>;

    async fn list_sets_by_owner(
        &self,
        owner_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error>;

    async fn get_set(&self, set_id: SetId, requester: Option<UserId>) -> Result<StudySet, Error>;

    async fn update_set(
        &self,
        set_id: SetId,
        owner_id: UserId,
        patch: SetPatch,
    ) -> Result<StudySet, Error>;

    async fn delete_set(&self, set_id: SetId, owner_id: UserId) -> Result<bool, Error>;

    /// Public sets whose title or description contains `query`, ignoring
    /// case.
    async fn search_public_sets(
        &self,
        query: &str,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error>;

    /// A set and its cards, read together so `card_count` always equals
    /// `cards.len()`.
    async fn get_set_with_cards(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<SetWithCards, Error>;

    // Cards.

    async fn create_card(
        &self,
        set_id: SetId,
        owner_id: UserId,
        new_card: NewCard,
    ) -> Result<Card, Error>;

    /// Cards of a set, or nothing at all when the set is not visible.
    async fn list_cards_by_set(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Vec<Card>, Error>;

    async fn get_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Card, Error>;

    async fn update_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
        patch: CardPatch,
    ) -> Result<Card, Error>;

    async fn delete_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
    ) -> Result<bool, Error>;

    // Progress.

    /// Record `mastery_level` for the pair, overwriting any earlier record.
    ///
    /// Only the card's existence is checked, not whether `user_id` can see
    /// its set.
    async fn upsert_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
        mastery_level: MasteryLevel,
    ) -> Result<Progress, Error>;

    async fn list_progress_for_user(&self, user_id: UserId) -> Result<Vec<Progress>, Error>;

    /// The user's records on cards of `set_id`. The set's visibility is not
    /// checked.
    async fn list_progress_for_set(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<Vec<Progress>, Error>;

    /// Roll up the user's progress over a set they can read.
    async fn set_progress_summary(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<SetProgress, Error>;
}
