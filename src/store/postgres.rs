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

use async_trait::async_trait;
use mobc_postgres::tokio_postgres::{row::Row, GenericClient, IsolationLevel, Transaction};
use tracing::debug;

use super::Store;
use crate::{
    access::{self, Visibility},
    aggregate, db,
    models::*,
    password, Error,
};

const USER_COLUMNS: &str = "id, email, password_hash, created_at";

const SET_COLUMNS: &str = r#"
    s.id, s.user_id, s.title, s.description, s.is_public, s.created_at, s.updated_at,
    (SELECT COUNT(*) FROM cards c WHERE c.set_id = s.id) AS card_count
"#;

const CARD_COLUMNS: &str =
    "id, set_id, term, definition, image_url, audio_url, created_at, updated_at";

const PROGRESS_COLUMNS: &str = "p.id, p.user_id, p.card_id, p.mastery_level, p.last_studied";

/// A store backed by PostgreSQL. The schema is in `init.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: db::Pool,
}

impl PgStore {
    pub fn new(pool: db::Pool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &db::Pool {
        &self.pool
    }

    async fn conn(&self) -> Result<db::Conn, Error> {
        db::get_db_conn(&self.pool).await
    }
}

/// Open a read-only transaction whose queries all see one snapshot.
async fn snapshot(conn: &mut db::Conn) -> Result<Transaction<'_>, Error> {
    Ok(conn
        .build_transaction()
        .isolation_level(IsolationLevel::RepeatableRead)
        .read_only(true)
        .start()
        .await?)
}

impl<'a> From<&'a Row> for User {
    fn from(item: &'a Row) -> Self {
        User {
            id: item.get("id"),
            email: item.get("email"),
            password_hash: item.get("password_hash"),
            created_at: item.get("created_at"),
        }
    }
}

impl<'a> From<&'a Row> for StudySet {
    fn from(item: &'a Row) -> Self {
        StudySet {
            id: item.get("id"),
            user_id: item.get("user_id"),
            title: item.get("title"),
            description: item.get("description"),
            is_public: item.get("is_public"),
            created_at: item.get("created_at"),
            updated_at: item.get("updated_at"),
            card_count: item.get("card_count"),
        }
    }
}

impl<'a> From<&'a Row> for Card {
    fn from(item: &'a Row) -> Self {
        Card {
            id: item.get("id"),
            set_id: item.get("set_id"),
            term: item.get("term"),
            definition: item.get("definition"),
            image_url: item.get("image_url"),
            audio_url: item.get("audio_url"),
            created_at: item.get("created_at"),
            updated_at: item.get("updated_at"),
        }
    }
}

impl<'a> TryFrom<&'a Row> for Progress {
    type Error = Error;

    fn try_from(item: &'a Row) -> Result<Self, Self::Error> {
        Ok(Progress {
            id: item.get("id"),
            user_id: item.get("user_id"),
            card_id: item.get("card_id"),
            mastery_level: MasteryLevel::try_from(item.get::<_, i32>("mastery_level"))?,
            last_studied: item.get("last_studied"),
        })
    }
}

fn progress_rows(rows: &[Row]) -> Result<Vec<Progress>, Error> {
    rows.iter().map(Progress::try_from).collect()
}

/// Escape `query` for use as an ILIKE substring pattern. Postgres uses `\` as
/// the default LIKE escape character.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Split a nullable-column patch into "should set" and the new value.
fn nullable(field: Option<Option<String>>) -> (bool, Option<String>) {
    match field {
        Some(value) => (true, value),
        None => (false, None),
    }
}

async fn visibility<C: GenericClient>(
    client: &C,
    set_id: SetId,
    for_update: bool,
) -> Result<Option<Visibility>, Error> {
    let query = if for_update {
        "SELECT user_id, is_public FROM sets WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT user_id, is_public FROM sets WHERE id = $1"
    };
    Ok(client
        .query_opt(query, &[&set_id])
        .await?
        .map(|row| Visibility {
            owner_id: row.get("user_id"),
            is_public: row.get("is_public"),
        }))
}

async fn readable<C: GenericClient>(
    client: &C,
    set_id: SetId,
    requester: Option<UserId>,
) -> Result<bool, Error> {
    let allowed = visibility(client, set_id, false)
        .await?
        .map_or(false, |v| access::can_read(v, requester));
    if !allowed {
        debug!(set_id, ?requester, "set not readable");
    }
    Ok(allowed)
}

async fn readable_set<C: GenericClient>(
    client: &C,
    set_id: SetId,
    requester: Option<UserId>,
) -> Result<StudySet, Error> {
    let row = client
        .query_opt(
            format!("SELECT {} FROM sets s WHERE s.id = $1", SET_COLUMNS).as_str(),
            &[&set_id],
        )
        .await?;
    match row.as_ref().map(StudySet::from) {
        Some(set) if access::can_read(Visibility::from(&set), requester) => Ok(set),
        Some(_) => {
            debug!(set_id, ?requester, "set not readable");
            Err(Error::NotFound)
        }
        None => Err(Error::NotFound),
    }
}

async fn cards_of<C: GenericClient>(client: &C, set_id: SetId) -> Result<Vec<Card>, Error> {
    let rows = client
        .query(
            format!(
                "SELECT {} FROM cards WHERE set_id = $1 ORDER BY id",
                CARD_COLUMNS
            )
            .as_str(),
            &[&set_id],
        )
        .await?;
    Ok(rows.iter().map(Card::from).collect())
}

async fn progress_on_set<C: GenericClient>(
    client: &C,
    set_id: SetId,
    user_id: UserId,
) -> Result<Vec<Progress>, Error> {
    let rows = client
        .query(
            format!(
                r#"
                SELECT {} FROM user_card_progress p
                JOIN cards c ON c.id = p.card_id
                WHERE p.user_id = $1 AND c.set_id = $2
                ORDER BY p.id
                "#,
                PROGRESS_COLUMNS
            )
            .as_str(),
            &[&user_id, &set_id],
        )
        .await?;
    progress_rows(&rows)
}

async fn writable<C: GenericClient>(client: &C, set_id: SetId, user: UserId) -> Result<bool, Error> {
    let allowed = visibility(client, set_id, true)
        .await?
        .map_or(false, |v| access::can_write(v, user));
    if !allowed {
        debug!(set_id, user, "set not writable");
    }
    Ok(allowed)
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self, password))]
    async fn create_user(&self, email: &str, password: &str) -> Result<User, Error> {
        let password_hash = password::hash_password(password);
        let row = self
            .conn()
            .await?
            .query_one(
                format!(
                    "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {}",
                    USER_COLUMNS
                )
                .as_str(),
                &[&email, &password_hash],
            )
            .await?;
        Ok(User::from(&row))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS).as_str(),
                &[&email],
            )
            .await?;
        row.as_ref().map(User::from).ok_or(Error::NotFound)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        row.as_ref().map(User::from).ok_or(Error::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: UserId) -> Result<bool, Error> {
        let deleted = self
            .conn()
            .await?
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn create_set(&self, new_set: NewSet, owner_id: UserId) -> Result<StudySet, Error> {
        let row = self
            .conn()
            .await?
            .query_one(
                format!(
                    r#"
                    INSERT INTO sets AS s (user_id, title, description, is_public)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {}
                    "#,
                    SET_COLUMNS
                )
                .as_str(),
                &[
                    &owner_id,
                    &new_set.title,
                    &new_set.description,
                    &new_set.is_public,
                ],
            )
            .await?;
        Ok(StudySet::from(&row))
    }

    async fn list_sets_by_owner(
        &self,
        owner_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                format!(
                    r#"
                    SELECT {} FROM sets s
                    WHERE s.user_id = $1
                    ORDER BY s.id
                    OFFSET $2 LIMIT $3
                    "#,
                    SET_COLUMNS
                )
                .as_str(),
                &[&owner_id, &i64::from(skip), &i64::from(limit)],
            )
            .await?;
        Ok(rows.iter().map(StudySet::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_set(&self, set_id: SetId, requester: Option<UserId>) -> Result<StudySet, Error> {
        let conn = self.conn().await?;
        readable_set(&*conn, set_id, requester).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_set_with_cards(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<SetWithCards, Error> {
        let mut conn = self.conn().await?;
        let tx = snapshot(&mut conn).await?;
        let set = readable_set(&tx, set_id, requester).await?;
        let cards = cards_of(&tx, set_id).await?;
        tx.commit().await?;
        Ok(SetWithCards { set, cards })
    }

    #[tracing::instrument(skip(self))]
    async fn update_set(
        &self,
        set_id: SetId,
        owner_id: UserId,
        patch: SetPatch,
    ) -> Result<StudySet, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if !writable(&tx, set_id, owner_id).await? {
            return Err(Error::NotFound);
        }
        let row = if patch.is_empty() {
            tx.query_one(
                format!("SELECT {} FROM sets s WHERE s.id = $1", SET_COLUMNS).as_str(),
                &[&set_id],
            )
            .await?
        } else {
            let (set_description, description) = nullable(patch.description);
            tx.query_one(
                format!(
                    r#"
                    UPDATE sets AS s
                    SET title = COALESCE($2::TEXT, title),
                        description = CASE WHEN $3::BOOLEAN THEN $4::TEXT ELSE description END,
                        is_public = COALESCE($5::BOOLEAN, is_public),
                        updated_at = GREATEST(now(), updated_at + interval '1 microsecond')
                    WHERE s.id = $1
                    RETURNING {}
                    "#,
                    SET_COLUMNS
                )
                .as_str(),
                &[
                    &set_id,
                    &patch.title,
                    &set_description,
                    &description,
                    &patch.is_public,
                ],
            )
            .await?
        };
        tx.commit().await?;
        Ok(StudySet::from(&row))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_set(&self, set_id: SetId, owner_id: UserId) -> Result<bool, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if !writable(&tx, set_id, owner_id).await? {
            return Ok(false);
        }
        let deleted = tx
            .execute("DELETE FROM sets WHERE id = $1", &[&set_id])
            .await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn search_public_sets(
        &self,
        query: &str,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<StudySet>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                format!(
                    r#"
                    SELECT {} FROM sets s
                    WHERE s.is_public
                        AND (s.title ILIKE $1 OR s.description ILIKE $1)
                    ORDER BY s.id
                    OFFSET $2 LIMIT $3
                    "#,
                    SET_COLUMNS
                )
                .as_str(),
                &[&like_pattern(query), &i64::from(skip), &i64::from(limit)],
            )
            .await?;
        Ok(rows.iter().map(StudySet::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn create_card(
        &self,
        set_id: SetId,
        owner_id: UserId,
        new_card: NewCard,
    ) -> Result<Card, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if !writable(&tx, set_id, owner_id).await? {
            return Err(Error::NotFound);
        }
        let row = tx
            .query_one(
                format!(
                    r#"
                    INSERT INTO cards (set_id, term, definition, image_url, audio_url)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {}
                    "#,
                    CARD_COLUMNS
                )
                .as_str(),
                &[
                    &set_id,
                    &new_card.term,
                    &new_card.definition,
                    &new_card.image_url,
                    &new_card.audio_url,
                ],
            )
            .await?;
        tx.commit().await?;
        Ok(Card::from(&row))
    }

    async fn list_cards_by_set(
        &self,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Vec<Card>, Error> {
        let mut conn = self.conn().await?;
        let tx = snapshot(&mut conn).await?;
        if !readable(&tx, set_id, requester).await? {
            return Ok(Vec::new());
        }
        let cards = cards_of(&tx, set_id).await?;
        tx.commit().await?;
        Ok(cards)
    }

    async fn get_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        requester: Option<UserId>,
    ) -> Result<Card, Error> {
        let mut conn = self.conn().await?;
        let tx = snapshot(&mut conn).await?;
        if !readable(&tx, set_id, requester).await? {
            return Err(Error::NotFound);
        }
        let row = tx
            .query_opt(
                format!(
                    "SELECT {} FROM cards WHERE id = $1 AND set_id = $2",
                    CARD_COLUMNS
                )
                .as_str(),
                &[&card_id, &set_id],
            )
            .await?;
        tx.commit().await?;
        row.as_ref().map(Card::from).ok_or(Error::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn update_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
        patch: CardPatch,
    ) -> Result<Card, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if !writable(&tx, set_id, owner_id).await? {
            return Err(Error::NotFound);
        }
        let row = if patch.is_empty() {
            tx.query_opt(
                format!(
                    "SELECT {} FROM cards WHERE id = $1 AND set_id = $2",
                    CARD_COLUMNS
                )
                .as_str(),
                &[&card_id, &set_id],
            )
            .await?
        } else {
            let (set_image, image_url) = nullable(patch.image_url);
            let (set_audio, audio_url) = nullable(patch.audio_url);
            tx.query_opt(
                format!(
                    r#"
                    UPDATE cards
                    SET term = COALESCE($3::TEXT, term),
                        definition = COALESCE($4::TEXT, definition),
                        image_url = CASE WHEN $5::BOOLEAN THEN $6::TEXT ELSE image_url END,
                        audio_url = CASE WHEN $7::BOOLEAN THEN $8::TEXT ELSE audio_url END,
                        updated_at = GREATEST(now(), updated_at + interval '1 microsecond')
                    WHERE id = $1 AND set_id = $2
                    RETURNING {}
                    "#,
                    CARD_COLUMNS
                )
                .as_str(),
                &[
                    &card_id,
                    &set_id,
                    &patch.term,
                    &patch.definition,
                    &set_image,
                    &image_url,
                    &set_audio,
                    &audio_url,
                ],
            )
            .await?
        };
        tx.commit().await?;
        row.as_ref().map(Card::from).ok_or(Error::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_card(
        &self,
        card_id: CardId,
        set_id: SetId,
        owner_id: UserId,
    ) -> Result<bool, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if !writable(&tx, set_id, owner_id).await? {
            return Ok(false);
        }
        let deleted = tx
            .execute(
                "DELETE FROM cards WHERE id = $1 AND set_id = $2",
                &[&card_id, &set_id],
            )
            .await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn upsert_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
        mastery_level: MasteryLevel,
    ) -> Result<Progress, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        if tx
            .query_opt("SELECT id FROM cards WHERE id = $1", &[&card_id])
            .await?
            .is_none()
        {
            return Err(Error::NotFound);
        }
        let row = tx
            .query_one(
                format!(
                    r#"
                    INSERT INTO user_card_progress AS p (user_id, card_id, mastery_level)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, card_id) DO UPDATE
                    SET mastery_level = EXCLUDED.mastery_level,
                        last_studied = GREATEST(now(), p.last_studied + interval '1 microsecond')
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                )
                .as_str(),
                &[&user_id, &card_id, &i32::from(mastery_level)],
            )
            .await?;
        tx.commit().await?;
        Progress::try_from(&row)
    }

    async fn list_progress_for_user(&self, user_id: UserId) -> Result<Vec<Progress>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                format!(
                    "SELECT {} FROM user_card_progress p WHERE p.user_id = $1 ORDER BY p.id",
                    PROGRESS_COLUMNS
                )
                .as_str(),
                &[&user_id],
            )
            .await?;
        progress_rows(&rows)
    }

    async fn list_progress_for_set(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<Vec<Progress>, Error> {
        let conn = self.conn().await?;
        progress_on_set(&*conn, set_id, user_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn set_progress_summary(
        &self,
        set_id: SetId,
        user_id: UserId,
    ) -> Result<SetProgress, Error> {
        let mut conn = self.conn().await?;
        let tx = snapshot(&mut conn).await?;
        let set = readable_set(&tx, set_id, Some(user_id)).await?;
        let progress = progress_on_set(&tx, set_id, user_id).await?;
        tx.commit().await?;
        Ok(aggregate::summarize(set_id, set.card_count, &progress))
    }
}
