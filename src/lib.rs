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

//! Data access for the StudySprout flashcard service.
//!
//! Callers resolve the authenticated user themselves and pass its id, or
//! `None` for anonymous access, to one [`Store`] operation per request.

pub mod access;
pub mod aggregate;
pub mod db;
pub mod models;
pub mod password;
pub mod store;

mod config;
pub use config::Config;

mod error;
pub use error::Error;

pub use store::{
    MemoryStore, PgStore, Store, DEFAULT_SEARCH_PAGE_LIMIT, DEFAULT_SET_PAGE_LIMIT,
};

/// Connect to the configured database and make sure the schema exists.
pub async fn connect(config: &Config) -> Result<PgStore, Error> {
    let db_pool = db::create_pool(config)?;
    db::init_db(&db_pool).await?;
    Ok(PgStore::new(db_pool))
}
