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

#![allow(dead_code)]

use std::{env, process::Command, sync::OnceLock};

use studysprout::{models::*, Config, MemoryStore, PgStore, Store};
use tokio::sync::Mutex;

static SCHEMA_LOCK: Mutex<()> = Mutex::const_new(());
static DATABASE_URL: OnceLock<String> = OnceLock::new();

pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
}

/// `DATABASE_URL` if set, otherwise a throwaway database from `pg_tmp`.
fn database_url() -> &'static str {
    DATABASE_URL.get_or_init(|| {
        env::var("DATABASE_URL").unwrap_or_else(|_| {
            let output = Command::new("pg_tmp")
                .output()
                .expect("valid pg_tmp instance");
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        })
    })
}

pub async fn pg_store() -> PgStore {
    let config = Config {
        database_url: database_url().to_string(),
        ..Config::from_env().expect("valid database configuration")
    };
    // Concurrent CREATE TABLE IF NOT EXISTS can still collide, so only one
    // test at a time sets up the schema.
    let _guard = SCHEMA_LOCK.lock().await;
    studysprout::connect(&config).await.expect("database reachable")
}

/// A string no other test (or earlier run against the same database) uses.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, studysprout::password::random_string(12).to_lowercase())
}

pub async fn user<S: Store>(store: &S, name: &str) -> User {
    store
        .create_user(format!("{}@example.com", unique(name)).as_str(), "correct horse")
        .await
        .expect("user created")
}

pub async fn set<S: Store>(store: &S, owner: &User, title: &str, is_public: bool) -> StudySet {
    store
        .create_set(
            NewSet {
                title: title.to_string(),
                description: None,
                is_public,
            },
            owner.id,
        )
        .await
        .expect("set created")
}

pub async fn card<S: Store>(store: &S, owner: &User, set: &StudySet, term: &str) -> Card {
    store
        .create_card(
            set.id,
            owner.id,
            NewCard {
                term: term.to_string(),
                definition: format!("definition of {}", term),
                ..Default::default()
            },
        )
        .await
        .expect("card created")
}

/// Run each named `async fn(&impl Store)` against the memory store and
/// against Postgres. The Postgres runs are ignored by default; run them with
/// `cargo test -- --ignored`.
macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(&crate::common::memory_store()).await;
                }
            )*
        }

        mod postgres {
            $(
                #[tokio::test]
                #[ignore = "needs PostgreSQL: set DATABASE_URL or install pg_tmp"]
                async fn $name() {
                    super::$name(&crate::common::pg_store().await).await;
                }
            )*
        }
    };
}

/// Like `store_tests!`, for `async fn(Arc<impl Store>)` scenarios that hand
/// the store to tasks on a multi-threaded runtime.
macro_rules! shared_store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(std::sync::Arc::new(crate::common::memory_store())).await;
                }
            )*
        }

        mod postgres {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                #[ignore = "needs PostgreSQL: set DATABASE_URL or install pg_tmp"]
                async fn $name() {
                    super::$name(std::sync::Arc::new(crate::common::pg_store().await)).await;
                }
            )*
        }
    };
}
