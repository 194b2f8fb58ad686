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

use std::str::FromStr;

use mobc::Connection;
use mobc_postgres::{
    tokio_postgres::{Config as PgConfig, NoTls},
    PgConnectionManager,
};
use tracing::info;

use crate::{Config, Error};

pub type Conn = Connection<PgConnectionManager<NoTls>>;
pub type Pool = mobc::Pool<PgConnectionManager<NoTls>>;

pub fn create_pool(config: &Config) -> Result<Pool, Error> {
    let pg_config = PgConfig::from_str(config.database_url.as_str())?;

    let manager = PgConnectionManager::new(pg_config, NoTls);
    Ok(mobc::Pool::builder()
        .max_open(config.pool_max_open)
        .max_idle(config.pool_max_idle)
        .get_timeout(Some(config.pool_timeout))
        .build(manager))
}

pub async fn get_db_conn(db_pool: &Pool) -> Result<Conn, Error> {
    Ok(db_pool.get().await?)
}

/// Create the tables if they do not exist yet.
pub async fn init_db(db_pool: &Pool) -> Result<(), Error> {
    let init_sql = include_str!("init.sql");
    let conn = get_db_conn(db_pool).await?;
    conn.batch_execute(init_sql).await?;
    info!("database schema initialized");
    Ok(())
}

/// Drop every table, and all data with them.
pub async fn uninit_db(db_pool: &Pool) -> Result<(), Error> {
    let uninit_sql = include_str!("uninit.sql");
    let conn = get_db_conn(db_pool).await?;
    conn.batch_execute(uninit_sql).await?;
    info!("database schema dropped");
    Ok(())
}
