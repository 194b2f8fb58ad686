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

use std::{env, str::FromStr, time::Duration};

use crate::Error;

const DEFAULT_DATABASE_URL: &'static str = "postgres://postgres@0.0.0.0:5432";
const DEFAULT_POOL_MAX_OPEN: u64 = 32;
const DEFAULT_POOL_MAX_IDLE: u64 = 8;
const DEFAULT_POOL_TIMEOUT_SECONDS: u64 = 15;

/// Connection settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub pool_max_open: u64,
    pub pool_max_idle: u64,
    pub pool_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pool_max_open: DEFAULT_POOL_MAX_OPEN,
            pool_max_idle: DEFAULT_POOL_MAX_IDLE,
            pool_timeout: Duration::from_secs(DEFAULT_POOL_TIMEOUT_SECONDS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            pool_max_open: parse_or(&lookup, "DB_POOL_MAX_OPEN", defaults.pool_max_open)?,
            pool_max_idle: parse_or(&lookup, "DB_POOL_MAX_IDLE", defaults.pool_max_idle)?,
            pool_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_POOL_TIMEOUT_SECONDS",
                DEFAULT_POOL_TIMEOUT_SECONDS,
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", key, raw))),
        None => Ok(default),
    }
}
