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

use mobc_postgres::tokio_postgres::error::SqlState;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DBPoolError(#[from] mobc::Error<mobc_postgres::tokio_postgres::Error>),
    #[error(transparent)]
    DBError(mobc_postgres::tokio_postgres::Error),
    /// The entity does not exist, or the requester may not see it.
    #[error("not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("invalid mastery level {0}")]
    InvalidMasteryLevel(i32),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }
}

impl From<mobc_postgres::tokio_postgres::Error> for Error {
    fn from(item: mobc_postgres::tokio_postgres::Error) -> Error {
        match item.code() {
            Some(code)
                if *code == SqlState::UNIQUE_VIOLATION
                    || *code == SqlState::FOREIGN_KEY_VIOLATION
                    || *code == SqlState::CHECK_VIOLATION =>
            {
                let message = item
                    .as_db_error()
                    .map(|e| e.message().to_string())
                    .unwrap_or_else(|| item.to_string());
                Error::ConstraintViolation(message)
            }
            _ => Error::DBError(item),
        }
    }
}
