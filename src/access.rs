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

//! Read and write rules for sets. Cards and progress have no rules of their
//! own and are always gated through their parent set.

use crate::models::{StudySet, UserId};

/// The parts of a set the access rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub owner_id: UserId,
    pub is_public: bool,
}

impl<'a> From<&'a StudySet> for Visibility {
    fn from(item: &'a StudySet) -> Self {
        Visibility {
            owner_id: item.user_id,
            is_public: item.is_public,
        }
    }
}

/// Whether `requester` may see the set. Anonymous requesters only see public
/// sets.
pub fn can_read(set: Visibility, requester: Option<UserId>) -> bool {
    set.is_public || requester == Some(set.owner_id)
}

/// Whether `user` may modify or delete the set. Only the owner may.
pub fn can_write(set: Visibility, user: UserId) -> bool {
    set.owner_id == user
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE: Visibility = Visibility {
        owner_id: 1,
        is_public: false,
    };
    const PUBLIC: Visibility = Visibility {
        owner_id: 1,
        is_public: true,
    };

    #[test]
    fn private_sets_are_owner_only() {
        assert!(can_read(PRIVATE, Some(1)));
        assert!(!can_read(PRIVATE, Some(2)));
        assert!(!can_read(PRIVATE, None));
    }

    #[test]
    fn public_sets_are_readable_by_anyone() {
        assert!(can_read(PUBLIC, Some(1)));
        assert!(can_read(PUBLIC, Some(2)));
        assert!(can_read(PUBLIC, None));
    }

    #[test]
    fn public_never_grants_write() {
        assert!(can_write(PUBLIC, 1));
        assert!(!can_write(PUBLIC, 2));
        assert!(!can_write(PRIVATE, 2));
    }
}
