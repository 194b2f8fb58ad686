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

use crate::models::{Card, MasteryLevel, Progress, SetId, SetProgress};

/// Number of cards referencing `set_id`.
pub fn card_count<'a, I>(cards: I, set_id: SetId) -> i64
where
    I: IntoIterator<Item = &'a Card>,
{
    cards.into_iter().filter(|c| c.set_id == set_id).count() as i64
}

/// Roll up one user's progress over a set of `total_cards` cards.
///
/// `progress` must already be restricted to the set's cards. Cards without a
/// record count as unknown.
pub fn summarize(set_id: SetId, total_cards: i64, progress: &[Progress]) -> SetProgress {
    let known = progress
        .iter()
        .filter(|p| p.mastery_level == MasteryLevel::Known)
        .count() as i64;
    SetProgress {
        set_id,
        total_cards,
        known,
        unknown: total_cards - known,
    }
}
