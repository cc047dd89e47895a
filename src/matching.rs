// Copyright 2020 by Michael Thies <mail@mhthies.de>, Gabriel Guckenbiehl <gabriel.guckenbiehl@gmx.de>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The matcher: turns the current `State` into a weighted bipartite graph of participants against
//! per-group seats and solves it for maximum total rating value using the Kuhn-Munkres (Hungarian)
//! method.
//!
//! Every group of capacity `C` contributes `C` seat columns. A participant-seat edge carries the
//! participant's rating value for that group, boosted for the first few seats of groups with a
//! minimum target size, so the optimum naturally fills those groups before spreading participants
//! out over the rest. Edges that violate a hard constraint (course/degree mismatch, excluded by
//! filter, disabled group) are weight zero, which is always strictly worse than any admissible
//! edge (`Rating::value` is positive for every valid rating index) — so they are only ever chosen
//! when no admissible edge exists at all.

use crate::config::Config;
use crate::interrupt::InterruptHandle;
use crate::state::State;
use crate::{Assignment, GroupId, ParticipantId};
use log::{debug, warn};
use pathfinding::matrix::Matrix;
use pathfinding::prelude::kuhn_munkres;

type Weight = u64;

/// One column of the seat matrix: which group it belongs to, its position within that group, and
/// the precomputed minimum-size steering bonus for that position.
struct Seat {
    group: GroupId,
    index_in_group: u32,
    bonus: Weight,
}

/// Computes, for every seat of a group with capacity `capacity` and minimum target `min_size`, a
/// small integer offset added to that seat's matching weight: `effect` for the first seat,
/// stepping down by one each time a geometrically growing threshold is crossed, reaching 0 well
/// before the group's last seats. This steers the matcher toward filling every group up to its
/// minimum target before spreading participants out over the rest, without ever outweighing an
/// actual preference difference (the offsets are tiny integers, added to — not multiplied with —
/// the participant's own rating value).
fn min_size_seat_offsets(capacity: u32, min_size: u32, effect: u32) -> Vec<u32> {
    if min_size == 0 || capacity == 0 {
        return vec![0; capacity as usize];
    }
    let step_factor = (capacity as f64 / min_size as f64).powf(1.0 / effect as f64);
    let mut offsets = Vec::with_capacity(capacity as usize);
    let mut current_offset = effect;
    let mut current_target = min_size as f64;
    for j in 0..capacity {
        offsets.push(current_offset);
        if (j as f64) + 1.99 >= current_target && current_offset > 0 {
            current_target *= step_factor;
            current_offset -= 1;
        }
    }
    offsets
}

/// Deterministic pseudo-random value in `[0, 1)` for sparsifying low-value edges, seeded by the
/// input so results are reproducible across runs with the same `--random-seed`.
fn pseudo_random(seed: u32, a: usize, b: usize) -> f64 {
    let mut x = (seed as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(a as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(b as u64 * 2 + 1);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    (x % 1_000_000) as f64 / 1_000_000.0
}

/// Builds the seat list, weight matrix and participant index for the currently unassigned
/// participants against the currently enabled groups. Only unassigned participants get a row —
/// an already-assigned participant (e.g. a team preassigned by an earlier scheduling phase) has
/// nothing left to solve for and must not compete for the remaining seats.
fn build_matrix(state: &State, config: &Config) -> (Matrix<Weight>, Vec<Seat>, Vec<ParticipantId>) {
    let num_groups = state.num_groups() as u32;
    let mut seats = Vec::new();
    for group in 0..state.num_groups() {
        if !state.group_is_enabled(group) {
            continue;
        }
        let capacity = state.group_capacity(group);
        let min_size = state.group_min_size(group, config).unwrap_or(0);
        let offsets = if config.use_min_group_sizes {
            min_size_seat_offsets(capacity, min_size, config.min_group_size_effect)
        } else {
            vec![0; capacity as usize]
        };
        for index_in_group in 0..capacity {
            seats.push(Seat { group, index_in_group, bonus: offsets[index_in_group as usize] as Weight });
        }
    }

    let participants: Vec<ParticipantId> = (0..state.num_participants()).filter(|&p| !state.is_assigned(p)).collect();
    let n = participants.len();
    let m = seats.len();
    let mut matrix = Matrix::new(n, m, 0 as Weight);
    for (row, &participant) in participants.iter().enumerate() {
        let rating = state.rating(participant);
        let mut kept_ranked = 0usize;
        for (seat_index, seat) in seats.iter().enumerate() {
            if !state.combination_is_valid(participant, seat.group) {
                continue;
            }
            let mut weight = rating[seat.group].value(num_groups) as Weight + seat.bonus;

            if config.edge_sparsification {
                kept_ranked += 1;
                if kept_ranked > 5
                    && pseudo_random(config.random_seed, participant, seat_index) < 0.3
                {
                    weight = 0;
                }
            }
            matrix[(row, seat_index)] = weight;
        }
    }
    (matrix, seats, participants)
}

/// The outcome of one matching run: the resulting assignment, its total weight, and the ids of
/// participants who could not be placed in any admissible group (all their edges were zero).
pub struct MatchResult {
    pub assignment: Assignment,
    pub total_weight: Weight,
    pub unmatched: Vec<ParticipantId>,
}

/// Solves the current state for the maximum-weight assignment of participants to group seats.
///
/// Every participant is mapped to some seat (Kuhn-Munkres always produces a complete matching of
/// the smaller side), but a participant whose every edge is zero-weight is reported via
/// `unmatched` rather than treated as actually assigned — such a placement has no real preference
/// backing it and calling code should either disable the corresponding group or surface this as a
/// fatal input error.
pub fn calculate_assignment(
    state: &State,
    config: &Config,
    interrupt: &InterruptHandle,
) -> Result<MatchResult, String> {
    let (matrix, seats, participants) = build_matrix(state, config);
    let n = participants.len();
    let m = seats.len();
    if n > m {
        return Err(format!(
            "not enough active group capacity ({}) for {} unassigned participants",
            m, n
        ));
    }

    let mut assignment: Assignment = vec![None; state.num_participants()];
    if n == 0 {
        return Ok(MatchResult { assignment, total_weight: 0, unmatched: Vec::new() });
    }
    debug!("Solving assignment matrix of {} participants x {} seats", n, m);

    let matrix_for_worker = matrix.clone();
    let (total_weight, row_to_col) = crate::interrupt::run_cancellable(interrupt, "matching", move || {
        kuhn_munkres(&matrix_for_worker)
    });

    let mut unmatched = Vec::new();
    for (row, &seat_index) in row_to_col.iter().enumerate() {
        let participant = participants[row];
        let weight = matrix[(row, seat_index)];
        if weight == 0 {
            unmatched.push(participant);
            continue;
        }
        assignment[participant] = Some(seats[seat_index].group);
    }
    if !unmatched.is_empty() {
        warn!("{} participant(s) could not be matched to any admissible group", unmatched.len());
    }

    Ok(MatchResult {
        assignment,
        total_weight,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseType, DegreeType, GroupData, Input, Rating, Semester, StudentData};
    use crate::interrupt::InterruptHandle;

    fn sample_input() -> Input {
        let groups = vec![
            GroupData::new("g0".into(), "G0".into(), 1, None, CourseType::Any, DegreeType::Any),
            GroupData::new("g1".into(), "G1".into(), 1, None, CourseType::Any, DegreeType::Any),
        ];
        let students = vec![
            StudentData::new("s0".into(), "S0".into(), CourseType::Any, DegreeType::Any, Semester::First, true),
            StudentData::new("s1".into(), "S1".into(), CourseType::Any, DegreeType::Any, Semester::First, true),
        ];
        let ratings = vec![vec![Rating::new(0), Rating::new(1)], vec![Rating::new(1), Rating::new(0)]];
        Input {
            groups,
            students,
            teams: Vec::new(),
            ratings,
            student_id_to_team_id: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn assigns_each_participant_to_preferred_group() {
        let input = sample_input();
        let config = Config::default();
        let state = State::new(&input, &config).unwrap();
        let interrupt = InterruptHandle::new();
        let result = calculate_assignment(&state, &config, &interrupt).unwrap();
        assert_eq!(result.assignment[0], Some(0));
        assert_eq!(result.assignment[1], Some(1));
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn insufficient_capacity_is_an_error() {
        let mut input = sample_input();
        input.groups[0].capacity = 1;
        input.groups.truncate(1);
        input.ratings = vec![vec![Rating::new(0)], vec![Rating::new(0)]];
        let config = Config::default();
        let state = State::new(&input, &config).unwrap();
        let interrupt = InterruptHandle::new();
        assert!(calculate_assignment(&state, &config, &interrupt).is_err());
    }
}
