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

//! The outer assignment loops built on top of `matching::calculate_assignment`: team-safe
//! capacity reduction, minimum-group-size enforcement and per-type quota enforcement.
//!
//! Each loop works on a *working copy* of `State` (via `Clone`), applies the resulting
//! assignment, and either commits the clone back over the caller's state or discards it,
//! depending on whether the step improved the feasibility of the solution. This way a failed or
//! aborted step never corrupts the state the caller already had.

use crate::config::Config;
use crate::filter::Filter;
use crate::interrupt::InterruptHandle;
use crate::matching::calculate_assignment;
use crate::state::State;
use crate::{GroupId, StudentId};
use log::{debug, info, warn};

/// Which participants `apply_assignment` should actually commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyScope {
    All,
    Teams,
}

/// Tries to apply `assignment` to `state`, restricted to the participants selected by `scope`.
/// Works on a clone so a failure (a selected participant's group no longer has room, e.g. because
/// `assignment` was computed against a different, reduced capacity) leaves `state` untouched.
/// Returns whether every selected, non-`None` entry could be applied; `state` is only updated on
/// success. Unlike a plain re-apply, this never resets `state` first: any assignment already
/// committed in an earlier round is kept and built upon.
fn apply_assignment(state: &mut State, assignment: &[Option<GroupId>], scope: ApplyScope) -> bool {
    let mut candidate = state.clone();
    let mut success = true;
    for (participant, group) in assignment.iter().enumerate() {
        let selected = match scope {
            ApplyScope::All => true,
            ApplyScope::Teams => candidate.is_team(participant),
        };
        if !selected {
            continue;
        }
        if let Some(group) = group {
            if !candidate.assign_participant(participant, *group) {
                warn!(
                    "Capacity of group \"{}\" exceeded while applying assignment",
                    candidate.group_data(*group).name
                );
                success = false;
            }
        }
    }
    if success {
        *state = candidate;
    }
    success
}

/// Directly assigns every maximum-size team whose `proposal` would overflow its target group's
/// real remaining capacity, so that group shrinks before the next round's capacity reduction is
/// computed. Mirrors `algorithms.cpp::preassignLargeTeams`: for each group where the proposal's
/// total proposed team size exceeds `state.group_capacity(group)`, every team proposed for that
/// group at the group's largest proposed team size is assigned directly (others are left for the
/// next round). Returns the number of teams preassigned this way — counted once per qualifying
/// team, not deduplicated per group, since it feeds directly into the next round's
/// `total_reduced`.
fn preassign_large_teams(state: &mut State, proposal: &[Option<GroupId>]) -> u32 {
    let num_groups = state.num_groups();
    let mut teams_per_group: Vec<Vec<usize>> = vec![Vec::new(); num_groups];
    let mut max_size = vec![0u32; num_groups];
    let mut total_size = vec![0u32; num_groups];

    for participant in 0..state.num_participants() {
        if !state.is_team(participant) {
            continue;
        }
        if let Some(group) = proposal[participant] {
            let size = state.team_data(participant).size() as u32;
            teams_per_group[group].push(participant);
            max_size[group] = max_size[group].max(size);
            total_size[group] += size;
        }
    }

    let mut modified = 0u32;
    for group in 0..num_groups {
        if total_size[group] <= state.group_capacity(group) {
            continue;
        }
        for &team in &teams_per_group[group].clone() {
            if state.team_data(team).size() as u32 == max_size[group] {
                modified += 1;
                if state.assign_participant(team, group) {
                    debug!(
                        "Preassigning team \"{}\" to group \"{}\"",
                        state.team_data(team).id,
                        state.group_data(group).name
                    );
                } else {
                    debug!(
                        "Preassigning team \"{}\" to group \"{}\" failed (capacity exceeded)",
                        state.team_data(team).id,
                        state.group_data(group).name
                    );
                }
            }
        }
    }
    modified
}

/// Two-phase team-safe scheduling, grounded on `algorithms.cpp::assignTeamsAndStudents`: resets
/// the state, then repeatedly solves a capacity-reduced sub-problem sized to reserve room for
/// still-unplaced teams and commits only its team assignments; whenever a round's team
/// assignments don't fit the real remaining capacity, the overflowing groups' largest proposed
/// teams are preassigned directly (`preassign_large_teams`) and the reduction grows stricter for
/// the next round. Once a round's team assignments commit cleanly, a final full match places
/// everyone else.
pub fn assign_teams_and_students(
    state: &mut State,
    config: &Config,
    interrupt: &InterruptHandle,
) -> Result<(), String> {
    state.reset();
    let num_students = state.num_students() as f64;
    let active_capacity = state.total_active_group_capacity();
    debug_assert!(
        num_students == 0.0 || (active_capacity as f64) > num_students,
        "active group capacity must exceed the student count (enforced by State::new's capacity buffer)"
    );

    let mut total_reduced: u32 = 0;
    let max_iterations = state.num_participants() + 1;
    let mut iterations = 0usize;
    loop {
        if interrupt.stop_requested() {
            info!("Stopping team assignment early due to interrupt");
            break;
        }
        let additional_students_in_teams: u32 = (0..state.num_participants())
            .filter(|&p| state.is_team(p) && !state.is_assigned(p))
            .map(|p| state.team_data(p).size() as u32 - 1)
            .sum();
        let team_factor = if num_students > 0.0 {
            (num_students - additional_students_in_teams as f64) / num_students
        } else {
            1.0
        };
        let mod_reduced_factor = if active_capacity > 0 {
            (active_capacity as f64 + total_reduced as f64) / active_capacity as f64
        } else {
            1.0
        };
        let reduction_factor = team_factor * mod_reduced_factor;
        debug!("Relative capacity for team assignment set to {:.3}", reduction_factor);

        let mut reduced = state.clone();
        for group in 0..reduced.num_groups() {
            if !reduced.group_is_enabled(group) {
                continue;
            }
            let capacity = reduced.group_capacity(group);
            let new_capacity = (reduction_factor * capacity as f64).ceil() as u32;
            reduced.set_capacity(group, new_capacity);
        }
        let result = calculate_assignment(&reduced, config, interrupt)?;
        if apply_assignment(state, &result.assignment, ApplyScope::Teams) {
            break;
        }
        debug!("Team assignment not successful due to exceeded capacity, preassigning large teams and retrying");
        total_reduced += preassign_large_teams(state, &result.assignment);

        iterations += 1;
        if iterations >= max_iterations {
            warn!(
                "Team-safe scheduling did not converge after {} round(s), proceeding with the partial result",
                iterations
            );
            break;
        }
    }

    let result = calculate_assignment(state, config, interrupt)?;
    apply_assignment(state, &result.assignment, ApplyScope::All);
    if !result.unmatched.is_empty() {
        warn!(
            "{} participant(s) remain unassigned after the final matching pass",
            result.unmatched.len()
        );
    }
    Ok(())
}

/// Groups currently below their minimum target size, with at least one participant assigned
/// (an empty group isn't a partial-fill problem, it's a candidate for disabling instead).
fn groups_below_min_size(state: &State, config: &Config) -> Vec<GroupId> {
    (0..state.num_groups())
        .filter(|&g| state.group_is_enabled(g))
        .filter(|&g| state.group_size(g) > 0)
        .filter(|&g| match state.group_min_size(g, config) {
            Some(min) => (state.group_size(g) as u32) < min,
            None => false,
        })
        .collect()
}

/// Enforces that every non-empty enabled group reaches its minimum target size, by repeatedly
/// disabling the smallest under-target groups and re-matching, until either every remaining group
/// clears its minimum or no further group can be disabled without leaving participants
/// unplaceable. `allowed_min` is raised by one group-size step each round so the loop is
/// guaranteed to terminate: once no group is small enough to be disabled by the threshold, we
/// simply accept the shortfall rather than looping forever.
pub fn assign_with_minimum_number_per_group(
    state: &mut State,
    config: &Config,
    interrupt: &InterruptHandle,
) -> Result<(), String> {
    if !config.use_min_group_sizes {
        return assign_teams_and_students(state, config, interrupt);
    }

    assign_teams_and_students(state, config, interrupt)?;
    let mut allowed_min: u32 = 0;
    loop {
        if interrupt.stop_requested() {
            info!("Stopping minimum-group-size loop early due to interrupt");
            break;
        }
        let small_groups = groups_below_min_size(state, config);
        if small_groups.is_empty() {
            break;
        }
        let to_disable: Vec<GroupId> = small_groups
            .into_iter()
            .filter(|&g| (state.group_size(g) as u32) <= allowed_min)
            .take(config.disabled_groups_per_step)
            .collect();
        if to_disable.is_empty() {
            allowed_min += 1;
            if allowed_min > config.group_disable_threshold as u32 {
                debug!("No more groups qualify for disabling, accepting remaining shortfalls");
                break;
            }
            continue;
        }
        for group in &to_disable {
            info!(
                "Disabling group {} (only {} participants, below target)",
                state.group_data(*group).id,
                state.group_size(*group)
            );
            state.disable_group(*group);
        }
        if state.num_active_groups() == 0 {
            return Err("every group was disabled while enforcing minimum group sizes".to_string());
        }
        assign_teams_and_students(state, config, interrupt)?;
    }
    Ok(())
}

/// Clears the type-specific-assignment flag (exempting from filters) for every student whose best
/// rating index is at or above `config.type_specific_assignment_threshold`. Students who are
/// already indifferent between many groups gain nothing from being held to a type quota, and
/// exempting them gives the quota loop more room to satisfy everyone else.
pub fn disable_type_specific_assignment_below_threshold(state: &mut State, config: &Config) {
    if config.type_specific_assignment_threshold == 0 {
        return;
    }
    for student in 0..state.num_students() {
        let participant = match (0..state.num_participants()).find(|&p| {
            !state.is_team(p) && state.part_id_to_student_id(p) == student
        }) {
            Some(p) => p,
            None => continue, // student is part of a multi-member team, not handled here
        };
        let best_index = state.rating(participant).iter().map(|r| r.index()).min().unwrap_or(0);
        if best_index >= config.type_specific_assignment_threshold {
            state.disable_type_specific_assignment(student);
        }
    }
}

/// How badly a `(filter, group)` pair violates its quota: higher means more urgent to fix. We
/// weight the absolute shortfall more than the shortfall alone, so the loop prioritizes groups
/// that are both small in absolute numbers and far from their quota.
fn violation_score(min: StudentId, num: StudentId) -> i64 {
    2 * (min as i64 - num as i64) - num as i64
}

/// Number of participants in `group` matching `filter` and still subject to type-specific
/// assignment.
fn num_filtered(state: &State, group: GroupId, filter: &Filter) -> StudentId {
    state
        .group_assignment_list(group)
        .iter()
        .filter(|&&(student, _)| {
            state.type_specific_assignment(student) && filter.apply(&state.input().students[student])
        })
        .count()
}

/// Enforces, for every `(filter, minimum)` quota, that every non-empty enabled group has at least
/// `minimum` matching participants, by installing the filter on the worst-violating groups (which
/// excludes non-matching students from being placed there on the next matching pass) and
/// re-matching, repeating until every quota is satisfied or no further filter can be installed
/// without leaving a group empty.
pub fn assert_minimum_number_per_group_for_specific_type(
    state: &mut State,
    config: &Config,
    interrupt: &InterruptHandle,
    quotas: &[(Filter, StudentId)],
) -> Result<(), String> {
    for (filter, min) in quotas {
        loop {
            if interrupt.stop_requested() {
                info!("Stopping type-quota loop early due to interrupt");
                return Ok(());
            }
            let mut violators: Vec<(GroupId, StudentId)> = (0..state.num_groups())
                .filter(|&g| state.group_is_enabled(g) && state.group_size(g) > 0)
                .filter(|&g| !state.group_contains_filter(g, filter))
                .map(|g| (g, num_filtered(state, g, filter)))
                .filter(|&(_, num)| num < *min)
                .collect();
            if violators.is_empty() {
                break;
            }
            // Stack-discipline: always fix the single worst violator first, since installing a
            // filter changes every other group's matching pressure and stale scores would be
            // misleading.
            violators.sort_by_key(|&(_, num)| std::cmp::Reverse(violation_score(*min, num)));
            let (group, num) = violators[0];
            debug!(
                "Installing filter '{}' on group {} ({} matching participants, need {})",
                filter.name(),
                state.group_data(group).id,
                num,
                min
            );
            let mut candidate = state.clone();
            candidate.add_filter_to_group(group, filter.clone());
            let result = calculate_assignment(&candidate, config, interrupt)?;
            if !result.unmatched.is_empty() || !apply_assignment(&mut candidate, &result.assignment, ApplyScope::All) {
                warn!(
                    "Installing filter '{}' on group {} would leave participants unmatched, skipping",
                    filter.name(),
                    state.group_data(group).id
                );
                state.add_filter_to_group(group, filter.clone());
                continue;
            }
            *state = candidate;
        }
    }
    Ok(())
}

/// Returns the ids of enabled, non-empty groups, ordered by how many participants matching
/// `filter` they currently hold (ascending). Used for diagnostics and reporting.
pub fn groups_by_num_filtered(state: &State, filter: &Filter) -> Vec<(GroupId, StudentId)> {
    let mut result: Vec<(GroupId, StudentId)> = (0..state.num_groups())
        .filter(|&g| state.group_is_enabled(g) && state.group_size(g) > 0)
        .map(|g| (g, num_filtered(state, g, filter)))
        .collect();
    result.sort_by_key(|&(_, num)| num);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseType, DegreeType, GroupData, Input, Rating, Semester, StudentData, TeamData};
    use crate::interrupt::InterruptHandle;

    fn sample_input() -> Input {
        let groups = vec![
            GroupData::new("g0".into(), "G0".into(), 3, None, CourseType::Any, DegreeType::Any),
            GroupData::new("g1".into(), "G1".into(), 3, None, CourseType::Any, DegreeType::Any),
        ];
        let students = (0..4)
            .map(|i| {
                StudentData::new(
                    format!("s{}", i),
                    format!("S{}", i),
                    CourseType::Any,
                    DegreeType::Any,
                    Semester::First,
                    true,
                )
            })
            .collect();
        let ratings = vec![
            vec![Rating::new(0), Rating::new(1)],
            vec![Rating::new(0), Rating::new(1)],
            vec![Rating::new(1), Rating::new(0)],
            vec![Rating::new(1), Rating::new(0)],
        ];
        Input {
            groups,
            students,
            teams: Vec::new(),
            ratings,
            student_id_to_team_id: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn assign_teams_and_students_places_everyone() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let interrupt = InterruptHandle::new();
        assign_teams_and_students(&mut state, &config, &interrupt).unwrap();
        assert!((0..state.num_participants()).all(|p| state.is_assigned(p)));
    }

    #[test]
    fn large_team_is_preassigned_before_matching() {
        let mut input = sample_input();
        input.teams.push(TeamData::new("t0".into(), vec![0, 1, 2]));
        input.ratings[1] = input.ratings[0].clone();
        input.ratings[2] = input.ratings[0].clone();
        input.groups[0].capacity = 3;
        input.groups[1].capacity = 3;
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let interrupt = InterruptHandle::new();
        assign_teams_and_students(&mut state, &config, &interrupt).unwrap();
        let team_participant = (0..state.num_participants()).find(|&p| state.is_team(p)).unwrap();
        assert!(state.is_assigned(team_participant));
    }

    #[test]
    fn type_quota_loop_installs_filter_on_violating_group() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let interrupt = InterruptHandle::new();
        assign_teams_and_students(&mut state, &config, &interrupt).unwrap();
        let quota = vec![(Filter::empty("All"), 10)];
        // With only 4 students and a quota of 10, no group can ever satisfy it; the loop must
        // terminate without looping forever rather than assert success.
        assert!(assert_minimum_number_per_group_for_specific_type(&mut state, &config, &interrupt, &quota).is_ok());
    }
}
