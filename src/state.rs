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

//! Mutable assignment state, built once from an immutable `Input` and then cloned freely as a
//! cheap working copy whenever a component wants to try an assignment it might discard.

use crate::config::Config;
use crate::domain::{team_combination_is_valid, Input, Rating, StudentData, TeamData};
use crate::filter::Filter;
use crate::{GroupId, ParticipantId, StudentId};

/// A participant is either a pre-formed team or a single student not part of any (multi-member)
/// team. Teams of size 1 are demoted to lone students during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Team(usize),
    Student(StudentId),
}

/// Mutable per-group bookkeeping: capacity, enabled flag and installed filters.
///
/// `remaining_capacity` is how many more seats are free right now (Invariant I1:
/// `remaining_capacity + group_size == original_capacity` at all times); `original_capacity` is
/// the design capacity from the input, kept around for reporting and for deriving a default
/// minimum group size.
#[derive(Debug, Clone)]
struct GroupState {
    original_capacity: u32,
    remaining_capacity: u32,
    enabled: bool,
    filters: Vec<Filter>,
}

/// Assignment state for one run of the matcher. Cheap to `clone()`: every component owns its
/// data, nothing but the reference to `Input` is shared.
#[derive(Debug, Clone)]
pub struct State<'a> {
    input: &'a Input,
    groups: Vec<GroupState>,
    /// `assignment_list[group]` = participants currently assigned there, as `(student_id,
    /// participant_id)` pairs (one pair per student, so a team contributes one pair per member).
    assignment_list: Vec<Vec<(StudentId, ParticipantId)>>,
    participants: Vec<Participant>,
    assignment: Vec<Option<GroupId>>,
    /// Per-student rating vectors actually used by the matcher: a clone of `input.ratings` with
    /// empty vectors (a team member who did not provide their own) backfilled from a populated
    /// sibling in the same team.
    effective_ratings: Vec<Vec<Rating>>,
    /// Per-student override of `StudentData::type_specific_assignment`, initialized from it and
    /// only ever cleared, never set, by `disable_type_specific_assignment`.
    type_specific_assignment: Vec<bool>,
}

impl<'a> State<'a> {
    /// Builds the initial state: singleton teams are demoted to lone students, team ratings are
    /// checked for internal consistency, and the capacity buffer invariant is asserted.
    pub fn new(input: &'a Input, config: &Config) -> Result<Self, String> {
        let num_groups = input.num_groups();
        let mut is_in_team = vec![false; input.students.len()];
        let mut participants = Vec::new();

        for group in &input.groups {
            if group.capacity > config.max_group_size {
                return Err(format!(
                    "group {} has capacity {}, exceeding the configured maximum of {}",
                    group.id, group.capacity, config.max_group_size
                ));
            }
        }

        for (team_index, team) in input.teams.iter().enumerate() {
            if team.members.is_empty() {
                return Err(format!("team {} has no members", team.id));
            }
            if team.members.len() > config.max_team_size {
                return Err(format!(
                    "team {} has {} members, exceeding the configured maximum of {}",
                    team.id,
                    team.members.len(),
                    config.max_team_size
                ));
            }
            for &member in &team.members {
                if member >= input.students.len() {
                    return Err(format!("team {} references unknown student index {}", team.id, member));
                }
            }
            if team.members.len() > 1 {
                for &member in &team.members {
                    is_in_team[member] = true;
                }
                participants.push(Participant::Team(team_index));
            }
            // Teams of size 1 fall through: the lone member is picked up by the loop below.
        }
        for student_id in 0..input.students.len() {
            if !is_in_team[student_id] {
                participants.push(Participant::Student(student_id));
            }
        }

        // A team member who omitted their own ratings (an empty vector, see `parse_ratings`)
        // inherits the rating vector of the first populated sibling, rather than being treated as
        // an error or silently filled with the worst rating for every group.
        let mut effective_ratings = input.ratings.clone();
        for team in &input.teams {
            if team.members.len() <= 1 {
                continue;
            }
            let source = team.members.iter().copied().find(|&m| !effective_ratings[m].is_empty());
            if let Some(source) = source {
                let source_ratings = effective_ratings[source].clone();
                for &member in &team.members {
                    if effective_ratings[member].is_empty() {
                        effective_ratings[member] = source_ratings.clone();
                    }
                }
            }
        }

        for team in &input.teams {
            if team.members.len() <= 1 {
                continue;
            }
            let first_rating = effective_ratings[team.members[0]].clone();
            for &member in &team.members[1..] {
                if !crate::domain::ratings_equal(&first_rating, &effective_ratings[member]) {
                    return Err(format!(
                        "team {} has members with inconsistent ratings",
                        team.id
                    ));
                }
                if input.students[member].type_specific_assignment
                    != input.students[team.members[0]].type_specific_assignment
                {
                    return Err(format!(
                        "team {} has members with inconsistent type_specific_assignment flags",
                        team.id
                    ));
                }
            }
        }

        for ratings in &mut effective_ratings {
            if ratings.is_empty() {
                if !config.allow_default_ratings {
                    return Err(
                        "incomplete rating list found, pass --allow-default-ratings to tolerate this"
                            .to_string(),
                    );
                }
                *ratings = vec![Rating::min_rating(num_groups as u32); num_groups];
            } else if ratings.len() != num_groups && !config.allow_default_ratings {
                return Err(
                    "incomplete rating list found, pass --allow-default-ratings to tolerate this"
                        .to_string(),
                );
            }
            for rating in ratings.iter() {
                if rating.index() >= num_groups as u32 {
                    return Err("rating index out of range for the number of groups".to_string());
                }
            }
        }

        let groups: Vec<GroupState> = input
            .groups
            .iter()
            .map(|g| GroupState {
                original_capacity: g.capacity,
                remaining_capacity: g.capacity,
                enabled: true,
                filters: Vec::new(),
            })
            .collect();

        let total_capacity: u64 = groups.iter().map(|g| g.original_capacity as u64).sum();
        let num_students = input.students.len() as u64;
        if num_students > 0 && (total_capacity as f64) < (num_students as f64) * config.capacity_buffer
        {
            return Err(format!(
                "total group capacity ({}) does not satisfy the capacity buffer ({}) over {} students",
                total_capacity, config.capacity_buffer, num_students
            ));
        }

        let type_specific_assignment: Vec<bool> =
            input.students.iter().map(|s| s.type_specific_assignment).collect();

        Ok(State {
            input,
            groups,
            assignment_list: vec![Vec::new(); num_groups],
            assignment: vec![None; participants.len()],
            participants,
            effective_ratings,
            type_specific_assignment,
        })
    }

    pub fn input(&self) -> &'a Input {
        self.input
    }

    pub fn num_groups(&self) -> GroupId {
        self.groups.len()
    }

    pub fn num_active_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.enabled).count()
    }

    /// Sum of the *remaining* capacity of every enabled group.
    pub fn total_active_group_capacity(&self) -> u32 {
        self.groups.iter().filter(|g| g.enabled).map(|g| g.remaining_capacity).sum()
    }

    pub fn group_data(&self, group: GroupId) -> &crate::domain::GroupData {
        &self.input.groups[group]
    }

    /// Remaining (not yet occupied) capacity of `group`. Satisfies Invariant I1:
    /// `group_capacity(g) + group_size(g) == group_original_capacity(g)`.
    pub fn group_capacity(&self, group: GroupId) -> u32 {
        self.groups[group].remaining_capacity
    }

    /// The group's original, never-decremented capacity from the input.
    pub fn group_original_capacity(&self, group: GroupId) -> u32 {
        self.groups[group].original_capacity
    }

    /// Target minimum size for `group`, or `None` if none was given and no default applies.
    pub fn group_min_size(&self, group: GroupId, config: &Config) -> Option<u32> {
        match self.input.groups[group].min_target_size {
            Some(size) => Some(size),
            None if config.allow_min_group_size_default => {
                Some((self.groups[group].original_capacity / 2).max(1))
            }
            None => None,
        }
    }

    pub fn group_is_enabled(&self, group: GroupId) -> bool {
        self.groups[group].enabled
    }

    pub fn group_assignment_list(&self, group: GroupId) -> &[(StudentId, ParticipantId)] {
        &self.assignment_list[group]
    }

    pub fn group_size(&self, group: GroupId) -> usize {
        self.assignment_list[group].len()
    }

    /// Sum of the ratings' `value()` for all participants currently assigned to `group`, rating
    /// each student by its preference index for `group` specifically.
    pub fn group_weight(&self, group: GroupId) -> u32 {
        let num_groups = self.num_groups() as u32;
        self.assignment_list[group]
            .iter()
            .map(|&(student, _)| self.effective_ratings[student][group].value(num_groups))
            .sum::<u32>()
    }

    pub fn num_students(&self) -> usize {
        self.input.students.len()
    }

    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    pub fn is_team(&self, participant: ParticipantId) -> bool {
        matches!(self.participants[participant], Participant::Team(_))
    }

    pub fn is_assigned(&self, participant: ParticipantId) -> bool {
        self.assignment[participant].is_some()
    }

    pub fn get_assignment(&self, participant: ParticipantId) -> Option<GroupId> {
        self.assignment[participant]
    }

    pub fn student_data(&self, participant: ParticipantId) -> &StudentData {
        match self.participants[participant] {
            Participant::Student(s) => &self.input.students[s],
            Participant::Team(_) => panic!("student_data called on a team participant"),
        }
    }

    pub fn team_data(&self, participant: ParticipantId) -> &TeamData {
        match self.participants[participant] {
            Participant::Team(t) => &self.input.teams[t],
            Participant::Student(_) => panic!("team_data called on a student participant"),
        }
    }

    /// Members of `participant`, as student ids (a single-element slice for a lone student).
    pub fn members(&self, participant: ParticipantId) -> &[StudentId] {
        match self.participants[participant] {
            Participant::Team(t) => &self.input.teams[t].members,
            Participant::Student(ref s) => std::slice::from_ref(s),
        }
    }

    /// The rating vector that applies to `participant` (a team's rating is its first member's,
    /// which is guaranteed consistent with all other members' by `State::new`, after inheriting
    /// from any sibling that provided one).
    pub fn rating(&self, participant: ParticipantId) -> &[Rating] {
        match self.participants[participant] {
            Participant::Team(t) => &self.effective_ratings[self.input.teams[t].members[0]],
            Participant::Student(s) => &self.effective_ratings[s],
        }
    }

    pub fn disable_group(&mut self, group: GroupId) {
        self.groups[group].enabled = false;
    }

    pub fn add_filter_to_group(&mut self, group: GroupId, filter: Filter) {
        if !self.group_contains_filter(group, &filter) {
            self.groups[group].filters.push(filter);
        }
    }

    pub fn group_contains_filter(&self, group: GroupId, filter: &Filter) -> bool {
        self.groups[group].filters.iter().any(|f| f.id() == filter.id())
    }

    /// A participant is excluded from `group` if it is subject to type-specific assignment and
    /// any filter installed on `group` excludes every one of its members.
    pub fn is_excluded_from_group(&self, participant: ParticipantId, group: GroupId) -> bool {
        if self.groups[group].filters.is_empty() {
            return false;
        }
        self.members(participant).iter().any(|&student| {
            self.type_specific_assignment[student]
                && self.groups[group]
                    .filters
                    .iter()
                    .any(|f| f.apply(&self.input.students[student]))
        })
    }

    pub fn combination_is_valid(&self, participant: ParticipantId, group: GroupId) -> bool {
        if self.is_excluded_from_group(participant, group) {
            return false;
        }
        match self.participants[participant] {
            Participant::Team(t) => {
                team_combination_is_valid(&self.input.teams[t], &self.input.groups[group], &self.input.students)
            }
            Participant::Student(s) => {
                crate::domain::combination_is_valid(&self.input.students[s], &self.input.groups[group])
            }
        }
    }

    /// Assigns `participant` to `group`, provided there is room for all of its members. Returns
    /// `false` (no-op) if the participant is already assigned or the group has insufficient
    /// remaining capacity.
    pub fn assign_participant(&mut self, participant: ParticipantId, group: GroupId) -> bool {
        if self.assignment[participant].is_some() {
            return false;
        }
        let size = self.members(participant).len();
        if size > self.groups[group].remaining_capacity as usize {
            return false;
        }
        for &student in self.members(participant) {
            self.assignment_list[group].push((student, participant));
        }
        self.groups[group].remaining_capacity -= size as u32;
        self.assignment[participant] = Some(group);
        true
    }

    /// Removes `participant` from its current group. Returns `false` if it was not assigned
    /// there.
    pub fn unassign_participant(&mut self, participant: ParticipantId) -> bool {
        let group = match self.assignment[participant] {
            Some(g) => g,
            None => return false,
        };
        let size = self.members(participant).len() as u32;
        self.assignment_list[group].retain(|&(_, p)| p != participant);
        self.groups[group].remaining_capacity += size;
        self.assignment[participant] = None;
        true
    }

    /// Clears every assignment, keeping groups' enabled/filter state untouched, and restores
    /// every group's remaining capacity back to its original capacity.
    pub fn reset(&mut self) {
        for list in &mut self.assignment_list {
            list.clear();
        }
        for a in &mut self.assignment {
            *a = None;
        }
        for group in &mut self.groups {
            group.remaining_capacity = group.original_capacity;
        }
    }

    /// Overrides `group`'s *remaining* capacity directly, independent of its current occupancy.
    /// Used to temporarily shrink a group's capacity for a capacity-reduced sub-problem; does not
    /// touch `original_capacity`, so Invariant I1 is intentionally suspended until the next
    /// `reset()`.
    pub fn set_capacity(&mut self, group: GroupId, capacity: u32) {
        self.groups[group].remaining_capacity = capacity;
    }

    /// Clears the type-specific-assignment override for `student`, exempting it from filters for
    /// the remainder of this run.
    pub fn disable_type_specific_assignment(&mut self, student: StudentId) {
        self.type_specific_assignment[student] = false;
    }

    pub fn type_specific_assignment(&self, student: StudentId) -> bool {
        self.type_specific_assignment[student]
    }

    /// Maps a participant back to one representative student id (the only member, for a lone
    /// student; otherwise panics, as teams have no single representative student).
    pub fn part_id_to_student_id(&self, participant: ParticipantId) -> StudentId {
        match self.participants[participant] {
            Participant::Student(s) => s,
            Participant::Team(_) => panic!("part_id_to_student_id called on a team participant"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseType, DegreeType, GroupData, Semester, StudentData, TeamData};

    fn sample_input() -> Input {
        let groups = vec![
            GroupData::new("g0".into(), "G0".into(), 2, None, CourseType::Any, DegreeType::Any),
            GroupData::new("g1".into(), "G1".into(), 2, None, CourseType::Any, DegreeType::Any),
        ];
        let students = vec![
            StudentData::new("s0".into(), "S0".into(), CourseType::Any, DegreeType::Any, Semester::First, true),
            StudentData::new("s1".into(), "S1".into(), CourseType::Any, DegreeType::Any, Semester::First, true),
            StudentData::new("s2".into(), "S2".into(), CourseType::Any, DegreeType::Any, Semester::First, true),
        ];
        let ratings = vec![
            vec![Rating::new(0), Rating::new(1)],
            vec![Rating::new(0), Rating::new(1)],
            vec![Rating::new(1), Rating::new(0)],
        ];
        let teams = vec![TeamData::new("t0".into(), vec![0, 1])];
        Input {
            groups,
            students,
            teams,
            ratings,
            student_id_to_team_id: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn multi_member_team_becomes_one_participant() {
        let input = sample_input();
        let config = Config::default();
        let state = State::new(&input, &config).unwrap();
        assert_eq!(state.num_participants(), 2);
        assert!(state.participants.iter().any(|p| matches!(p, Participant::Team(_))));
    }

    #[test]
    fn singleton_team_is_demoted_to_student() {
        let mut input = sample_input();
        input.teams[0].members = vec![0];
        let config = Config::default();
        let state = State::new(&input, &config).unwrap();
        assert_eq!(state.num_participants(), 3);
        assert!(state.participants.iter().all(|p| matches!(p, Participant::Student(_))));
    }

    #[test]
    fn assign_and_unassign_round_trips() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        assert!(state.assign_participant(team_participant, 0));
        assert_eq!(state.group_size(0), 2);
        assert!(state.is_assigned(team_participant));
        assert!(state.unassign_participant(team_participant));
        assert_eq!(state.group_size(0), 0);
        assert!(!state.is_assigned(team_participant));
    }

    #[test]
    fn assign_participant_respects_capacity() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        state.set_capacity(0, 1);
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        assert!(!state.assign_participant(team_participant, 0));
    }

    #[test]
    fn reset_clears_all_assignments() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        state.assign_participant(team_participant, 0);
        state.reset();
        assert!(!state.is_assigned(team_participant));
        assert_eq!(state.group_size(0), 0);
        assert_eq!(state.group_capacity(0), state.group_original_capacity(0));
    }

    #[test]
    fn remaining_capacity_tracks_occupancy() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        assert_eq!(state.group_capacity(0), 2);
        assert!(state.assign_participant(team_participant, 0));
        assert_eq!(state.group_capacity(0), 0);
        assert_eq!(
            state.group_capacity(0) + state.group_size(0) as u32,
            state.group_original_capacity(0)
        );
        assert!(state.unassign_participant(team_participant));
        assert_eq!(state.group_capacity(0), 2);
    }

    #[test]
    fn team_member_with_empty_ratings_inherits_from_sibling() {
        let mut input = sample_input();
        input.ratings[1] = Vec::new();
        let config = Config::default();
        let state = State::new(&input, &config).unwrap();
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        assert_eq!(state.rating(team_participant), &[Rating::new(0), Rating::new(1)]);
    }

    #[test]
    fn clone_is_an_independent_working_copy() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let mut clone = state.clone();
        let team_participant = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Team(_)))
            .unwrap();
        clone.assign_participant(team_participant, 0);
        assert!(!state.is_assigned(team_participant));
        assert!(clone.is_assigned(team_participant));
        state.disable_group(1);
        assert!(state.group_is_enabled(0));
        assert!(!state.group_is_enabled(1));
    }

    #[test]
    fn filter_excludes_matching_student_from_group() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let lone_student = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Student(2)))
            .unwrap();
        state.add_filter_to_group(0, Filter::empty("All"));
        assert!(state.is_excluded_from_group(lone_student, 0));
        assert!(!state.is_excluded_from_group(lone_student, 1));
    }

    #[test]
    fn disabling_type_specific_assignment_exempts_from_filters() {
        let input = sample_input();
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        let lone_student = state
            .participants
            .iter()
            .position(|p| matches!(p, Participant::Student(2)))
            .unwrap();
        state.add_filter_to_group(0, Filter::empty("All"));
        state.disable_type_specific_assignment(2);
        assert!(!state.is_excluded_from_group(lone_student, 0));
    }

    #[test]
    fn capacity_buffer_violation_is_rejected() {
        let mut input = sample_input();
        input.groups[0].capacity = 1;
        input.groups[1].capacity = 1;
        let mut config = Config::default();
        config.capacity_buffer = 1.05;
        assert!(State::new(&input, &config).is_err());
    }

    #[test]
    fn inconsistent_team_ratings_are_rejected() {
        let mut input = sample_input();
        input.ratings[1] = vec![Rating::new(1), Rating::new(0)];
        let config = Config::default();
        assert!(State::new(&input, &config).is_err());
    }
}
