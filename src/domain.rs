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

//! Immutable input data: ratings, group/student/team records and the `Input` container they are
//! parsed into. Nothing in this module is mutated once an `Input` has been built, except the two
//! backfills performed while constructing `State` (inherited team ratings and the
//! `type_specific_assignment` flag).

use crate::{GroupId, StudentId};
use std::fmt;

/// A participant's preference index for one group. `0` is the best rating, higher is worse.
///
/// The value curve is deliberately non-linear: each step up costs strictly more than the
/// previous one, so the matcher spreads unhappiness across many participants rather than piling
/// it onto a few.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating {
    index: u32,
}

impl Rating {
    pub fn new(index: u32) -> Self {
        Rating { index }
    }

    /// Index of this rating (0 = best).
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Numeric weight of this rating, `G^2 - i*(i+1)/2`, for `num_groups == G`.
    pub fn value(&self, num_groups: u32) -> u32 {
        debug_assert!(self.index < num_groups, "rating index out of range");
        num_groups * num_groups - (self.index * (self.index + 1) / 2)
    }

    pub fn name(&self) -> String {
        self.index.to_string()
    }

    /// The worst possible rating for `num_groups` groups.
    pub fn min_rating(num_groups: u32) -> Self {
        Rating::new(num_groups - 1)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// Kind of course a group (or student preference) is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseType {
    Info,
    Math,
    Teaching,
    Any,
}

/// Degree program a group (or student) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeType {
    Bachelor,
    Master,
    Any,
}

/// Semester a student is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semester {
    First,
    Third,
}

/// Immutable data of a tutorial group.
#[derive(Debug, Clone)]
pub struct GroupData {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    pub min_target_size: Option<u32>,
    pub course_type: CourseType,
    pub degree_type: DegreeType,
}

impl GroupData {
    pub fn new(
        id: String,
        name: String,
        capacity: u32,
        min_target_size: Option<u32>,
        course_type: CourseType,
        degree_type: DegreeType,
    ) -> Self {
        GroupData {
            id,
            name,
            capacity,
            min_target_size,
            course_type,
            degree_type,
        }
    }
}

/// Immutable data of a student.
#[derive(Debug, Clone)]
pub struct StudentData {
    pub id: String,
    pub name: String,
    pub course_type: CourseType,
    pub degree_type: DegreeType,
    pub semester: Semester,
    /// Whether this student may be excluded from a group by an installed `Filter`. Students with
    /// this flag cleared are always filter-exempt.
    pub type_specific_assignment: bool,
}

impl StudentData {
    pub fn new(
        id: String,
        name: String,
        course_type: CourseType,
        degree_type: DegreeType,
        semester: Semester,
        type_specific_assignment: bool,
    ) -> Self {
        StudentData {
            id,
            name,
            course_type,
            degree_type,
            semester,
            type_specific_assignment,
        }
    }
}

/// Immutable data of a pre-formed study team.
#[derive(Debug, Clone)]
pub struct TeamData {
    pub id: String,
    pub members: Vec<StudentId>,
}

impl TeamData {
    pub fn new(id: String, members: Vec<StudentId>) -> Self {
        TeamData { id, members }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Returns true iff `student` is compatible with `group` w.r.t. course and degree type, where
/// `Any` on either side acts as a wildcard.
pub fn combination_is_valid(student: &StudentData, group: &GroupData) -> bool {
    let course_is_valid =
        matches!(group.course_type, CourseType::Any) || student.course_type == group.course_type;
    let degree_is_valid =
        matches!(group.degree_type, DegreeType::Any) || student.degree_type == group.degree_type;
    course_is_valid && degree_is_valid
}

/// Returns true iff every member of `team` is compatible with `group`.
pub fn team_combination_is_valid(team: &TeamData, group: &GroupData, students: &[StudentData]) -> bool {
    team.members
        .iter()
        .all(|&student| combination_is_valid(&students[student], group))
}

/// Returns true iff `r1` and `r2` are the same rating vector, entry by entry.
pub fn ratings_equal(r1: &[Rating], r2: &[Rating]) -> bool {
    r1 == r2
}

/// The immutable, parsed input data for one assignment run.
#[derive(Debug, Clone)]
pub struct Input {
    pub groups: Vec<GroupData>,
    pub students: Vec<StudentData>,
    pub teams: Vec<TeamData>,
    /// `ratings[student][group]`, one entry per group for every student.
    pub ratings: Vec<Vec<Rating>>,
    /// Maps a student id to the id of the team it belongs to, if any.
    pub student_id_to_team_id: std::collections::HashMap<String, String>,
}

impl Input {
    pub fn num_groups(&self) -> GroupId {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_value_is_strictly_decreasing() {
        let g = 5;
        let values: Vec<u32> = (0..g).map(|i| Rating::new(i).value(g)).collect();
        for w in values.windows(2) {
            assert!(w[0] > w[1], "rating value must strictly decrease with index");
        }
    }

    #[test]
    fn rating_value_monotone_in_group_count() {
        for g in 2..8 {
            let small = Rating::new(0).value(g);
            let large = Rating::new(0).value(g + 1);
            assert!(large > small);
        }
    }

    #[test]
    fn min_rating_is_worst() {
        let g = 4;
        let min = Rating::min_rating(g);
        assert_eq!(min.index(), g - 1);
        for i in 0..g - 1 {
            assert!(Rating::new(i).value(g) > min.value(g));
        }
    }

    #[test]
    fn wildcard_group_accepts_everything() {
        let group = GroupData::new(
            "g".into(),
            "G".into(),
            5,
            None,
            CourseType::Any,
            DegreeType::Any,
        );
        let student = StudentData::new(
            "s".into(),
            "S".into(),
            CourseType::Math,
            DegreeType::Master,
            Semester::Third,
            true,
        );
        assert!(combination_is_valid(&student, &group));
    }

    #[test]
    fn mismatched_course_type_is_invalid() {
        let group = GroupData::new(
            "g".into(),
            "G".into(),
            5,
            None,
            CourseType::Math,
            DegreeType::Any,
        );
        let student = StudentData::new(
            "s".into(),
            "S".into(),
            CourseType::Info,
            DegreeType::Any,
            Semester::First,
            true,
        );
        assert!(!combination_is_valid(&student, &group));
    }
}
