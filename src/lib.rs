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

//! Assignment engine for allocating students and pre-formed study teams to tutorial groups,
//! optimizing aggregate group preference while enforcing hard and soft constraints on group
//! composition.

pub mod config;
pub mod domain;
pub mod filter;
pub mod interrupt;
pub mod io;
pub mod matching;
pub mod scheduler;
pub mod state;

pub use domain::{CourseType, DegreeType, GroupData, Input, Rating, Semester, StudentData, TeamData};
pub use filter::Filter;
pub use state::{Participant, State};

/// Index of a group in `Input::groups` / `State`'s group vector.
pub type GroupId = usize;
/// Index of a student in `Input::students`.
pub type StudentId = usize;
/// Index of a participant (team or lone student) in `State`'s participant vector.
pub type ParticipantId = usize;

/// Proposed assignment of participants to groups, as produced by the matcher. `None` means the
/// participant stayed unassigned.
pub type Assignment = Vec<Option<GroupId>>;
