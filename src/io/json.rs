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

//! JSON input parsing and output writing.
//!
//! Input shape:
//! ```json
//! {
//!   "groups": [{"id": "g1", "name": "Group 1", "capacity": 20, "min_target_size": 10,
//!               "course_type": "info", "degree_type": "any"}],
//!   "students": [{"id": "s1", "name": "A. Student", "course_type": "info", "degree_type": "bachelor",
//!                 "semester": "first", "ratings": {"g1": 0, "g2": 1}}],
//!   "teams": [{"id": "t1", "members": ["s1", "s2"]}]
//! }
//! ```
//! `ratings` is either a mapping of group id to priority (`rating_input_type = mapping`, the
//! default) or an ordered array of group ids, best first (`ordered_list`). With
//! `--input-per-team`, the `ratings` field is read from the team object instead of each member.

use crate::config::{Config, RatingInputType};
use crate::domain::{CourseType, DegreeType, GroupData, Input, Rating, Semester, StudentData, TeamData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

#[derive(Deserialize)]
struct RawGroup {
    id: String,
    name: String,
    capacity: u32,
    #[serde(default)]
    min_target_size: Option<u32>,
    #[serde(default = "default_any")]
    course_type: String,
    #[serde(default = "default_any")]
    degree_type: String,
}

fn default_any() -> String {
    "any".to_string()
}

fn default_type_specific_assignment() -> bool {
    true
}

#[derive(Deserialize)]
struct RawStudent {
    id: String,
    name: String,
    #[serde(default = "default_any")]
    course_type: String,
    #[serde(default = "default_any")]
    degree_type: String,
    semester: String,
    #[serde(default = "default_type_specific_assignment")]
    type_specific_assignment: bool,
    #[serde(default)]
    ratings: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawTeam {
    id: String,
    members: Vec<String>,
    #[serde(default)]
    ratings: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawInput {
    groups: Vec<RawGroup>,
    students: Vec<RawStudent>,
    #[serde(default)]
    teams: Vec<RawTeam>,
}

fn parse_course_type(s: &str) -> Result<CourseType, String> {
    match s.to_lowercase().as_str() {
        "info" => Ok(CourseType::Info),
        "math" | "mathe" => Ok(CourseType::Math),
        "teaching" | "lehramt" => Ok(CourseType::Teaching),
        "any" => Ok(CourseType::Any),
        other => Err(format!("unknown course_type: {}", other)),
    }
}

fn parse_degree_type(s: &str) -> Result<DegreeType, String> {
    match s.to_lowercase().as_str() {
        "bachelor" => Ok(DegreeType::Bachelor),
        "master" => Ok(DegreeType::Master),
        "any" => Ok(DegreeType::Any),
        other => Err(format!("unknown degree_type: {}", other)),
    }
}

fn parse_semester(s: &str) -> Result<Semester, String> {
    match s.to_lowercase().as_str() {
        "first" | "ersti" => Ok(Semester::First),
        "third" | "dritti" => Ok(Semester::Third),
        other => Err(format!("unknown semester: {}", other)),
    }
}

/// Parses one entity's `ratings` field into a full, dense rating vector (one entry per group), or
/// an empty vector if the field was omitted entirely. An omitted field is not necessarily an
/// error: for a team member it may be backfilled from a sibling's ratings once `State` sees the
/// whole team (see `definitions.cpp:128-158`); `State::new` is what finally rejects a rating
/// vector that stays empty for a participant with no populated sibling. Groups the entity
/// mentioned some but not all of are filled with the worst rating if
/// `config.allow_default_ratings`, otherwise this is an error.
fn parse_ratings(
    value: Option<&serde_json::Value>,
    group_index: &HashMap<&str, usize>,
    num_groups: usize,
    config: &Config,
    context: &str,
) -> Result<Vec<Rating>, String> {
    if value.is_none() {
        return Ok(Vec::new());
    }
    let mut ratings = vec![None; num_groups];
    match value {
        None => unreachable!(),
        Some(serde_json::Value::Object(map)) => {
            if !matches!(config.rating_input_type, RatingInputType::Mapping) {
                return Err(format!("{}: expected an ordered list of ratings, found a mapping", context));
            }
            for (group_id, priority) in map {
                let index = *group_index
                    .get(group_id.as_str())
                    .ok_or_else(|| format!("{}: rating references unknown group '{}'", context, group_id))?;
                let priority = priority
                    .as_u64()
                    .ok_or_else(|| format!("{}: rating for group '{}' must be a non-negative integer", context, group_id))?;
                ratings[index] = Some(Rating::new(priority as u32));
            }
        }
        Some(serde_json::Value::Array(list)) => {
            if !matches!(config.rating_input_type, RatingInputType::OrderedList) {
                return Err(format!("{}: expected a mapping of ratings, found a list", context));
            }
            for (priority, group_id) in list.iter().enumerate() {
                let group_id = group_id
                    .as_str()
                    .ok_or_else(|| format!("{}: ordered rating list must contain group id strings", context))?;
                let index = *group_index
                    .get(group_id)
                    .ok_or_else(|| format!("{}: rating references unknown group '{}'", context, group_id))?;
                ratings[index] = Some(Rating::new(priority as u32));
            }
        }
        Some(_) => return Err(format!("{}: ratings must be a mapping or a list", context)),
    }

    ratings
        .into_iter()
        .map(|r| match r {
            Some(r) => Ok(r),
            None if config.allow_default_ratings => Ok(Rating::min_rating(num_groups as u32)),
            None => Err(format!("{}: incomplete rating list, pass --allow-default-ratings to tolerate this", context)),
        })
        .collect()
}

/// Parses the top-level input JSON document into an `Input`.
pub fn parse_input<R: Read>(reader: R, config: &Config) -> Result<Input, String> {
    let raw: RawInput = serde_json::from_reader(reader).map_err(|e| format!("malformed input JSON: {}", e))?;

    let group_index: HashMap<&str, usize> = raw.groups.iter().enumerate().map(|(i, g)| (g.id.as_str(), i)).collect();
    let student_index: HashMap<&str, usize> =
        raw.students.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect();
    let num_groups = raw.groups.len();

    let groups = raw
        .groups
        .iter()
        .map(|g| {
            Ok(GroupData::new(
                g.id.clone(),
                g.name.clone(),
                g.capacity,
                g.min_target_size,
                parse_course_type(&g.course_type)?,
                parse_degree_type(&g.degree_type)?,
            ))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let mut student_id_to_team_id = HashMap::new();
    for team in &raw.teams {
        for member in &team.members {
            student_id_to_team_id.insert(member.clone(), team.id.clone());
        }
    }

    let mut students = Vec::with_capacity(raw.students.len());
    let mut ratings = vec![Vec::new(); raw.students.len()];
    for (i, s) in raw.students.iter().enumerate() {
        students.push(StudentData::new(
            s.id.clone(),
            s.name.clone(),
            parse_course_type(&s.course_type)?,
            parse_degree_type(&s.degree_type)?,
            parse_semester(&s.semester)?,
            s.type_specific_assignment,
        ));
        // With `--input-per-team`, team members' ratings come from their team's `ratings` field
        // (filled in below); everyone else still specifies their own.
        if !config.input_per_team || !student_id_to_team_id.contains_key(&s.id) {
            ratings[i] = parse_ratings(s.ratings.as_ref(), &group_index, num_groups, config, &format!("student '{}'", s.id))?;
        }
    }

    let mut teams = Vec::with_capacity(raw.teams.len());
    for team in &raw.teams {
        let member_indices: Vec<usize> = team
            .members
            .iter()
            .map(|m| {
                student_index
                    .get(m.as_str())
                    .copied()
                    .ok_or_else(|| format!("team '{}' references unknown student '{}'", team.id, m))
            })
            .collect::<Result<Vec<_>, String>>()?;
        if config.input_per_team {
            let team_ratings =
                parse_ratings(team.ratings.as_ref(), &group_index, num_groups, config, &format!("team '{}'", team.id))?;
            for &member in &member_indices {
                ratings[member] = team_ratings.clone();
            }
        }
        teams.push(TeamData::new(team.id.clone(), member_indices));
    }

    Ok(Input {
        groups,
        students,
        teams,
        ratings,
        student_id_to_team_id,
    })
}

#[derive(Serialize)]
struct OutputEntry<'a> {
    group: &'a str,
    rating: u32,
}

/// Writes the final assignment as a JSON object mapping student (or, with
/// `--output-per-team`, team) id to `{group, rating}`. Unassigned participants are omitted.
pub fn write_output<W: Write>(writer: W, state: &crate::state::State, config: &Config) -> Result<(), String> {
    let mut output: HashMap<String, OutputEntry> = HashMap::new();
    for participant in 0..state.num_participants() {
        let group = match state.get_assignment(participant) {
            Some(g) => g,
            None => continue,
        };
        let rating = state.rating(participant)[group].index();
        let group_id = state.group_data(group).id.as_str();
        if config.output_per_team && state.is_team(participant) {
            output.insert(
                state.team_data(participant).id.clone(),
                OutputEntry { group: group_id, rating },
            );
        } else if !state.is_team(participant) {
            let student = state.student_data(participant);
            output.insert(student.id.clone(), OutputEntry { group: group_id, rating });
        } else {
            for &member in &state.team_data(participant).members {
                output.insert(
                    state.input().students[member].id.clone(),
                    OutputEntry { group: group_id, rating },
                );
            }
        }
    }
    serde_json::to_writer_pretty(writer, &output).map_err(|e| format!("failed to write output JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_input() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}],
            "students": [{"id": "s1", "name": "A", "semester": "first", "ratings": {"g1": 0}}]
        }"#;
        let config = Config::default();
        let input = parse_input(json.as_bytes(), &config).unwrap();
        assert_eq!(input.groups.len(), 1);
        assert_eq!(input.students.len(), 1);
        assert_eq!(input.ratings[0][0].index(), 0);
    }

    #[test]
    fn rejects_unknown_group_in_ratings() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}],
            "students": [{"id": "s1", "name": "A", "semester": "first", "ratings": {"ghost": 0}}]
        }"#;
        let config = Config::default();
        assert!(parse_input(json.as_bytes(), &config).is_err());
    }

    #[test]
    fn ordered_list_rating_type() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}, {"id": "g2", "name": "Group 2", "capacity": 10}],
            "students": [{"id": "s1", "name": "A", "semester": "first", "ratings": ["g2", "g1"]}]
        }"#;
        let mut config = Config::default();
        config.rating_input_type = RatingInputType::OrderedList;
        let input = parse_input(json.as_bytes(), &config).unwrap();
        assert_eq!(input.ratings[0][1].index(), 0);
        assert_eq!(input.ratings[0][0].index(), 1);
    }

    #[test]
    fn incomplete_ratings_without_default_is_an_error() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}, {"id": "g2", "name": "Group 2", "capacity": 10}],
            "students": [{"id": "s1", "name": "A", "semester": "first", "ratings": {"g1": 0}}]
        }"#;
        let config = Config::default();
        assert!(parse_input(json.as_bytes(), &config).is_err());
    }

    #[test]
    fn omitted_ratings_parse_to_an_empty_vector() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}],
            "students": [{"id": "s1", "name": "A", "semester": "first"}]
        }"#;
        let config = Config::default();
        let input = parse_input(json.as_bytes(), &config).unwrap();
        assert!(input.ratings[0].is_empty());
    }

    #[test]
    fn team_inherits_ratings_when_input_per_team() {
        let json = r#"{
            "groups": [{"id": "g1", "name": "Group 1", "capacity": 10}],
            "students": [
                {"id": "s1", "name": "A", "semester": "first"},
                {"id": "s2", "name": "B", "semester": "first"}
            ],
            "teams": [{"id": "t1", "members": ["s1", "s2"], "ratings": {"g1": 0}}]
        }"#;
        let mut config = Config::default();
        config.input_per_team = true;
        let input = parse_input(json.as_bytes(), &config).unwrap();
        assert_eq!(input.ratings[0], input.ratings[1]);
    }
}
