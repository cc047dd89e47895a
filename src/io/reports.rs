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

//! Human-readable per-group report files, written to `--groups DIR` for manual review: one plain
//! text file per group anybody was placed in, a `RemovedGroups` file listing every group that
//! stayed empty, and a `Stats.csv` summary with one quota column per type filter from the types
//! file.

use crate::domain::{CourseType, DegreeType, Semester, StudentData};
use crate::filter::Filter;
use crate::state::State;
use crate::StudentId;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn course_name(course: CourseType) -> &'static str {
    match course {
        CourseType::Info => "Info",
        CourseType::Math => "Mathe",
        CourseType::Teaching => "Lehramt",
        CourseType::Any => "-",
    }
}

fn degree_name(degree: DegreeType) -> &'static str {
    match degree {
        DegreeType::Bachelor => "Bachelor",
        DegreeType::Master => "Master",
        DegreeType::Any => "-",
    }
}

fn semester_name(semester: Semester) -> &'static str {
    match semester {
        Semester::First => "Ersti",
        Semester::Third => "Dritti",
    }
}

/// Writes one line per student in the teacher's plain-text group report format:
/// `Name, Id, Course, Degree, Semester, [Rating]`.
fn write_student_line(file: &mut File, data: &StudentData, rating: &str) -> std::io::Result<()> {
    writeln!(
        file,
        "{}, {}, {}, {}, {}, [{}]",
        data.name,
        data.id,
        course_name(data.course_type),
        degree_name(data.degree_type),
        semester_name(data.semester),
        rating,
    )
}

/// Writes one file per group that anybody ended up in (named `Name-idddd` after the group's name
/// and the first 5 characters of its id), a `RemovedGroups` file listing every group that stayed
/// empty, and a `Stats.csv` with one row per non-empty group and one column per `quotas` filter.
pub fn write_group_reports(dir: &Path, state: &State, quotas: &[(Filter, StudentId)]) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("could not create report directory: {}", e))?;

    let removed_path = dir.join("RemovedGroups");
    let mut removed_file =
        File::create(&removed_path).map_err(|e| format!("could not write {}: {}", removed_path.display(), e))?;

    let stats_path = dir.join("Stats.csv");
    let mut stats_file =
        File::create(&stats_path).map_err(|e| format!("could not write {}: {}", stats_path.display(), e))?;

    let mut header = String::from("Name, Size, ");
    for (i, (filter, _)) in quotas.iter().enumerate() {
        header.push_str(filter.name());
        if i + 1 != quotas.len() {
            header.push_str(", ");
        }
    }
    writeln!(stats_file, "{}", header).map_err(|e| format!("could not write {}: {}", stats_path.display(), e))?;

    let mut sum: usize = 0;
    let mut filter_sums = vec![0usize; quotas.len()];

    for group in 0..state.num_groups() {
        let data = state.group_data(group);
        let group_name_id = format!("{}-{}", data.name, &data.id[..data.id.len().min(5)]);

        if state.group_assignment_list(group).is_empty() {
            writeln!(removed_file, "{} ({})", data.name, data.id)
                .map_err(|e| format!("could not write {}: {}", removed_path.display(), e))?;
            continue;
        }

        let group_path = dir.join(&group_name_id);
        let mut file = File::create(&group_path).map_err(|e| format!("could not write {}: {}", group_path.display(), e))?;
        let mut num_per_quota = vec![0usize; quotas.len()];
        for &(student, participant) in state.group_assignment_list(group) {
            let student_data = &state.input().students[student];
            let rating_name = state.rating(participant)[group].name();
            write_student_line(&mut file, student_data, &rating_name)
                .map_err(|e| format!("could not write {}: {}", group_path.display(), e))?;
            for (i, (filter, _)) in quotas.iter().enumerate() {
                if filter.apply(student_data) {
                    num_per_quota[i] += 1;
                }
            }
        }

        let mut row = format!("{}, {}, ", group_name_id, state.group_size(group));
        sum += state.group_size(group);
        for (i, count) in num_per_quota.iter().enumerate() {
            row.push_str(&count.to_string());
            if i + 1 != quotas.len() {
                row.push_str(", ");
            }
            filter_sums[i] += count;
        }
        writeln!(stats_file, "{}", row).map_err(|e| format!("could not write {}: {}", stats_path.display(), e))?;
    }

    let mut sums = format!("Summe, {}, ", sum);
    for (i, count) in filter_sums.iter().enumerate() {
        sums.push_str(&count.to_string());
        if i + 1 != quotas.len() {
            sums.push_str(", ");
        }
    }
    writeln!(stats_file, "{}", sums).map_err(|e| format!("could not write {}: {}", stats_path.display(), e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{GroupData, Input, Rating, StudentData};
    use crate::filter::FilterAtom;

    #[test]
    fn writes_expected_files() {
        let groups = vec![
            GroupData::new("g1".into(), "Group 1".into(), 5, None, CourseType::Any, DegreeType::Any),
            GroupData::new("g2".into(), "Group 2".into(), 5, None, CourseType::Any, DegreeType::Any),
        ];
        let students = vec![StudentData::new(
            "s1".into(),
            "Alice".into(),
            CourseType::Math,
            DegreeType::Bachelor,
            Semester::First,
            true,
        )];
        let input = Input {
            groups,
            students,
            teams: Vec::new(),
            ratings: vec![vec![Rating::new(0), Rating::new(1)]],
            student_id_to_team_id: std::collections::HashMap::new(),
        };
        let config = Config::default();
        let mut state = State::new(&input, &config).unwrap();
        state.assign_participant(0, 0);

        let quotas = vec![(Filter::new(vec![FilterAtom::Math], "Math".into()), 0)];

        let dir = std::env::temp_dir().join(format!("gruppenzuteilung-test-{:p}", &input));
        write_group_reports(&dir, &state, &quotas).unwrap();
        assert!(dir.join("Group 1-g1").exists());
        assert!(!dir.join("Group 2-g2").exists());
        assert!(dir.join("RemovedGroups").exists());
        assert!(dir.join("Stats.csv").exists());

        let removed = std::fs::read_to_string(dir.join("RemovedGroups")).unwrap();
        assert!(removed.contains("Group 2 (g2)"));

        let stats = std::fs::read_to_string(dir.join("Stats.csv")).unwrap();
        assert!(stats.starts_with("Name, Size, Math\n"));
        assert!(stats.contains("Group 1-g1, 1, 1"));
        assert!(stats.contains("Summe, 1, 1"));

        let group_file = std::fs::read_to_string(dir.join("Group 1-g1")).unwrap();
        assert!(group_file.contains("Alice, s1, Mathe, Bachelor, Ersti, [0]"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
