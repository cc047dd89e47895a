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

//! Filters: conjunctive predicates over `StudentData`, installed on groups to exclude matching
//! students. Also the "types file" format that configures per-group quotas (§4.6 / §6 of the
//! specification).

use crate::domain::{CourseType, DegreeType, Semester, StudentData};
use crate::StudentId;
use std::io::BufRead;

/// One atomic predicate over a student's type, with the stable id used to build a `Filter`'s
/// composite id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterAtom {
    Info,
    Math,
    Teaching,
    Bachelor,
    Master,
    FirstSemester,
    ThirdSemester,
}

impl FilterAtom {
    fn id(self) -> u32 {
        match self {
            FilterAtom::Info => 0,
            FilterAtom::Math => 1,
            FilterAtom::Teaching => 2,
            FilterAtom::Bachelor => 3,
            FilterAtom::Master => 4,
            FilterAtom::FirstSemester => 5,
            FilterAtom::ThirdSemester => 6,
        }
    }

    fn matches(self, data: &StudentData) -> bool {
        match self {
            FilterAtom::Info => data.course_type == CourseType::Info,
            FilterAtom::Math => data.course_type == CourseType::Math,
            FilterAtom::Teaching => data.course_type == CourseType::Teaching,
            FilterAtom::Bachelor => data.degree_type == DegreeType::Bachelor,
            FilterAtom::Master => data.degree_type == DegreeType::Master,
            FilterAtom::FirstSemester => data.semester == Semester::First,
            FilterAtom::ThirdSemester => data.semester == Semester::Third,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            FilterAtom::Info => "Info",
            FilterAtom::Math => "Math",
            FilterAtom::Teaching => "Teaching",
            FilterAtom::Bachelor => "Bachelor",
            FilterAtom::Master => "Master",
            FilterAtom::FirstSemester => "First",
            FilterAtom::ThirdSemester => "Third",
        }
    }

    /// Parses the three-letter type prefix used in the types file (`inf`, `mat`, `leh`, `bac`,
    /// `mas`, `ers`, `dri`).
    fn from_prefix(word: &str) -> Option<Self> {
        if word.len() < 3 {
            return None;
        }
        match word[..3].to_lowercase().as_str() {
            "inf" => Some(FilterAtom::Info),
            "mat" => Some(FilterAtom::Math),
            "leh" => Some(FilterAtom::Teaching),
            "bac" => Some(FilterAtom::Bachelor),
            "mas" => Some(FilterAtom::Master),
            "ers" => Some(FilterAtom::FirstSemester),
            "dri" => Some(FilterAtom::ThirdSemester),
            _ => None,
        }
    }
}

/// A conjunction of `FilterAtom` predicates, installed on a group to exclude matching students
/// from being placed there. Two filters with the same composite `id()` are semantically
/// equivalent (installing one is a no-op if the other is already present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    atoms: Vec<FilterAtom>,
    name: String,
}

impl Filter {
    pub fn new(mut atoms: Vec<FilterAtom>, name: String) -> Self {
        atoms.sort();
        Filter { atoms, name }
    }

    /// A filter that excludes nobody (the conjunction of zero atoms is vacuously true).
    pub fn empty(name: impl Into<String>) -> Self {
        Filter::new(Vec::new(), name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true iff `data` matches every atom in this filter.
    pub fn apply(&self, data: &StudentData) -> bool {
        self.atoms.iter().all(|atom| atom.matches(data))
    }

    /// Stable, order-independent id: equality of ids implies semantic equivalence of the filter.
    pub fn id(&self) -> u32 {
        self.atoms
            .iter()
            .fold(0u32, |acc, atom| acc.wrapping_mul(137).wrapping_add(atom.id()).wrapping_add(13))
    }
}

/// Parses the plain-text types file: one line per quota, `TYPE [TYPE ...] LIMIT`, e.g.
/// `mat ers 5` enforces at least 5 Math-First-semester students in every non-empty enabled group.
pub fn parse_types_file<R: BufRead>(reader: R) -> Result<Vec<(Filter, StudentId)>, String> {
    let mut result = Vec::new();
    for (line_index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("types, line {}: {}", line_index, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.split(' ').filter(|w| !w.is_empty()).collect();
        if words.len() < 2 {
            return Err(format!(
                "types, line {}: each line needs to have the form 'TYPE [TYPE ...] LIMIT'",
                line_index
            ));
        }
        let mut atoms = Vec::new();
        let mut combined_name = String::new();
        for word in &words[..words.len() - 1] {
            let atom = FilterAtom::from_prefix(word).ok_or_else(|| {
                format!("types, line {}: invalid name of student type: {}", line_index, word)
            })?;
            if !combined_name.is_empty() {
                combined_name.push('-');
            }
            combined_name.push_str(atom.display_name());
            atoms.push(atom);
        }
        let limit: StudentId = words[words.len() - 1].parse().map_err(|_| {
            format!("types, line {}: last word must be an integer (limit)", line_index)
        })?;
        result.push((Filter::new(atoms, combined_name), limit));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseType, DegreeType, Semester, StudentData};

    fn student(course: CourseType, degree: DegreeType, semester: Semester) -> StudentData {
        StudentData::new("s".into(), "S".into(), course, degree, semester, true)
    }

    #[test]
    fn id_is_order_independent() {
        let f1 = Filter::new(vec![FilterAtom::Math, FilterAtom::Bachelor], "a".into());
        let f2 = Filter::new(vec![FilterAtom::Bachelor, FilterAtom::Math], "b".into());
        assert_eq!(f1.id(), f2.id());
    }

    #[test]
    fn different_atoms_get_different_ids() {
        let f1 = Filter::new(vec![FilterAtom::Math], "a".into());
        let f2 = Filter::new(vec![FilterAtom::Info], "b".into());
        assert_ne!(f1.id(), f2.id());
    }

    #[test]
    fn apply_is_conjunctive() {
        let filter = Filter::new(vec![FilterAtom::Math, FilterAtom::FirstSemester], "Mathe-Ersti".into());
        let matches = student(CourseType::Math, DegreeType::Bachelor, Semester::First);
        let wrong_semester = student(CourseType::Math, DegreeType::Bachelor, Semester::Third);
        assert!(filter.apply(&matches));
        assert!(!filter.apply(&wrong_semester));
    }

    #[test]
    fn empty_filter_matches_everyone() {
        let filter = Filter::empty("Total");
        let any = student(CourseType::Teaching, DegreeType::Master, Semester::Third);
        assert!(filter.apply(&any));
    }

    #[test]
    fn parse_types_file_basic_line() {
        let input = "mat ers 5\n";
        let result = parse_types_file(input.as_bytes()).unwrap();
        assert_eq!(result.len(), 1);
        let (filter, limit) = &result[0];
        assert_eq!(*limit, 5);
        assert_eq!(filter.name(), "Math-First");
        assert!(filter.apply(&student(CourseType::Math, DegreeType::Bachelor, Semester::First)));
        assert!(!filter.apply(&student(CourseType::Math, DegreeType::Bachelor, Semester::Third)));
    }

    #[test]
    fn parse_types_file_rejects_bad_type() {
        let input = "xyz 5\n";
        assert!(parse_types_file(input.as_bytes()).is_err());
    }

    #[test]
    fn parse_types_file_skips_blank_lines() {
        let input = "mat 2\n\nbac 3\n";
        let result = parse_types_file(input.as_bytes()).unwrap();
        assert_eq!(result.len(), 2);
    }
}
