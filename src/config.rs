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

//! Algorithm configuration. A `Config` value is built once from CLI arguments (and, if given, a
//! config file) and then threaded explicitly through the rest of the program — no global mutable
//! state, unlike the original's `Config` singleton.

use crate::{GroupId, StudentId};

/// Format in which ratings are given in the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingInputType {
    /// Mapping of group id to priority (0 = best).
    Mapping,
    /// Ordered list of group ids, best first.
    OrderedList,
}

/// Algorithm and I/O configuration, threaded explicitly through the program.
#[derive(Debug, Clone)]
pub struct Config {
    pub verbosity_level: u32,
    pub random_seed: u32,

    pub rating_input_type: RatingInputType,
    pub output_per_team: bool,
    pub input_per_team: bool,

    pub disabled_groups_per_step: GroupId,
    pub type_specific_assignment_threshold: u32,
    pub group_disable_threshold: StudentId,
    pub max_team_size: usize,
    pub max_group_size: u32,
    pub allow_default_ratings: bool,
    pub use_min_group_sizes: bool,
    pub allow_min_group_size_default: bool,
    pub min_group_size_effect: u32,
    pub capacity_buffer: f64,
    pub edge_sparsification: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbosity_level: 3,
            random_seed: 7,
            rating_input_type: RatingInputType::Mapping,
            output_per_team: false,
            input_per_team: false,
            disabled_groups_per_step: 3,
            type_specific_assignment_threshold: 0,
            group_disable_threshold: 5,
            max_team_size: 5,
            max_group_size: 1000,
            allow_default_ratings: false,
            use_min_group_sizes: true,
            allow_min_group_size_default: false,
            min_group_size_effect: 3,
            capacity_buffer: 1.05,
            edge_sparsification: true,
        }
    }
}

impl Config {
    /// Checks value-range constraints that cannot be expressed through `clap`'s own validators.
    pub fn check(&self) -> Result<(), String> {
        if self.verbosity_level > 5 {
            return Err("--verbosity must be between 0 and 5".to_string());
        }
        if self.capacity_buffer <= 1.0 {
            return Err("--capacity-buffer-factor must be > 1".to_string());
        }
        if self.min_group_size_effect == 0 || self.min_group_size_effect > 5 {
            return Err("--min-group-size-effect must be between 1 and 5".to_string());
        }
        Ok(())
    }

    /// Derives a `Config` from parsed CLI arguments, first applying a `--config` file (if given)
    /// as a set of defaults that the explicit CLI options below then override.
    pub fn from_matches(matches: &clap::ArgMatches) -> Result<Self, String> {
        let mut config = Config::default();
        if let Some(path) = matches.get_one::<String>("config") {
            apply_config_file(&mut config, path)?;
        }
        if let Some(v) = matches.get_one::<u32>("verbosity") {
            config.verbosity_level = *v;
        }
        if let Some(v) = matches.get_one::<u32>("random_seed") {
            config.random_seed = *v;
        }
        if let Some(v) = matches.get_one::<String>("rating_input_type") {
            config.rating_input_type = match v.as_str() {
                "mapping" => RatingInputType::Mapping,
                "ordered_list" => RatingInputType::OrderedList,
                other => return Err(format!("--rating-input-type must be `mapping` or `ordered_list`, got `{}`", other)),
            };
        }
        if let Some(v) = matches.get_one::<bool>("output_per_team") {
            config.output_per_team = *v;
        }
        if let Some(v) = matches.get_one::<bool>("input_per_team") {
            config.input_per_team = *v;
        }
        if let Some(v) = matches.get_one::<GroupId>("disabled_groups_per_step") {
            config.disabled_groups_per_step = *v;
        }
        if let Some(v) = matches.get_one::<u32>("type_specific_assignment_threshold") {
            config.type_specific_assignment_threshold = *v;
        }
        if let Some(v) = matches.get_one::<StudentId>("group_disable_threshold") {
            config.group_disable_threshold = *v;
        }
        if let Some(v) = matches.get_one::<usize>("max_team_size") {
            config.max_team_size = *v;
        }
        if let Some(v) = matches.get_one::<bool>("use_min_group_sizes") {
            config.use_min_group_sizes = *v;
        }
        if let Some(v) = matches.get_one::<bool>("allow_min_group_size_default") {
            config.allow_min_group_size_default = *v;
        }
        if let Some(v) = matches.get_one::<u32>("min_group_size_effect") {
            config.min_group_size_effect = *v;
        }
        if let Some(v) = matches.get_one::<bool>("allow_default_ratings") {
            config.allow_default_ratings = *v;
        }
        if let Some(v) = matches.get_one::<f64>("capacity_buffer_factor") {
            config.capacity_buffer = *v;
        }
        if let Some(v) = matches.get_one::<bool>("edge_sparsification") {
            config.edge_sparsification = *v;
        }
        if !config.use_min_group_sizes {
            config.allow_min_group_size_default = true;
        }
        config.check()?;
        Ok(config)
    }
}

/// Parses one `key = value` pair from a config file line into a field of type `T`.
fn parse_field<T: std::str::FromStr>(key: &str, value: &str, line_index: usize) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("config file, line {}: invalid value `{}` for `{}`", line_index + 1, value, key))
}

/// Applies a `--config FILE` on top of `config`, in the plain `key = value` format `boost::program_options`
/// config files use: one option per line, blank lines and `#`/`;`-prefixed comments ignored, keys matching
/// the long CLI option names. Values set here are later overridden by any matching CLI argument.
fn apply_config_file(config: &mut Config, path: &str) -> Result<(), String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("could not open config file {}: {}", path, e))?;
    for (line_index, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("config file, line {}: expected `key = value`", line_index + 1))?;
        let key = key.trim();
        let value = value.trim();
        match key {
            "verbosity" => config.verbosity_level = parse_field(key, value, line_index)?,
            "random-seed" => config.random_seed = parse_field(key, value, line_index)?,
            "rating-input-type" => {
                config.rating_input_type = match value {
                    "mapping" => RatingInputType::Mapping,
                    "ordered_list" => RatingInputType::OrderedList,
                    other => {
                        return Err(format!(
                            "config file, line {}: --rating-input-type must be `mapping` or `ordered_list`, got `{}`",
                            line_index + 1,
                            other
                        ))
                    }
                };
            }
            "output-per-team" => config.output_per_team = parse_field(key, value, line_index)?,
            "input-per-team" => config.input_per_team = parse_field(key, value, line_index)?,
            "disabled-groups-per-step" => config.disabled_groups_per_step = parse_field(key, value, line_index)?,
            "type-specific-assignment-threshold" => {
                config.type_specific_assignment_threshold = parse_field(key, value, line_index)?
            }
            "group-disable-threshold" => config.group_disable_threshold = parse_field(key, value, line_index)?,
            "max-team-size" => config.max_team_size = parse_field(key, value, line_index)?,
            "use-min-group-sizes" => config.use_min_group_sizes = parse_field(key, value, line_index)?,
            "allow-min-group-size-default" => {
                config.allow_min_group_size_default = parse_field(key, value, line_index)?
            }
            "min-group-size-effect" => config.min_group_size_effect = parse_field(key, value, line_index)?,
            "allow-default-ratings" => config.allow_default_ratings = parse_field(key, value, line_index)?,
            "capacity-buffer-factor" => config.capacity_buffer = parse_field(key, value, line_index)?,
            "edge-sparsification" => config.edge_sparsification = parse_field(key, value, line_index)?,
            other => return Err(format!("config file, line {}: unknown option `{}`", line_index + 1, other)),
        }
    }
    Ok(())
}

/// Builds the `clap` command line definition for all primary and algorithm options (§6 of the
/// specification).
pub fn build_cli() -> clap::Command {
    clap::command!()
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .required(true)
                .help("Input filename"),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .required(true)
                .help("Output filename"),
        )
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config filename"),
        )
        .arg(
            clap::Arg::new("types")
                .short('t')
                .long("types")
                .value_name("FILE")
                .help("Types filename"),
        )
        .arg(
            clap::Arg::new("groups")
                .short('g')
                .long("groups")
                .value_name("DIR")
                .help("Group report directory: writes one file per non-empty group"),
        )
        .arg(
            clap::Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .value_name("INT")
                .value_parser(clap::value_parser!(u32))
                .help("Output verbosity ranging from 0 [no output] to 5 [debug output] (default: 3)"),
        )
        .arg(
            clap::Arg::new("random_seed")
                .short('s')
                .long("random-seed")
                .value_name("INT")
                .value_parser(clap::value_parser!(u32))
                .help("Seed for pseudo-randomness used by edge sparsification"),
        )
        .arg(
            clap::Arg::new("rating_input_type")
                .long("rating-input-type")
                .value_name("STRING")
                .help("Input format for ratings: `mapping` or `ordered_list`"),
        )
        .arg(
            clap::Arg::new("output_per_team")
                .long("output-per-team")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Output the mapping per team instead of per student (default: false)"),
        )
        .arg(
            clap::Arg::new("input_per_team")
                .long("input-per-team")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Input ratings per team instead of per student (default: false)"),
        )
        .arg(
            clap::Arg::new("disabled_groups_per_step")
                .short('d')
                .long("disabled-groups-per-step")
                .value_name("INT")
                .value_parser(clap::value_parser!(GroupId))
                .help("Number of groups disabled per type-quota step (default: 3)"),
        )
        .arg(
            clap::Arg::new("type_specific_assignment_threshold")
                .long("type-specific-assignment-threshold")
                .value_name("INT")
                .value_parser(clap::value_parser!(u32))
                .help("Rating index above which type-specific assignment is disabled for a student (0 disables this feature)"),
        )
        .arg(
            clap::Arg::new("group_disable_threshold")
                .long("group-disable-threshold")
                .value_name("INT")
                .value_parser(clap::value_parser!(StudentId))
                .help("Minimum number of students per group enforced by the minimum-size loop"),
        )
        .arg(
            clap::Arg::new("max_team_size")
                .long("max-team-size")
                .value_name("INT")
                .value_parser(clap::value_parser!(usize))
                .help("Maximum allowed team size"),
        )
        .arg(
            clap::Arg::new("use_min_group_sizes")
                .long("use-min-group-sizes")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Distribute students more evenly based on groups' minimum target size"),
        )
        .arg(
            clap::Arg::new("allow_min_group_size_default")
                .long("allow-min-group-size-default")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Use a reasonable default minimum group size if none is provided"),
        )
        .arg(
            clap::Arg::new("min_group_size_effect")
                .long("min-group-size-effect")
                .value_name("1..5")
                .value_parser(clap::value_parser!(u32))
                .help("Effect strength of minimum group sizes, 1 (weak) to 5 (overrides preferences)"),
        )
        .arg(
            clap::Arg::new("allow_default_ratings")
                .long("allow-default-ratings")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Allow incomplete rating lists, replacing missing entries with the worst rating"),
        )
        .arg(
            clap::Arg::new("capacity_buffer_factor")
                .long("capacity-buffer-factor")
                .value_name("FLOAT")
                .value_parser(clap::value_parser!(f64))
                .help("Required ratio of active capacity to student count, must be > 1"),
        )
        .arg(
            clap::Arg::new("edge_sparsification")
                .long("edge-sparsification")
                .value_name("BOOL")
                .value_parser(clap::value_parser!(bool))
                .help("Pseudo-randomly sparsify matcher edges to reduce memory usage"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_check() {
        assert!(Config::default().check().is_ok());
    }

    #[test]
    fn rejects_capacity_buffer_not_above_one() {
        let mut config = Config::default();
        config.capacity_buffer = 1.0;
        assert!(config.check().is_err());
    }

    #[test]
    fn rejects_out_of_range_min_group_size_effect() {
        let mut config = Config::default();
        config.min_group_size_effect = 6;
        assert!(config.check().is_err());
        config.min_group_size_effect = 0;
        assert!(config.check().is_err());
    }

    #[test]
    fn config_file_sets_values_but_cli_overrides_win() {
        let dir = std::env::temp_dir().join(format!("gruppenzuteilung-config-test-{:p}", &0));
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("config.ini");
        std::fs::write(&config_path, "# a comment\nverbosity = 1\nrandom-seed = 42\n").unwrap();

        let matches = build_cli().get_matches_from(vec![
            "gruppenzuteilung",
            "-i",
            "in.json",
            "-o",
            "out.json",
            "-c",
            config_path.to_str().unwrap(),
            "--random-seed",
            "99",
        ]);
        let config = Config::from_matches(&matches).unwrap();
        assert_eq!(config.verbosity_level, 1);
        assert_eq!(config.random_seed, 99);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn config_file_rejects_unknown_option() {
        let dir = std::env::temp_dir().join(format!("gruppenzuteilung-config-test-bad-{:p}", &0));
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("config.ini");
        std::fs::write(&config_path, "not-a-real-option = 1\n").unwrap();

        let matches =
            build_cli().get_matches_from(vec!["gruppenzuteilung", "-i", "in.json", "-o", "out.json", "-c", config_path.to_str().unwrap()]);
        assert!(Config::from_matches(&matches).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabling_min_group_sizes_enables_default() {
        let matches = build_cli().get_matches_from(vec![
            "gruppenzuteilung",
            "-i",
            "in.json",
            "-o",
            "out.json",
            "--use-min-group-sizes",
            "false",
        ]);
        let config = Config::from_matches(&matches).unwrap();
        assert!(!config.use_min_group_sizes);
        assert!(config.allow_min_group_size_default);
    }
}
