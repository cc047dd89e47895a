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

//! Command line driver: reads the input and (optional) types file, runs the assignment loops,
//! and writes the resulting mapping plus (optionally) per-group report files.

use gruppenzuteilung::config::{self, Config};
use gruppenzuteilung::filter::parse_types_file;
use gruppenzuteilung::interrupt::InterruptHandle;
use gruppenzuteilung::io::{json, log_summary, reports};
use gruppenzuteilung::scheduler;
use gruppenzuteilung::state::State;
use log::error;
use std::fs::File;
use std::io::BufReader;

fn run() -> Result<(), String> {
    let matches = config::build_cli().get_matches();
    let config = Config::from_matches(&matches)?;

    let input_path = matches.get_one::<String>("input").unwrap();
    let input_file = File::open(input_path).map_err(|e| format!("could not open input file {}: {}", input_path, e))?;
    let input = json::parse_input(BufReader::new(input_file), &config)?;

    let quotas = match matches.get_one::<String>("types") {
        Some(path) => {
            let file = File::open(path).map_err(|e| format!("could not open types file {}: {}", path, e))?;
            parse_types_file(BufReader::new(file))?
        }
        None => Vec::new(),
    };

    let mut state = State::new(&input, &config)?;
    let interrupt = InterruptHandle::install()?;

    scheduler::assign_with_minimum_number_per_group(&mut state, &config, &interrupt)?;
    scheduler::disable_type_specific_assignment_below_threshold(&mut state, &config);
    if !quotas.is_empty() {
        scheduler::assert_minimum_number_per_group_for_specific_type(&mut state, &config, &interrupt, &quotas)?;
    }

    log_summary(&state);

    let output_path = matches.get_one::<String>("output").unwrap();
    let output_file =
        File::create(output_path).map_err(|e| format!("could not create output file {}: {}", output_path, e))?;
    json::write_output(output_file, &state, &config)?;

    if let Some(dir) = matches.get_one::<String>("groups") {
        reports::write_group_reports(std::path::Path::new(dir), &state, &quotas)?;
    }

    if interrupt.stop_requested() {
        error!("Run was interrupted; the written assignment reflects the last completed step.");
    }

    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(exitcode::DATAERR);
    }
}
