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

//! Input parsing, output writing and the human-readable per-group report files.

pub mod json;
pub mod reports;

use crate::state::State;

/// Logs a short summary of the final assignment: how many participants landed in each rating
/// bucket, how many groups are active, and the overall group size distribution. Mirrors the
/// console report the original CLI prints after a successful run.
pub fn log_summary(state: &State) {
    let num_groups = state.num_groups() as u32;
    let mut rating_histogram = vec![0u32; num_groups as usize];
    for participant in 0..state.num_participants() {
        if let Some(group) = state.get_assignment(participant) {
            let index = state.rating(participant)[group].index() as usize;
            rating_histogram[index] += 1;
        }
    }
    for (index, count) in rating_histogram.iter().enumerate() {
        if *count > 0 {
            log::info!("{} participant(s) got their choice #{}", count, index);
        }
    }
    log::info!(
        "{} of {} groups active",
        state.num_active_groups(),
        state.num_groups()
    );
    for group in 0..state.num_groups() {
        if state.group_is_enabled(group) {
            log::debug!(
                "Group '{}': {}/{} occupied",
                state.group_data(group).id,
                state.group_size(group),
                state.group_original_capacity(group)
            );
        }
    }
}
