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

//! Cooperative cancellation via SIGINT. A single Ctrl-C requests that the scheduler stop after
//! its current step and report the best assignment found so far; a second Ctrl-C aborts
//! immediately without writing any output.

use log::{info, warn};
use std::sync::{Arc, Condvar, Mutex};

/// Tri-state interrupt flag, shared between the signal handler and whichever thread is running
/// the scheduler loop.
#[derive(Debug, Default)]
struct SharedState {
    stop_requested: bool,
    abort_requested: bool,
}

/// Handle to the interrupt flag. Cheap to clone; all clones observe the same signal.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<Mutex<SharedState>>,
    condvar: Arc<Condvar>,
}

impl InterruptHandle {
    pub(crate) fn new() -> Self {
        InterruptHandle {
            state: Arc::new(Mutex::new(SharedState::default())),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Installs a SIGINT handler that records the first Ctrl-C as a graceful stop request and the
    /// second as an immediate abort request. Returns the handle to poll from the scheduler loop.
    ///
    /// May only be called once per process; a second call returns an error from the `ctrlc`
    /// crate, which is propagated.
    pub fn install() -> Result<Self, String> {
        let handle = InterruptHandle::new();
        let state = Arc::clone(&handle.state);
        let condvar = Arc::clone(&handle.condvar);
        ctrlc::set_handler(move || {
            let mut guard = state.lock().unwrap();
            if guard.stop_requested {
                guard.abort_requested = true;
                eprintln!("Received second interrupt, aborting immediately.");
            } else {
                guard.stop_requested = true;
                eprintln!("Received interrupt, stopping after the current step...");
            }
            condvar.notify_all();
        })
        .map_err(|e| format!("failed to install signal handler: {}", e))?;
        Ok(handle)
    }

    /// True once at least one Ctrl-C has been received.
    pub fn stop_requested(&self) -> bool {
        self.state.lock().unwrap().stop_requested
    }

    /// True once a second Ctrl-C has been received.
    pub fn abort_requested(&self) -> bool {
        self.state.lock().unwrap().abort_requested
    }
}

/// Runs `computation` on a worker thread, logging (but not terminating the worker) if the caller
/// loses patience. The worker always runs to completion — Rust gives no safe way to kill a
/// thread — but the caller gets its result back as soon as it is ready, and can in the meantime
/// observe `interrupt` to decide whether to keep waiting for further scheduler steps at all.
pub fn run_cancellable<T, F>(interrupt: &InterruptHandle, label: &str, computation: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let state = Arc::clone(&interrupt.state);
    let condvar = Arc::clone(&interrupt.condvar);
    let label = label.to_string();
    let worker = std::thread::spawn(move || {
        let result = computation();
        let guard = state.lock().unwrap();
        condvar.notify_all();
        drop(guard);
        result
    });

    loop {
        let guard = interrupt.state.lock().unwrap();
        if worker.is_finished() {
            break;
        }
        if guard.abort_requested {
            warn!("Aborting immediately, {} is still running in the background.", label);
            // The process exit tears down the worker thread with it; there is no safe way to
            // cancel it in place.
            std::process::exit(exitcode::SOFTWARE);
        }
        let _ = interrupt
            .condvar
            .wait_timeout(guard, std::time::Duration::from_millis(200))
            .unwrap();
    }
    match worker.join() {
        Ok(result) => result,
        Err(_) => {
            info!("Worker thread for {} panicked", label);
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_cancellable_returns_computation_result() {
        let interrupt = InterruptHandle::new();
        let result = run_cancellable(&interrupt, "test", || 2 + 2);
        assert_eq!(result, 4);
    }

    #[test]
    fn fresh_handle_has_no_interrupt_requested() {
        let interrupt = InterruptHandle::new();
        assert!(!interrupt.stop_requested());
        assert!(!interrupt.abort_requested());
    }
}
