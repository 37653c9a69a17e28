// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Serial delivery of completion callbacks.
//!
//! Every callback of one server runs on a single task, one after another,
//! in the order it was posted.

use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// A completion ready to run.
pub(crate) type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of a server's callback task.
///
/// The task ends once every clone is dropped and the queue is drained.
#[derive(Clone)]
pub(crate) struct CallbackDispatcher {
    tx: mpsc::UnboundedSender<Callback>,
}

impl CallbackDispatcher {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub(crate) fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();

        tokio::spawn(async move {
            while let Some(callback) = rx.recv().await {
                // A panicking callback must not take later completions with it.
                if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    error!("Completion callback panicked");
                }
            }
            debug!("Callback dispatcher stopped");
        });

        Self { tx }
    }

    /// Queue `callback` behind every callback posted before it.
    pub(crate) fn post(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            debug!("Callback dropped, dispatcher stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_callbacks_run_one_at_a_time_in_order() {
        let dispatcher = CallbackDispatcher::spawn();
        let running = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..8usize {
            let running = Arc::clone(&running);
            let done_tx = done_tx.clone();
            dispatcher.post(Box::new(move || {
                let overlapping = running.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send((i, overlapping));
            }));
        }

        for expected in 0..8usize {
            assert_eq!(done_rx.recv().await.unwrap(), (expected, 0));
        }
    }

    #[tokio::test]
    async fn test_panic_does_not_stop_delivery() {
        let dispatcher = CallbackDispatcher::spawn();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        dispatcher.post(Box::new(|| panic!("callback failure")));
        dispatcher.post(Box::new(move || {
            let _ = done_tx.send("after panic");
        }));

        assert_eq!(done_rx.recv().await.unwrap(), "after panic");
    }
}
