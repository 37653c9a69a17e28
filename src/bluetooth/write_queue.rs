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

//! FIFO serialization of outbound writes.
//!
//! At most one request executes at a time. The head of the queue is the
//! request in flight; it leaves the queue only after its callback returned,
//! and only then is the next head dispatched. Callbacks run on the server's
//! callback dispatcher.

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use super::dispatch::CallbackDispatcher;
use crate::error::Result;

/// Completion callback of a write: byte count or error.
pub type WriteCallback = Box<dyn FnOnce(Result<usize>) + Send + 'static>;

/// Executes a single write.
pub(crate) trait WriteSink: Send + Sync + 'static {
    fn write_once(&self, data: Bytes) -> BoxFuture<'static, Result<usize>>;
}

/// A queued write.
pub(crate) struct WriteRequest {
    data: Bytes,
    on_complete: Option<WriteCallback>,
}

impl WriteRequest {
    pub(crate) fn new(data: Bytes, on_complete: WriteCallback) -> Self {
        Self {
            data,
            on_complete: Some(on_complete),
        }
    }
}

/// Pending writes, head first.
pub(crate) struct WriteQueue {
    pending: Mutex<VecDeque<WriteRequest>>,
    dispatcher: CallbackDispatcher,
}

impl WriteQueue {
    pub(crate) fn new(dispatcher: CallbackDispatcher) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            dispatcher,
        }
    }

    /// Append a request; dispatch it right away if nothing is in flight.
    pub(crate) fn enqueue(self: &Arc<Self>, sink: Arc<dyn WriteSink>, request: WriteRequest) {
        let mut pending = self.pending.lock();
        let was_empty = pending.is_empty();
        pending.push_back(request);

        if was_empty {
            self.dispatch_head(&pending, sink);
        } else {
            debug!("Write queued behind {} pending", pending.len() - 1);
        }
    }

    /// Number of requests queued, including the one in flight.
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    fn dispatch_head(self: &Arc<Self>, pending: &VecDeque<WriteRequest>, sink: Arc<dyn WriteSink>) {
        let Some(head) = pending.front() else {
            return;
        };

        let data = head.data.clone();
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let result = sink.write_once(data).await;
            queue.complete(sink, result);
        });
    }

    fn complete(self: &Arc<Self>, sink: Arc<dyn WriteSink>, result: Result<usize>) {
        let on_complete = self
            .pending
            .lock()
            .front_mut()
            .and_then(|head| head.on_complete.take());

        let queue = Arc::clone(self);
        self.dispatcher.post(Box::new(move || {
            // Called without the lock so the callback may submit more writes.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(on_complete) = on_complete {
                    on_complete(result);
                }
            }));

            queue.advance(sink);
            if let Err(payload) = outcome {
                panic::resume_unwind(payload);
            }
        }));
    }

    /// Drop the finished head and start the next request.
    fn advance(self: &Arc<Self>, sink: Arc<dyn WriteSink>) {
        let mut pending = self.pending.lock();
        pending.pop_front();
        if !pending.is_empty() {
            self.dispatch_head(&pending, sink);
        }
    }
}
