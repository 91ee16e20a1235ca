/*
 * ‌
 * Hedera Mirror Stream
 * ​
 * Copyright (C) 2023 - 2024 Hedera Hashgraph, LLC
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::pin::Pin;
use std::sync::atomic::{
    AtomicBool,
    AtomicU64,
    Ordering,
};
use std::sync::{
    Arc,
    Weak,
};
use std::task::{
    Context,
    Poll,
};

use dashmap::DashMap;
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{
    Error,
    TopicMessage,
    TopicMessageFilter,
};

struct Registration {
    filter: TopicMessageFilter,
    sender: mpsc::Sender<TopicMessage>,
    overflowed: Arc<AtomicBool>,
}

/// Process-wide broadcast of newly committed topic messages.
///
/// Ingestion publishes each message once; every matching subscription receives
/// it through its own bounded queue. Registrations live in a concurrent map
/// keyed by subscriber id, so dropping a [`TopicListener`] removes its entry
/// without blocking publishers.
pub struct TopicMessageBus {
    subscribers: DashMap<u64, Registration>,
    next_subscriber_id: AtomicU64,
    weak_self: Weak<TopicMessageBus>,
}

impl TopicMessageBus {
    /// Create a new, empty bus.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            subscribers: DashMap::new(),
            next_subscriber_id: AtomicU64::new(0),
            weak_self: weak_self.clone(),
        })
    }

    /// The number of live listener registrations.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver a newly committed message to every matching subscription.
    ///
    /// A subscription whose queue is full is torn down here; it will observe
    /// [`Error::BufferOverflow`] once it drains what it already buffered.
    pub fn publish(&self, message: &TopicMessage) {
        self.subscribers.retain(|subscriber_id, registration| {
            if !registration.filter.matches(message) {
                return true;
            }

            match registration.sender.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Closed(_)) => false,
                Err(TrySendError::Full(_)) => {
                    registration.overflowed.store(true, Ordering::Release);
                    log::warn!(
                        "subscriber {subscriber_id} fell behind on topic {}; dropping its live feed",
                        message.topic_id
                    );
                    false
                }
            }
        });
    }

    /// Register a subscription and return its live message stream.
    ///
    /// Only `filter.topic_id` and `filter.start_time` select messages here;
    /// end time and limit are applied downstream.
    pub fn subscribe(&self, filter: TopicMessageFilter, capacity: usize) -> TopicListener {
        let subscriber_id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let overflowed = Arc::new(AtomicBool::new(false));

        self.subscribers.insert(
            subscriber_id,
            Registration { filter, sender, overflowed: Arc::clone(&overflowed) },
        );

        TopicListener {
            subscriber_id,
            bus: Weak::clone(&self.weak_self),
            receiver,
            overflowed,
            done: false,
        }
    }
}

/// One subscription's view of the live bus.
///
/// Yields matching messages in publish order; ends when the bus goes away, or
/// yields a final [`Error::BufferOverflow`] if the subscriber fell behind.
/// Dropping the listener unregisters it. The bus is held weakly so that a
/// listener never keeps the process-wide publisher alive on its own.
pub struct TopicListener {
    subscriber_id: u64,
    bus: Weak<TopicMessageBus>,
    receiver: mpsc::Receiver<TopicMessage>,
    overflowed: Arc<AtomicBool>,
    done: bool,
}

impl TopicListener {
    /// The bus-assigned subscriber id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.subscriber_id
    }
}

impl Stream for TopicListener {
    type Item = crate::Result<TopicMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(message)) => Poll::Ready(Some(Ok(message))),
            Poll::Ready(None) => {
                this.done = true;

                if this.overflowed.load(Ordering::Acquire) {
                    Poll::Ready(Some(Err(Error::BufferOverflow)))
                } else {
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TopicListener {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.remove(&self.subscriber_id);
        }
    }
}
