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

use std::collections::HashMap;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};

use bytes::Bytes;
use futures_core::future::BoxFuture;
use parking_lot::Mutex;

use crate::entity_id::{
    Entity,
    EntityId,
    EntityType,
};
use crate::retriever::MessagePager;
use crate::subscription::EntityLookup;
use crate::{
    Error,
    TopicId,
    TopicMessage,
    TopicMessageFilter,
};

/// An assembled message with a constant payload, for tests.
pub(crate) fn message(topic: u64, sequence_number: u64, consensus_timestamp: i64) -> TopicMessage {
    TopicMessage::new(
        TopicId::from(topic),
        consensus_timestamp,
        sequence_number,
        Bytes::from_static(b"message"),
        Bytes::from_static(b"hash"),
        3,
    )
}

/// In-memory entity table and message store backing the unit tests.
///
/// Pages exactly like the storage contract: ascending by consensus timestamp,
/// start inclusive, end exclusive, at most `page_size` rows per call.
#[derive(Default)]
pub(crate) struct MockLedger {
    entities: Mutex<HashMap<EntityId, Entity>>,
    messages: Mutex<Vec<TopicMessage>>,
    page_calls: AtomicUsize,
    transient_failures: AtomicUsize,
    fatal: AtomicBool,
}

impl MockLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_entity(&self, num: u64, kind: EntityType) {
        let id = EntityId::from(num);
        self.entities.lock().insert(id, Entity { id, kind });
    }

    pub(crate) fn insert_message(&self, topic: u64, sequence_number: u64, consensus_timestamp: i64) {
        let mut messages = self.messages.lock();
        messages.push(message(topic, sequence_number, consensus_timestamp));
        messages.sort_by_key(|it| it.consensus_timestamp);
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `failures` page calls with a transient storage error.
    pub(crate) fn fail_transient(&self, failures: usize) {
        self.transient_failures.store(failures, Ordering::SeqCst);
    }

    /// Fail every page call with a fatal storage error.
    pub(crate) fn fail_fatal(&self) {
        self.fatal.store(true, Ordering::SeqCst);
    }
}

impl EntityLookup for MockLedger {
    fn find(&self, id: EntityId) -> BoxFuture<'_, crate::Result<Option<Entity>>> {
        let entity = self.entities.lock().get(&id).copied();

        Box::pin(std::future::ready(Ok(entity)))
    }
}

impl MessagePager for MockLedger {
    fn page(
        &self,
        filter: &TopicMessageFilter,
        page_size: usize,
        _throttled: bool,
    ) -> BoxFuture<'_, crate::Result<Vec<TopicMessage>>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        if self.fatal.load(Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(Error::storage_internal(
                "page table corrupted",
            ))));
        }

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |it| it.checked_sub(1))
            .is_ok();
        if failing {
            return Box::pin(std::future::ready(Err(Error::storage_unavailable(
                "connection reset",
            ))));
        }

        let topic_id = filter.get_topic_id();
        let start = filter.get_start_time();
        let end = filter.get_end_time();

        let page: Vec<_> = self
            .messages
            .lock()
            .iter()
            .filter(|it| Some(it.topic_id) == topic_id)
            .filter(|it| it.consensus_timestamp >= start)
            .filter(|it| end.map_or(true, |end| it.consensus_timestamp < end))
            .take(page_size)
            .cloned()
            .collect();

        Box::pin(std::future::ready(Ok(page)))
    }
}
