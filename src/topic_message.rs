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

use bytes::Bytes;

use crate::TopicId;

/// A single message committed to a topic.
///
/// Payloads are [`Bytes`], so cloning a message for fan-out does not copy the body.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessage {
    /// The topic this message was published to.
    pub topic_id: TopicId,

    /// The consensus timestamp of the message, in nanoseconds since the epoch.
    ///
    /// Unique per topic, and strictly increasing with `sequence_number`.
    pub consensus_timestamp: i64,

    /// The sequence number of the message relative to all other messages
    /// for the same topic. Starts at 1 and has no gaps.
    pub sequence_number: u64,

    /// The content of the message.
    pub message: Bytes,

    /// The running hash of the topic after this message was committed.
    pub running_hash: Bytes,

    /// Version of the SHA-384 digest used to update the running hash.
    pub running_hash_version: u64,
}

impl TopicMessage {
    /// Create a new `TopicMessage`.
    #[must_use]
    pub fn new(
        topic_id: TopicId,
        consensus_timestamp: i64,
        sequence_number: u64,
        message: Bytes,
        running_hash: Bytes,
        running_hash_version: u64,
    ) -> Self {
        Self {
            topic_id,
            consensus_timestamp,
            sequence_number,
            message,
            running_hash,
            running_hash_version,
        }
    }
}
