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

use crate::{
    Error,
    TopicId,
    TopicMessage,
};

/// Selects the messages a subscription receives.
///
/// `start_time` is inclusive, `end_time` is exclusive, and both are nanoseconds
/// since the epoch. A `limit` of 0 means unbounded.
#[derive(Debug, Default, Clone)]
pub struct TopicMessageFilter {
    /// The topic to retrieve messages for.
    topic_id: Option<TopicId>,

    /// Include messages which reached consensus on or after this time.
    /// Defaults to 0, the beginning of the topic.
    start_time: i64,

    /// Include messages which reached consensus before this time.
    end_time: Option<i64>,

    /// The maximum number of messages to receive before completing.
    limit: u64,

    /// Assigned by the engine when the subscription is established.
    subscriber_id: u64,
}

impl TopicMessageFilter {
    /// Create a new, unconstrained filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID of the topic to retrieve messages for.
    #[must_use]
    pub fn get_topic_id(&self) -> Option<TopicId> {
        self.topic_id
    }

    /// Sets the topic ID to retrieve messages for.
    pub fn topic_id(&mut self, id: impl Into<TopicId>) -> &mut Self {
        self.topic_id = Some(id.into());
        self
    }

    /// Returns the minimum `consensus_timestamp` of the messages to return.
    #[must_use]
    pub fn get_start_time(&self) -> i64 {
        self.start_time
    }

    /// Sets to include messages which reached consensus on or after this time.
    pub fn start_time(&mut self, time: i64) -> &mut Self {
        self.start_time = time;
        self
    }

    /// Returns the exclusive upper bound on `consensus_timestamp`, if any.
    #[must_use]
    pub fn get_end_time(&self) -> Option<i64> {
        self.end_time
    }

    /// Sets to include messages which reached consensus before this time.
    pub fn end_time(&mut self, time: i64) -> &mut Self {
        self.end_time = Some(time);
        self
    }

    /// Returns the maximum number of messages to be returned.
    #[must_use]
    pub fn get_limit(&self) -> u64 {
        self.limit
    }

    /// Sets the maximum number of messages to be returned, before completing the subscription.
    /// Defaults to _unlimited_.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Returns the engine-assigned subscriber id, or 0 before the subscription is established.
    #[must_use]
    pub fn get_subscriber_id(&self) -> u64 {
        self.subscriber_id
    }

    pub(crate) fn set_subscriber_id(&mut self, id: u64) {
        self.subscriber_id = id;
    }

    /// Check the filter invariants, returning the topic id on success.
    ///
    /// Runs before any I/O; `now` is the current time in nanoseconds since the epoch.
    pub(crate) fn validate(&self, now: i64) -> crate::Result<TopicId> {
        let topic_id = self
            .topic_id
            .ok_or_else(|| Error::InvalidArgument("topicId must not be null".to_owned()))?;

        if self.start_time < 0 {
            return Err(Error::InvalidArgument(
                "startTime must be greater than or equal to 0".to_owned(),
            ));
        }

        if let Some(end_time) = self.end_time {
            if end_time <= self.start_time {
                return Err(Error::InvalidArgument("End time must be after start time".to_owned()));
            }
        }

        if self.start_time > now {
            return Err(Error::InvalidArgument(
                "Start time must be before the current time".to_owned(),
            ));
        }

        Ok(topic_id)
    }

    /// Whether a newly committed message belongs to this subscription's live feed.
    ///
    /// The end bound is deliberately not applied here; the pipeline uses the first
    /// out-of-range message to complete the stream.
    pub(crate) fn matches(&self, message: &TopicMessage) -> bool {
        self.topic_id == Some(message.topic_id) && message.consensus_timestamp >= self.start_time
    }

    /// A copy of this filter with the start cursor advanced, for the next storage page.
    pub(crate) fn starting_at(&self, cursor: i64) -> Self {
        let mut filter = self.clone();
        filter.start_time = cursor;
        filter
    }
}
