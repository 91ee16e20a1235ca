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

use std::fmt::{
    self,
    Debug,
    Display,
    Formatter,
};
use std::str::FromStr;

use crate::EntityId;

/// A unique identifier for a topic on Hedera.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TopicId {
    /// A non-negative number identifying the shard containing this topic.
    pub shard: u64,

    /// A non-negative number identifying the realm within the shard containing this topic.
    pub realm: u64,

    /// A non-negative number identifying the topic within the realm.
    pub num: u64,
}

impl TopicId {
    /// Create a new `TopicId`.
    #[must_use]
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl Debug for TopicId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl Display for TopicId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl From<u64> for TopicId {
    fn from(num: u64) -> Self {
        Self { shard: 0, realm: 0, num }
    }
}

impl From<EntityId> for TopicId {
    fn from(id: EntityId) -> Self {
        Self { shard: id.shard, realm: id.realm, num: id.num }
    }
}

impl From<TopicId> for EntityId {
    fn from(id: TopicId) -> Self {
        Self { shard: id.shard, realm: id.realm, num: id.num }
    }
}

impl FromStr for TopicId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.parse::<EntityId>().map(Self::from)
    }
}
