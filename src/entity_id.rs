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

use crate::Error;

/// A unique identifier for any entity on the ledger, in `shard.realm.num` form.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityId {
    /// A non-negative number identifying the shard containing this entity.
    pub shard: u64,

    /// A non-negative number identifying the realm within the shard containing this entity.
    pub realm: u64,

    /// A non-negative number identifying the entity within the realm.
    pub num: u64,
}

impl EntityId {
    /// Create a new `EntityId`.
    #[must_use]
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl Debug for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl From<u64> for EntityId {
    fn from(num: u64) -> Self {
        Self { shard: 0, realm: 0, num }
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let parts: Vec<_> = s.split('.').collect();

        match *parts.as_slice() {
            [num] => num.parse::<u64>().map(Self::from).map_err(Error::basic_parse),
            [shard, realm, num] => {
                let shard = shard.parse().map_err(Error::basic_parse)?;
                let realm = realm.parse().map_err(Error::basic_parse)?;
                let num = num.parse().map_err(Error::basic_parse)?;

                Ok(Self { shard, realm, num })
            }
            _ => Err(Error::basic_parse(format!("expected `<shard>.<realm>.<num>`, got `{s}`"))),
        }
    }
}

/// The kind of entity an [`EntityId`] refers to.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum EntityType {
    /// A cryptocurrency account.
    Account,

    /// A smart contract instance.
    Contract,

    /// A file stored on the ledger.
    File,

    /// A consensus service topic.
    Topic,

    /// A token type.
    Token,

    /// A scheduled transaction.
    Schedule,
}

/// The minimal stored view of an entity, as consumed by the topic existence check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    /// The entity's identifier.
    pub id: EntityId,

    /// What kind of entity this is.
    pub kind: EntityType,
}
