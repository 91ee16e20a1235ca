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

use std::time::Duration;

/// Tunables for the subscription engine.
///
/// Duration fields deserialize from integer milliseconds.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct StreamConfig {
    /// Verify that the requested topic exists before establishing a subscription.
    pub check_topic_exists: bool,

    /// How many messages a single storage page may return.
    pub max_page_size: usize,

    /// Capacity of the per-subscription live message queue. A subscriber that
    /// falls this far behind is terminated with `RESOURCE_EXHAUSTED`.
    pub listener_buffer_size: usize,

    /// Emit per-subscription metrics and status logging.
    pub metrics_enabled: bool,

    /// Pause between full pages during the throttled historical drain.
    /// Backfills never throttle.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub retrieve_throttle: Duration,

    /// Total attempts (first try included) for a single storage page.
    pub retry_max_attempts: usize,

    /// Backoff budget for retrying a single storage page.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub retry_max_elapsed: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            check_topic_exists: true,
            max_page_size: 1000,
            listener_buffer_size: 1024,
            metrics_enabled: true,
            retrieve_throttle: Duration::from_millis(50),
            retry_max_attempts: 4,
            retry_max_elapsed: Duration::from_secs(10),
        }
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use std::time::Duration;

    use serde::Deserialize;

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
