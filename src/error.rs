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

use std::error::Error as StdError;
use std::result::Result as StdResult;

use crate::TopicId;

/// `Result<T, Error>`
pub type Result<T> = StdResult<T, Error>;

pub(crate) type BoxStdError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents any possible error from a fallible function in the subscription engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A subscription filter failed validation.
    #[error("{0}")]
    InvalidArgument(String),

    /// The requested topic does not exist.
    #[error("topic `{0}` does not exist")]
    TopicNotFound(TopicId),

    /// The requested entity exists but is not a topic.
    #[error("entity `{0}` is not a topic")]
    InvalidTopic(TopicId),

    /// Storage reported a failure that may resolve on its own (connection loss, pool exhaustion).
    ///
    /// The retriever retries these internally; an exhausted retry budget surfaces as
    /// [`Error::TimedOut`].
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] BoxStdError),

    /// Storage reported an unrecoverable failure.
    #[error("storage failure: {0}")]
    StorageInternal(#[source] BoxStdError),

    /// A gap in the live stream could not be reconciled from storage.
    #[error("missing messages: expected sequence `{expected}`, found `{found:?}`")]
    MissingMessages {
        /// The sequence number the backfill was expected to produce next.
        expected: u64,

        /// The sequence number actually produced, if any.
        found: Option<u64>,
    },

    /// The subscriber fell too far behind the live stream and its buffer overflowed.
    #[error("subscriber fell behind the live stream and its message buffer overflowed")]
    BufferOverflow,

    /// The subscriber cancelled the subscription.
    #[error("subscription cancelled by the subscriber")]
    Cancelled,

    /// Failed to parse a basic type from string (ex. [`TopicId`], [`EntityId`](crate::EntityId)).
    #[error("failed to parse: {0}")]
    BasicParse(#[source] BoxStdError),

    /// Request timed out.
    #[error("failed to complete request within the maximum time allowed; most recent attempt failed with: {0}")]
    TimedOut(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn basic_parse<E: Into<BoxStdError>>(error: E) -> Self {
        Self::BasicParse(error.into())
    }

    /// Wrap a transient storage error reported by a port.
    pub fn storage_unavailable<E: Into<BoxStdError>>(error: E) -> Self {
        Self::StorageUnavailable(error.into())
    }

    /// Wrap an unrecoverable storage error reported by a port.
    pub fn storage_internal<E: Into<BoxStdError>>(error: E) -> Self {
        Self::StorageInternal(error.into())
    }

    /// The canonical gRPC status code for this error.
    #[must_use]
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            Self::InvalidArgument(_) | Self::InvalidTopic(_) | Self::BasicParse(_) => {
                tonic::Code::InvalidArgument
            }
            Self::TopicNotFound(_) => tonic::Code::NotFound,
            Self::StorageUnavailable(_) | Self::TimedOut(_) => tonic::Code::Unavailable,
            Self::StorageInternal(_) | Self::MissingMessages { .. } => tonic::Code::Internal,
            Self::BufferOverflow => tonic::Code::ResourceExhausted,
            Self::Cancelled => tonic::Code::Cancelled,
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(error: Error) -> Self {
        Self::new(error.grpc_code(), error.to_string())
    }
}
