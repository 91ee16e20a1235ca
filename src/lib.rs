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

//! Streaming topic message subscriptions for a Hedera mirror node.
//!
//! A subscription merges two sources into one ordered stream: a historical
//! retriever that pages committed messages out of storage, and a live
//! listener fed by ingestion. The seam between the two is deduplicated, gaps
//! in the live feed are backfilled from storage, and delivery is bounded by
//! start time, end time, and limit.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(
    absolute_paths_not_starting_with_crate,
    deprecated_in_future,
    future_incompatible,
    missing_docs,
    clippy::cargo_common_metadata,
    clippy::future_not_send,
    clippy::missing_errors_doc,
    clippy::multiple_crate_versions
)]
// useful pedantic clippy lints
// This is an opt-in list instead of opt-out because sometimes clippy has weird lints.
#![warn(
    clippy::bool_to_int_with_if,
    clippy::checked_conversions,
    clippy::cloned_instead_of_copied,
    clippy::default_trait_access,
    clippy::doc_link_with_quotes,
    clippy::doc_markdown,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::explicit_iter_loop,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::from_iter_instead_of_collect,
    clippy::if_not_else,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::inefficient_to_string,
    clippy::items_after_statements,
    clippy::large_types_passed_by_value,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::manual_ok_or,
    clippy::manual_string_new,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::mut_mut,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::needless_pass_by_value,
    clippy::option_option,
    clippy::range_minus_one,
    clippy::range_plus_one,
    clippy::redundant_closure_for_method_calls,
    clippy::redundant_else,
    clippy::return_self_not_must_use,
    clippy::semicolon_if_nothing_returned,
    clippy::stable_sort_primitive,
    clippy::uninlined_format_args,
    clippy::unnecessary_join,
    clippy::unnecessary_wraps,
    clippy::unnested_or_patterns,
    clippy::unreadable_literal,
    clippy::unused_async,
    clippy::unused_self,
    clippy::used_underscore_binding
)]
#![allow(clippy::enum_glob_use, clippy::enum_variant_names)]

mod config;
mod entity_id;
mod error;
mod filter;
mod listener;
mod metrics;
mod retriever;
mod subscription;
mod topic_id;
mod topic_message;

#[cfg(test)]
pub(crate) mod mock;

pub use config::StreamConfig;
pub use entity_id::{
    Entity,
    EntityId,
    EntityType,
};
pub use error::{
    Error,
    Result,
};
pub use filter::TopicMessageFilter;
pub use listener::{
    TopicListener,
    TopicMessageBus,
};
pub use metrics::{
    StreamMetrics,
    SubscriptionMonitor,
};
pub use retriever::MessagePager;
pub use subscription::{
    EntityLookup,
    TopicMessageService,
    TopicMessageStream,
};
pub use topic_id::TopicId;
pub use topic_message::TopicMessage;
