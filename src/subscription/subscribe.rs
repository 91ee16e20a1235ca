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
use std::sync::Arc;
use std::task::{
    Context,
    Poll,
};

use async_stream::stream;
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use futures_core::Stream;
use futures_util::StreamExt;
use time::OffsetDateTime;

use crate::entity_id::{
    Entity,
    EntityId,
    EntityType,
};
use crate::listener::TopicMessageBus;
use crate::metrics::{
    StreamMetrics,
    SubscriptionMonitor,
};
use crate::retriever::{
    self,
    MessagePager,
};
use crate::{
    Error,
    StreamConfig,
    TopicMessage,
    TopicMessageFilter,
};

/// Resolves entity ids to their minimal stored view.
pub trait EntityLookup: Send + Sync + 'static {
    /// Look up an entity by id, returning `None` when it does not exist.
    fn find(&self, id: EntityId) -> BoxFuture<'_, crate::Result<Option<Entity>>>;
}

/// The topic message subscription engine.
///
/// A subscription drains every stored message matching its filter, then
/// switches to the live bus, deduplicating at the seam and backfilling any
/// sequence number gap from storage, so that subscribers observe each
/// sequence number exactly once and in order.
pub struct TopicMessageService {
    config: StreamConfig,
    entities: Arc<dyn EntityLookup>,
    pager: Arc<dyn MessagePager>,
    bus: Arc<TopicMessageBus>,
    metrics: Arc<StreamMetrics>,
}

impl TopicMessageService {
    /// Create a new service around the given ports, registering its
    /// instruments with `registry`.
    #[must_use]
    pub fn new(
        config: StreamConfig,
        entities: Arc<dyn EntityLookup>,
        pager: Arc<dyn MessagePager>,
        bus: Arc<TopicMessageBus>,
        registry: &prometheus::Registry,
    ) -> Self {
        let metrics = Arc::new(StreamMetrics::new(registry, config.metrics_enabled));

        Self { config, entities, pager, bus, metrics }
    }

    /// The live bus this service reads from.
    #[must_use]
    pub fn bus(&self) -> &Arc<TopicMessageBus> {
        &self.bus
    }

    /// Open a subscription for `filter`.
    ///
    /// Validation and the topic existence check run here, before the
    /// subscription is established; everything afterwards is reported
    /// through the returned stream.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the filter fails validation, or the
    ///   entity is not a topic.
    /// - [`Error::TopicNotFound`] if the topic does not exist and
    ///   [`StreamConfig::check_topic_exists`] is set.
    /// - Any storage error from the entity lookup.
    pub async fn subscribe(
        &self,
        mut filter: TopicMessageFilter,
    ) -> crate::Result<TopicMessageStream> {
        let topic_id = filter.validate(unix_now_nanos())?;

        if self.config.check_topic_exists {
            match self.entities.find(topic_id.into()).await? {
                None => return Err(Error::TopicNotFound(topic_id)),
                Some(Entity { kind, .. }) if kind != EntityType::Topic => {
                    return Err(Error::InvalidTopic(topic_id))
                }
                Some(_) => {}
            }
        }

        // The listener opens before the historical drain begins so that
        // nothing committed during the drain can be missed; the overlap is
        // removed at the seam by sequence number.
        let listener = self.bus.subscribe(filter.clone(), self.config.listener_buffer_size);
        filter.set_subscriber_id(listener.id());

        let monitor = Arc::new(SubscriptionMonitor::new(Arc::clone(&self.metrics), &filter));
        let historical =
            retriever::retrieve(Arc::clone(&self.pager), filter.clone(), &self.config, true);

        log::debug!("subscriber {} opened on topic {topic_id}", filter.get_subscriber_id());

        let inner = Box::pin(stream_messages(
            Arc::clone(&self.pager),
            self.config.clone(),
            filter,
            historical,
            listener,
            Arc::clone(&monitor),
        ));

        Ok(TopicMessageStream { inner, monitor })
    }
}

/// An open subscription.
///
/// Yields messages until the limit or end time is reached, or an error
/// terminates it. Dropping the stream cancels the subscription and releases
/// the pager, the listener registration, and any pending backfill.
pub struct TopicMessageStream {
    inner: BoxStream<'static, crate::Result<TopicMessage>>,
    monitor: Arc<SubscriptionMonitor>,
}

impl std::fmt::Debug for TopicMessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicMessageStream").finish_non_exhaustive()
    }
}

impl TopicMessageStream {
    /// The number of messages delivered so far.
    #[must_use]
    pub fn responses(&self) -> u64 {
        self.monitor.responses()
    }
}

impl Stream for TopicMessageStream {
    type Item = crate::Result<TopicMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TopicMessageStream {
    fn drop(&mut self) {
        // records a cancellation unless the pipeline already finished
        self.monitor.cancel();
    }
}

/// The filter for reconciling a live-stream gap from storage.
///
/// Covers exactly the window between the last emitted message and `next`,
/// both exclusive: everything after `last_timestamp` and before
/// `next.consensus_timestamp`, which by the data model is exactly the
/// sequence numbers between the two.
fn backfill_filter(
    filter: &TopicMessageFilter,
    last_sequence: u64,
    last_timestamp: i64,
    next: &TopicMessage,
) -> TopicMessageFilter {
    let mut backfill = filter.starting_at(last_timestamp + 1);
    backfill.end_time(next.consensus_timestamp);
    backfill.limit(next.sequence_number - last_sequence - 1);
    backfill
}

fn unix_now_nanos() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as i64
}

fn stream_messages(
    pager: Arc<dyn MessagePager>,
    config: StreamConfig,
    filter: TopicMessageFilter,
    historical: impl Stream<Item = crate::Result<TopicMessage>> + Send + 'static,
    listener: crate::TopicListener,
    monitor: Arc<SubscriptionMonitor>,
) -> impl Stream<Item = crate::Result<TopicMessage>> + Send + 'static {
    stream! {
        let end_time = filter.get_end_time();
        let limit = filter.get_limit();
        let mut delivered: u64 = 0;
        let mut last: Option<(u64, i64)> = None;

        let mut historical = std::pin::pin!(historical);
        while let Some(message) = historical.next().await {
            let message = match message {
                Ok(it) => it,
                Err(error) => {
                    monitor.finish(Some(&error));
                    yield Err(error);
                    return;
                }
            };

            // overlap with a previous page, or an out-of-order retransmit
            if last.map_or(false, |(sequence, _)| message.sequence_number <= sequence) {
                continue;
            }

            if end_time.map_or(false, |end| message.consensus_timestamp >= end) {
                monitor.finish(None);
                return;
            }

            last = Some((message.sequence_number, message.consensus_timestamp));
            monitor.on_message(&message);
            delivered += 1;
            yield Ok(message);

            if limit > 0 && delivered == limit {
                monitor.finish(None);
                return;
            }
        }

        // A quiesced end bound needs no live phase: once the drain has passed
        // an end time that is already in the past, nothing below it can still
        // commit.
        if end_time.map_or(false, |end| end <= unix_now_nanos()) {
            monitor.finish(None);
            return;
        }

        let mut live = std::pin::pin!(listener);
        'live: while let Some(candidate) = live.next().await {
            let candidate = match candidate {
                Ok(it) => it,
                Err(error) => {
                    monitor.finish(Some(&error));
                    yield Err(error);
                    return;
                }
            };

            if let Some((last_sequence, last_timestamp)) = last {
                // duplicate at the seam, or a retransmit
                if candidate.sequence_number <= last_sequence {
                    continue 'live;
                }

                let gap = candidate.sequence_number - last_sequence - 1;
                if gap > 0 {
                    log::debug!(
                        "gap of {gap} messages on topic {} after sequence {last_sequence}",
                        candidate.topic_id
                    );

                    let window = backfill_filter(&filter, last_sequence, last_timestamp, &candidate);
                    let mut expected = last_sequence + 1;

                    let fill = retriever::retrieve(Arc::clone(&pager), window, &config, false);
                    let mut fill = std::pin::pin!(fill);
                    while let Some(message) = fill.next().await {
                        let message = match message {
                            Ok(it) => it,
                            Err(error) => {
                                monitor.finish(Some(&error));
                                yield Err(error);
                                return;
                            }
                        };

                        if message.sequence_number != expected {
                            let error = Error::MissingMessages {
                                expected,
                                found: Some(message.sequence_number),
                            };
                            monitor.finish(Some(&error));
                            yield Err(error);
                            return;
                        }
                        expected += 1;

                        if end_time.map_or(false, |end| message.consensus_timestamp >= end) {
                            monitor.finish(None);
                            return;
                        }

                        last = Some((message.sequence_number, message.consensus_timestamp));
                        monitor.on_message(&message);
                        delivered += 1;
                        yield Ok(message);

                        if limit > 0 && delivered == limit {
                            monitor.finish(None);
                            return;
                        }
                    }

                    if expected != candidate.sequence_number {
                        let error = Error::MissingMessages { expected, found: None };
                        monitor.finish(Some(&error));
                        yield Err(error);
                        return;
                    }
                }
            }

            if end_time.map_or(false, |end| candidate.consensus_timestamp >= end) {
                monitor.finish(None);
                return;
            }

            last = Some((candidate.sequence_number, candidate.consensus_timestamp));
            monitor.on_message(&candidate);
            delivered += 1;
            yield Ok(candidate);

            if limit > 0 && delivered == limit {
                monitor.finish(None);
                return;
            }
        }

        // the live bus went away; nothing more can arrive
        monitor.finish(None);
    }
}
