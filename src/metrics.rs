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

use std::sync::atomic::{
    AtomicBool,
    AtomicU64,
    Ordering,
};
use std::sync::Arc;
use std::time::Instant;

use prometheus::core::Collector;
use prometheus::{
    Histogram,
    HistogramOpts,
    IntCounterVec,
    IntGauge,
    Opts,
    Registry,
};
use time::OffsetDateTime;

use crate::{
    Error,
    TopicMessage,
    TopicMessageFilter,
};

/// Instruments shared by every subscription.
///
/// Everything here is observational: registration failures are logged and
/// otherwise ignored, and a disabled instance suppresses all emission,
/// including per-subscription status logging.
pub struct StreamMetrics {
    enabled: bool,
    subscriptions: IntGauge,
    messages: IntCounterVec,
    latency: Histogram,
    duration: Histogram,
    completions: IntCounterVec,
}

impl StreamMetrics {
    /// Build the engine's instruments and register them with `registry`.
    #[must_use]
    pub fn new(registry: &Registry, enabled: bool) -> Self {
        let subscriptions = IntGauge::new(
            "mirror_stream_active_subscriptions",
            "Number of open topic message subscriptions",
        )
        .expect("statically valid metric options");

        let messages = IntCounterVec::new(
            Opts::new("mirror_stream_messages_total", "Topic messages delivered to subscribers"),
            &["topic"],
        )
        .expect("statically valid metric options");

        let latency = Histogram::with_opts(HistogramOpts::new(
            "mirror_stream_message_latency_seconds",
            "Delay between a message reaching consensus and its delivery",
        ))
        .expect("statically valid metric options");

        let duration = Histogram::with_opts(HistogramOpts::new(
            "mirror_stream_subscription_duration_seconds",
            "Lifetime of completed subscriptions",
        ))
        .expect("statically valid metric options");

        let completions = IntCounterVec::new(
            Opts::new(
                "mirror_stream_subscriptions_completed_total",
                "Completed subscriptions by status",
            ),
            &["status"],
        )
        .expect("statically valid metric options");

        if enabled {
            try_register(registry, Box::new(subscriptions.clone()));
            try_register(registry, Box::new(messages.clone()));
            try_register(registry, Box::new(latency.clone()));
            try_register(registry, Box::new(duration.clone()));
            try_register(registry, Box::new(completions.clone()));
        }

        Self { enabled, subscriptions, messages, latency, duration, completions }
    }
}

fn try_register(registry: &Registry, collector: Box<dyn Collector>) {
    if let Err(error) = registry.register(collector) {
        log::warn!("failed to register metric: {error}");
    }
}

/// Per-subscription accounting, finalized exactly once.
///
/// The pipeline records deliveries and the terminal status; if the stream is
/// dropped mid-flight instead, [`SubscriptionMonitor::cancel`] records the
/// cancellation.
pub struct SubscriptionMonitor {
    metrics: Arc<StreamMetrics>,
    topic: String,
    subscriber_id: u64,
    started: Instant,
    responses: AtomicU64,
    finished: AtomicBool,
}

impl SubscriptionMonitor {
    /// Start accounting for one subscription.
    pub(crate) fn new(metrics: Arc<StreamMetrics>, filter: &TopicMessageFilter) -> Self {
        if metrics.enabled {
            metrics.subscriptions.inc();
        }

        let topic =
            filter.get_topic_id().map(|it| it.to_string()).unwrap_or_else(|| "unknown".to_owned());

        Self {
            metrics,
            topic,
            subscriber_id: filter.get_subscriber_id(),
            started: Instant::now(),
            responses: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// The number of messages delivered so far.
    #[must_use]
    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    pub(crate) fn on_message(&self, message: &TopicMessage) {
        self.responses.fetch_add(1, Ordering::Relaxed);

        if !self.metrics.enabled {
            return;
        }

        self.metrics.messages.with_label_values(&[&self.topic]).inc();

        let now = OffsetDateTime::now_utc().unix_timestamp_nanos() as i64;
        let latency = now - message.consensus_timestamp;
        if latency >= 0 {
            self.metrics.latency.observe(latency as f64 / 1e9);
        }
    }

    pub(crate) fn finish(&self, outcome: Option<&Error>) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }

        if !self.metrics.enabled {
            return;
        }

        self.metrics.subscriptions.dec();
        self.metrics.duration.observe(self.started.elapsed().as_secs_f64());

        let status = match outcome {
            None => "Ok".to_owned(),
            Some(error) => format!("{:?}", error.grpc_code()),
        };
        self.metrics.completions.with_label_values(&[&status]).inc();

        log::info!(
            "subscriber {} to topic {} completed ({status}) after {} messages in {:?}",
            self.subscriber_id,
            self.topic,
            self.responses(),
            self.started.elapsed(),
        );
    }

    pub(crate) fn cancel(&self) {
        self.finish(Some(&Error::Cancelled));
    }
}
