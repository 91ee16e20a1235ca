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

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures_util::StreamExt;
use prometheus::Registry;
use tokio::time::timeout;

use crate::entity_id::EntityType;
use crate::mock::{
    self,
    MockLedger,
};
use crate::subscription::EntityLookup;
use crate::{
    Error,
    MessagePager,
    StreamConfig,
    TopicMessageBus,
    TopicMessageFilter,
    TopicMessageService,
    TopicMessageStream,
};

const TOPIC: u64 = 100;

fn config() -> StreamConfig {
    StreamConfig {
        retrieve_throttle: Duration::ZERO,
        retry_max_elapsed: Duration::from_millis(50),
        ..StreamConfig::default()
    }
}

fn service(ledger: &Arc<MockLedger>, config: StreamConfig) -> TopicMessageService {
    let _ = env_logger::builder().is_test(true).try_init();

    let entities: Arc<dyn EntityLookup> = Arc::clone(ledger) as Arc<dyn EntityLookup>;

    TopicMessageService::new(
        config,
        entities,
        Arc::clone(ledger) as Arc<dyn MessagePager>,
        TopicMessageBus::new(),
        &Registry::new(),
    )
}

fn topic_ledger() -> Arc<MockLedger> {
    let ledger = Arc::new(MockLedger::new());
    ledger.insert_entity(TOPIC, EntityType::Topic);
    ledger
}

fn filter() -> TopicMessageFilter {
    let mut filter = TopicMessageFilter::new();
    filter.topic_id(TOPIC).start_time(0);
    filter
}

async fn next_sequence(stream: &mut TopicMessageStream) -> u64 {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream made no progress")
        .expect("stream ended early")
        .expect("stream errored")
        .sequence_number
}

async fn expect_open(stream: &mut TopicMessageStream) {
    assert_matches!(timeout(Duration::from_millis(50), stream.next()).await, Err(_));
}

// storage empty and the end time already in the past: complete with nothing
#[tokio::test]
async fn historical_only_past_end_time() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let mut filter = filter();
    filter.end_time(1);

    let received: Vec<_> = service.subscribe(filter).await.unwrap().collect().await;

    assert!(received.is_empty());
}

#[tokio::test]
async fn historical_three_no_end_stays_open() {
    let ledger = topic_ledger();
    for sequence in 1..=3 {
        ledger.insert_message(TOPIC, sequence, sequence as i64 * 10);
    }
    let service = service(&ledger, config());

    let mut stream = service.subscribe(filter()).await.unwrap();

    for expected in 1..=3 {
        assert_eq!(next_sequence(&mut stream).await, expected);
    }

    expect_open(&mut stream).await;
    assert_eq!(stream.responses(), 3);
}

// a one-row page size still drains everything below the end time
#[tokio::test]
async fn historical_paged_excludes_end_time() {
    let ledger = topic_ledger();
    for sequence in 1..=4 {
        ledger.insert_message(TOPIC, sequence, sequence as i64 * 10);
    }
    let service = service(&ledger, StreamConfig { max_page_size: 1, ..config() });

    let mut filter = filter();
    filter.end_time(40);

    let received: Vec<_> =
        service.subscribe(filter).await.unwrap().map(|it| it.unwrap().sequence_number).collect().await;

    assert_eq!(received, [1, 2, 3]);
}

#[tokio::test]
async fn duplicates_are_dropped_at_the_seam() {
    let ledger = topic_ledger();
    // storage hands back seq 1 three times across the drain
    ledger.insert_message(TOPIC, 1, 10);
    ledger.insert_message(TOPIC, 1, 11);
    ledger.insert_message(TOPIC, 2, 12);
    ledger.insert_message(TOPIC, 1, 13);

    let service = service(&ledger, config());
    let stream = service.subscribe(filter()).await.unwrap();

    // with the bus gone the live phase ends immediately after the drain
    drop(service);

    let received: Vec<_> = stream.map(|it| it.unwrap().sequence_number).collect().await;

    assert_eq!(received, [1, 2]);
}

#[tokio::test]
async fn live_gap_is_backfilled_from_storage() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let mut stream = service.subscribe(filter()).await.unwrap();

    service.bus().publish(&mock::message(TOPIC, 1, 10));
    assert_eq!(next_sequence(&mut stream).await, 1);

    // seq 2 and 3 commit to storage but their publish is lost
    ledger.insert_message(TOPIC, 2, 20);
    ledger.insert_message(TOPIC, 3, 30);
    service.bus().publish(&mock::message(TOPIC, 4, 40));

    assert_eq!(next_sequence(&mut stream).await, 2);
    assert_eq!(next_sequence(&mut stream).await, 3);
    assert_eq!(next_sequence(&mut stream).await, 4);

    expect_open(&mut stream).await;
}

#[tokio::test]
async fn unreconciled_gap_is_fatal() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let mut stream = service.subscribe(filter()).await.unwrap();

    for sequence in 1..=4 {
        service.bus().publish(&mock::message(TOPIC, sequence, sequence as i64 * 10));
        assert_eq!(next_sequence(&mut stream).await, sequence);
    }

    // the backfill window only recovers 5 and 6; 7 is nowhere to be found
    ledger.insert_message(TOPIC, 5, 50);
    ledger.insert_message(TOPIC, 6, 60);
    service.bus().publish(&mock::message(TOPIC, 8, 80));

    assert_eq!(next_sequence(&mut stream).await, 5);
    assert_eq!(next_sequence(&mut stream).await, 6);

    let error = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream made no progress")
        .expect("stream ended early")
        .unwrap_err();

    assert_matches!(error, Error::MissingMessages { expected: 7, found: None });
    assert_eq!(error.grpc_code(), tonic::Code::Internal);
    assert_matches!(stream.next().await, None);
}

#[tokio::test]
async fn unknown_topic_fails_when_checked() {
    let ledger = Arc::new(MockLedger::new());
    let service = service(&ledger, config());

    let mut filter = TopicMessageFilter::new();
    filter.topic_id(999);

    assert_matches!(service.subscribe(filter).await, Err(Error::TopicNotFound(_)));
}

#[tokio::test]
async fn wrong_entity_type_fails_when_checked() {
    let ledger = Arc::new(MockLedger::new());
    ledger.insert_entity(999, EntityType::Account);
    let service = service(&ledger, config());

    let mut filter = TopicMessageFilter::new();
    filter.topic_id(999);

    assert_matches!(service.subscribe(filter).await, Err(Error::InvalidTopic(_)));
}

#[tokio::test]
async fn unknown_topic_opens_empty_when_unchecked() {
    let ledger = Arc::new(MockLedger::new());
    let service = service(&ledger, StreamConfig { check_topic_exists: false, ..config() });

    let mut filter = TopicMessageFilter::new();
    filter.topic_id(999);

    let mut stream = service.subscribe(filter).await.unwrap();

    expect_open(&mut stream).await;
    assert_eq!(stream.responses(), 0);
}

#[tokio::test]
async fn validation_runs_before_any_io() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let error = service.subscribe(TopicMessageFilter::new()).await.unwrap_err();

    assert_matches!(&error, Error::InvalidArgument(message) if message.as_str() == "topicId must not be null");
    assert_eq!(ledger.page_calls(), 0);
}

#[tokio::test]
async fn limit_completes_the_stream() {
    let ledger = topic_ledger();
    for sequence in 1..=5 {
        ledger.insert_message(TOPIC, sequence, sequence as i64 * 10);
    }
    let service = service(&ledger, config());

    let mut filter = filter();
    filter.limit(2);

    let received: Vec<_> =
        service.subscribe(filter).await.unwrap().map(|it| it.unwrap().sequence_number).collect().await;

    assert_eq!(received, [1, 2]);
}

#[tokio::test]
async fn limit_spans_the_seam() {
    let ledger = topic_ledger();
    ledger.insert_message(TOPIC, 1, 10);
    let service = service(&ledger, config());

    let mut filter = filter();
    filter.limit(2);

    let mut stream = service.subscribe(filter).await.unwrap();
    service.bus().publish(&mock::message(TOPIC, 2, 20));
    service.bus().publish(&mock::message(TOPIC, 3, 30));

    assert_eq!(next_sequence(&mut stream).await, 1);
    assert_eq!(next_sequence(&mut stream).await, 2);
    assert_matches!(stream.next().await, None);
}

#[tokio::test]
async fn live_end_time_is_exclusive() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let mut filter = filter();
    let end = time::OffsetDateTime::now_utc().unix_timestamp_nanos() as i64 + 60_000_000_000;
    filter.end_time(end);

    let mut stream = service.subscribe(filter).await.unwrap();

    service.bus().publish(&mock::message(TOPIC, 1, 10));
    assert_eq!(next_sequence(&mut stream).await, 1);

    // a message at exactly the end time completes the stream without being delivered
    service.bus().publish(&mock::message(TOPIC, 2, end));
    assert_matches!(timeout(Duration::from_secs(1), stream.next()).await, Ok(None));
}

#[tokio::test]
async fn slow_subscriber_overflows() {
    let ledger = topic_ledger();
    let service = service(&ledger, StreamConfig { listener_buffer_size: 1, ..config() });

    let mut stream = service.subscribe(filter()).await.unwrap();

    // nothing is polled while three messages fan out into a one-slot queue
    for sequence in 1..=3 {
        service.bus().publish(&mock::message(TOPIC, sequence, sequence as i64 * 10));
    }

    assert_eq!(next_sequence(&mut stream).await, 1);

    let error = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream made no progress")
        .expect("stream ended early")
        .unwrap_err();

    assert_matches!(error, Error::BufferOverflow);
    assert_eq!(error.grpc_code(), tonic::Code::ResourceExhausted);
}

#[tokio::test]
async fn storage_failure_terminates_the_stream() {
    let ledger = topic_ledger();
    ledger.fail_fatal();
    let service = service(&ledger, config());

    let mut stream = service.subscribe(filter()).await.unwrap();

    assert_matches!(stream.next().await, Some(Err(Error::StorageInternal(_))));
    assert_matches!(stream.next().await, None);
}

#[tokio::test]
async fn dropping_the_stream_releases_the_listener() {
    let ledger = topic_ledger();
    let service = service(&ledger, config());

    let stream = service.subscribe(filter()).await.unwrap();
    assert_eq!(service.bus().subscriber_count(), 1);

    drop(stream);
    assert_eq!(service.bus().subscriber_count(), 0);
}

// a finite replay over quiesced storage is deterministic
#[tokio::test]
async fn replay_is_deterministic() -> anyhow::Result<()> {
    let ledger = topic_ledger();
    for sequence in 1..=6 {
        ledger.insert_message(TOPIC, sequence, sequence as i64 * 10);
    }
    let service = service(&ledger, config());

    let mut filter = filter();
    filter.end_time(55);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let received: Vec<_> = service
            .subscribe(filter.clone())
            .await?
            .map(|it| it.unwrap().sequence_number)
            .collect()
            .await;
        runs.push(received);
    }

    assert_eq!(runs[0], [1, 2, 3, 4, 5]);
    assert_eq!(runs[0], runs[1]);

    Ok(())
}
