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

use async_stream::stream;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_core::future::BoxFuture;
use futures_core::Stream;
use tokio::time::sleep;

use crate::{
    Error,
    StreamConfig,
    TopicMessage,
    TopicMessageFilter,
};

/// Pages committed topic messages out of durable storage.
///
/// One call is one page: implementations borrow a connection, execute a single
/// `SELECT` ordered ascending by consensus timestamp, and release the
/// connection before returning. The filter's `start_time` is the page cursor
/// (inclusive) and `end_time`, when set, is exclusive; the filter's `limit` is
/// already folded into `page_size` by the caller.
///
/// Transient failures should be reported as [`Error::StorageUnavailable`];
/// anything else is treated as fatal.
pub trait MessagePager: Send + Sync + 'static {
    /// Fetch the next page of messages matching `filter`, at most `page_size` of them.
    ///
    /// `throttled` is `false` only for latency-sensitive gap backfills.
    fn page(
        &self,
        filter: &TopicMessageFilter,
        page_size: usize,
        throttled: bool,
    ) -> BoxFuture<'_, crate::Result<Vec<TopicMessage>>>;
}

/// Stream every stored message matching `filter`, in consensus timestamp order.
///
/// The stream is finite: it ends after a short page, or once `filter.limit`
/// messages have been produced. When `throttled`, the drain pauses between
/// full pages to leave the storage tier headroom.
pub(crate) fn retrieve<P>(
    pager: Arc<P>,
    filter: TopicMessageFilter,
    config: &StreamConfig,
    throttled: bool,
) -> impl Stream<Item = crate::Result<TopicMessage>> + Send + 'static
where
    P: MessagePager + ?Sized,
{
    let max_page_size = config.max_page_size;
    let throttle = config.retrieve_throttle;
    let retry_max_attempts = config.retry_max_attempts;
    let retry_max_elapsed = config.retry_max_elapsed;

    stream! {
        let mut remaining = filter.get_limit();
        let mut cursor = filter.get_start_time();

        loop {
            let page_size = match remaining {
                0 => max_page_size,
                n => max_page_size.min(usize::try_from(n).unwrap_or(usize::MAX)),
            };

            let page_filter = filter.starting_at(cursor);
            let page = fetch_page(
                pager.as_ref(),
                &page_filter,
                page_size,
                throttled,
                retry_max_attempts,
                retry_max_elapsed,
            )
            .await;

            let page = match page {
                Ok(it) => it,
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };

            let full = page.len() >= page_size;

            for message in page {
                cursor = message.consensus_timestamp + 1;
                yield Ok(message);

                if remaining > 0 {
                    remaining -= 1;
                    if remaining == 0 {
                        return;
                    }
                }
            }

            if !full {
                return;
            }

            if throttled && !throttle.is_zero() {
                sleep(throttle).await;
            }
        }
    }
}

/// Fetch one storage page, retrying while the failure is transient.
///
/// Anything other than [`Error::StorageUnavailable`] is fatal and returned
/// as-is. Transient failures are retried with exponential backoff until
/// either `max_attempts` pages have been tried or the `max_elapsed` backoff
/// budget runs out, whichever comes first; exhaustion surfaces the last
/// transient error wrapped in [`Error::TimedOut`]. An attempt budget of zero
/// still tries the page once.
async fn fetch_page<P>(
    pager: &P,
    filter: &TopicMessageFilter,
    page_size: usize,
    throttled: bool,
    max_attempts: usize,
    max_elapsed: Duration,
) -> crate::Result<Vec<TopicMessage>>
where
    P: MessagePager + ?Sized,
{
    let mut backoff =
        ExponentialBackoff { max_elapsed_time: Some(max_elapsed), ..ExponentialBackoff::default() };

    let mut attempt = 0;
    loop {
        attempt += 1;

        let error = match pager.page(filter, page_size, throttled).await {
            Ok(page) => return Ok(page),
            Err(error @ Error::StorageUnavailable(_)) => error,
            Err(error) => return Err(error),
        };

        if attempt >= max_attempts.max(1) {
            return Err(Error::TimedOut(error.into()));
        }

        match backoff.next_backoff() {
            Some(pause) => {
                log::warn!(
                    "attempt {attempt} to page topic messages failed, retrying in {}ms: {error}",
                    pause.as_millis()
                );
                sleep(pause).await;
            }
            None => return Err(Error::TimedOut(error.into())),
        }
    }
}
