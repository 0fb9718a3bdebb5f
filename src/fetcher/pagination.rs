//! Page-number pagination over Cloudflare list endpoints
//!
//! Pages are requested as `?page=N&per_page=L` starting from 1. The walk stops
//! after a page that carries no items or whose number reaches the reported
//! `total_pages`; a response without pagination metadata counts as the last page.
//!
//! Includes safety mechanisms:
//! - Maximum page cap to prevent infinite loops
//! - The first error ends the stream; items already yielded stay delivered

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

use crate::fetcher::client::ServicesClient;
use crate::fetcher::transport::Transport;
use crate::fetcher::{FetcherError, FetcherResult, ItemStream};

/// Maximum number of pages walked for a single endpoint
pub const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
struct PageCursor {
    next_page: u32,
    done: bool,
}

impl PageCursor {
    fn start() -> Self {
        Self {
            next_page: 1,
            done: false,
        }
    }

    fn finished(self) -> Self {
        Self { done: true, ..self }
    }
}

impl<T: Transport> ServicesClient<T> {
    /// Lazy stream of every item behind a paginated endpoint.
    ///
    /// Page N+1 is requested only after every item of page N has been consumed.
    /// Each page goes through the retry loop on its own; the first error is
    /// yielded once and ends the stream.
    pub fn items<'a, I>(&'a self, endpoint: impl Into<String>) -> ItemStream<'a, I>
    where
        I: DeserializeOwned + Send + 'a,
    {
        let endpoint = endpoint.into();
        let per_page = self.page_size();

        let stream = stream::unfold(PageCursor::start(), move |cursor| {
            let endpoint = endpoint.clone();

            async move {
                if cursor.done {
                    return None;
                }

                if cursor.next_page > MAX_PAGES {
                    let err = FetcherError::PageLimitExceeded {
                        endpoint,
                        max_pages: MAX_PAGES,
                    };
                    return Some((stream::iter(vec![Err(err)]), cursor.finished()));
                }

                match self.fetch_page::<I>(&endpoint, cursor.next_page, per_page).await {
                    Ok(response) => {
                        let page = cursor.next_page;
                        let total_pages = response.total_pages();
                        let items = response.result.unwrap_or_default();

                        debug!(
                            endpoint = %endpoint,
                            page,
                            total_pages,
                            items = items.len(),
                            "Fetched page"
                        );

                        let done = items.is_empty() || page >= total_pages;
                        let items: Vec<FetcherResult<I>> = items.into_iter().map(Ok).collect();
                        let next = PageCursor {
                            next_page: page + 1,
                            done,
                        };
                        Some((stream::iter(items), next))
                    }
                    Err(e) => Some((stream::iter(vec![Err(e)]), cursor.finished())),
                }
            }
        })
        .flatten();

        Box::pin(stream)
    }

    /// Invoke `on_item` for every item of a paginated endpoint, in order.
    ///
    /// Stops at the first fetch error or the first error returned by the callback.
    pub async fn for_each_item<I, E, F, Fut>(&self, endpoint: &str, mut on_item: F) -> Result<(), E>
    where
        I: DeserializeOwned + Send,
        E: From<FetcherError>,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut items = self.items::<I>(endpoint);
        while let Some(item) = items.next().await {
            on_item(item?).await?;
        }
        Ok(())
    }
}
