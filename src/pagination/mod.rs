//! Cursor pagination over `nextPageToken`.

use crate::errors::{BrowserResult, ResponseError};
use std::future::Future;
use std::marker::PhantomData;
use tracing::warn;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Entries on this page.
    pub items: Vec<T>,
    /// Cursor for the following page; absent or empty on the last one.
    pub next_page_token: Option<String>,
    /// Drive stopped before searching every corpus.
    pub incomplete: bool,
}

impl<T> Page<T> {
    /// A complete page.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
            incomplete: false,
        }
    }

    /// Marks the page as an incomplete search.
    pub fn incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// The cursor to continue from, ignoring empty tokens.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Drains a cursor-paginated listing.
///
/// `fetch` receives `None` for the first page and each page's token after
/// that. A token the server already handed out ends the walk with an error
/// instead of looping.
pub struct PageIterator<T, F, Fut>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = BrowserResult<Page<T>>>,
{
    fetch: F,
    cursor: Option<String>,
    seen: Vec<String>,
    finished: bool,
    pages: usize,
    _items: PhantomData<T>,
}

impl<T, F, Fut> PageIterator<T, F, Fut>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = BrowserResult<Page<T>>>,
{
    /// Starts before the first page.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            cursor: None,
            seen: Vec::new(),
            finished: false,
            pages: 0,
            _items: PhantomData,
        }
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> BrowserResult<Option<Page<T>>> {
        if self.finished {
            return Ok(None);
        }

        let page = (self.fetch)(self.cursor.take()).await?;
        self.pages += 1;

        match page.continuation() {
            Some(token) if self.seen.iter().any(|t| t == token) => {
                self.finished = true;
                return Err(ResponseError::UnexpectedFormat(format!(
                    "page token {} repeated after {} pages",
                    token, self.pages
                ))
                .into());
            }
            Some(token) => {
                self.seen.push(token.to_string());
                self.cursor = Some(token.to_string());
            }
            None => self.finished = true,
        }

        Ok(Some(page))
    }

    /// Concatenates the items of every remaining page.
    pub async fn collect_all(&mut self) -> BrowserResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            if page.incomplete {
                warn!(page = self.pages, "drive reported an incomplete search");
            }
            items.extend(page.items);
        }
        Ok(items)
    }

    /// Whether another page may follow.
    pub fn has_next(&self) -> bool {
        !self.finished
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BrowserError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_continuation_ignores_empty_token() {
        assert_eq!(Page::new(vec![1], Some("t".to_string())).continuation(), Some("t"));
        assert_eq!(Page::new(vec![1], Some(String::new())).continuation(), None);
        assert_eq!(Page::<u8>::new(vec![], None).continuation(), None);
    }

    #[tokio::test]
    async fn test_follows_tokens_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let mut pages = PageIterator::new(move |token: Option<String>| {
            recorder.lock().unwrap().push(token.clone());
            async move {
                Ok(match token.as_deref() {
                    None => Page::new(vec!["a", "b"], Some("t1".to_string())),
                    Some("t1") => Page::new(vec!["c"], Some("t2".to_string())),
                    _ => Page::new(vec!["d"], None),
                })
            }
        });

        assert_eq!(pages.collect_all().await.unwrap(), vec!["a", "b", "c", "d"]);
        assert!(!pages.has_next());
        assert_eq!(pages.pages_fetched(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_token_is_last_page() {
        let mut pages = PageIterator::new(|_token: Option<String>| async {
            Ok(Page::new(vec![1], Some(String::new())).incomplete(true))
        });
        assert_eq!(pages.collect_all().await.unwrap(), vec![1]);
        assert_eq!(pages.pages_fetched(), 1);
    }

    #[tokio::test]
    async fn test_repeated_token_stops() {
        let mut pages = PageIterator::new(|_token: Option<String>| async {
            Ok(Page::new(vec![1], Some("same".to_string())))
        });
        let result = pages.collect_all().await;
        assert!(matches!(result, Err(BrowserError::Response(_))));
        assert_eq!(pages.pages_fetched(), 2);
        assert!(!pages.has_next());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let mut pages = PageIterator::new(|token: Option<String>| async move {
            match token {
                None => Ok(Page::new(vec![1], Some("next".to_string()))),
                Some(_) => Err(BrowserError::server("backend error")),
            }
        });
        assert!(pages.collect_all().await.is_err());
    }
}
