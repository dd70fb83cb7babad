/// Crawl state definitions for one source's pagination loop
///
/// This module defines the states a crawl controller moves through while it
/// walks a source page by page, and which moves between them are legal.
use std::fmt;

/// Represents the current position of a controller in its crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Requesting the page that starts at `cursor`
    Querying { cursor: u64 },

    /// A page starting at `cursor` arrived with `items` summaries
    PageFetched { cursor: u64, items: usize },

    /// Handling summary `index` of a page holding `len` summaries
    Processing { index: usize, len: usize },

    /// Staged records were appended and the checkpoint now points at `cursor`
    PagePersisted { cursor: u64 },

    /// No more pages to request
    Done,
}

impl CrawlState {
    /// The state a controller starts in when resuming from `cursor`
    pub fn start(cursor: u64) -> Self {
        Self::Querying { cursor }
    }

    /// Returns true once the crawl loop has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true at the only point where durable state is consistent
    ///
    /// A clean shutdown may only happen here, between persisting one page and
    /// querying the next.
    pub fn is_page_boundary(&self) -> bool {
        matches!(self, Self::PagePersisted { .. })
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: &CrawlState) -> bool {
        match (*self, *next) {
            // The same query may be re-issued after a failed request
            (Self::Querying { cursor: a }, Self::Querying { cursor: b }) => a == b,
            (Self::Querying { cursor: a }, Self::PageFetched { cursor: b, .. }) => a == b,

            (Self::PageFetched { items: 0, .. }, Self::Done) => true,
            (Self::PageFetched { items, .. }, Self::Processing { index: 0, len }) => {
                items > 0 && items == len
            }

            (
                Self::Processing { index, len },
                Self::Processing {
                    index: next_index,
                    len: next_len,
                },
            ) => len == next_len && next_index == index + 1 && next_index < len,
            (Self::Processing { index, len }, Self::PagePersisted { .. }) => index + 1 == len,

            // The cursor never moves backwards
            (Self::PagePersisted { cursor: a }, Self::Querying { cursor: b }) => a == b,
            (Self::PagePersisted { .. }, Self::Done) => true,

            _ => false,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Querying { cursor } => write!(f, "querying(cursor={})", cursor),
            Self::PageFetched { cursor, items } => {
                write!(f, "page_fetched(cursor={}, items={})", cursor, items)
            }
            Self::Processing { index, len } => write!(f, "processing({}/{})", index, len),
            Self::PagePersisted { cursor } => write!(f, "page_persisted(cursor={})", cursor),
            Self::Done => write!(f, "done"),
        }
    }
}
