//! Listing fetch lifecycle
//!
//! [`SearchSession`] owns the request/response cycle behind a listing view:
//! it re-runs the composed query whenever the filters or the page change and
//! publishes the resulting state over a watch channel for the presentation
//! layer to observe.
//!
//! Every fetch is tagged with a generation number. A fetch only publishes its
//! outcome while it is still the newest one, so a slow response can never
//! overwrite the result of a search triggered after it (last-write-wins).
//!
//! Query failures are logged with full detail for operators; the published
//! state carries only a generic retry-suggesting message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::model::Property;
use crate::query::{FilterSelection, PropertyQuery, SortSpec};
use crate::store::PropertyStore;

/// Shown when query execution fails; the underlying error stays in the logs.
pub const FETCH_FAILED_MESSAGE: &str = "We're experiencing some technical difficulties. \
    Our team has been notified and is working to resolve the issue. \
    Please try again in a few minutes.";

const NO_RESULTS_SEARCH: &str = "We couldn't find any properties matching your search \
    criteria. Try adjusting your filters or search terms to see more options.";

const NO_RESULTS_FEATURED: &str = "We're currently updating our featured properties. \
    Please check back soon for new listings.";

/// What kind of listing view this session feeds; decides the wording of the
/// empty-result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsContext {
    /// A search/browse view.
    Search,
    /// The curated "featured" rail.
    Featured,
}

impl ResultsContext {
    /// User-facing wording for a loaded page with zero items.
    pub fn no_results_message(&self) -> &'static str {
        match self {
            ResultsContext::Search => NO_RESULTS_SEARCH,
            ResultsContext::Featured => NO_RESULTS_FEATURED,
        }
    }
}

/// Observable state of the fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// No fetch has been requested yet.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The latest fetch succeeded.
    Loaded {
        items: Vec<Property>,
        total_count: usize,
        page: usize,
        total_pages: usize,
    },
    /// The latest fetch failed; `message` is safe to display.
    Failed { message: String },
}

struct CurrentRequest {
    selection: FilterSelection,
    sort: SortSpec,
    page: usize,
}

struct SessionInner {
    store: Arc<dyn PropertyStore>,
    context: ResultsContext,
    page_size: usize,
    generation: AtomicU64,
    request: Mutex<CurrentRequest>,
    state: watch::Sender<SearchState>,
    /// Serializes the stale-check-then-publish step of finished fetches.
    publish: Mutex<()>,
}

/// Drives listing fetches for one view.
///
/// Cheap to clone; clones share the same state channel.
#[derive(Clone)]
pub struct SearchSession {
    inner: Arc<SessionInner>,
}

impl SearchSession {
    pub fn new(store: Arc<dyn PropertyStore>, context: ResultsContext, page_size: usize) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);

        SearchSession {
            inner: Arc::new(SessionInner {
                store,
                context,
                page_size,
                generation: AtomicU64::new(0),
                request: Mutex::new(CurrentRequest {
                    selection: FilterSelection::default(),
                    sort: SortSpec::default(),
                    page: 1,
                }),
                state,
                publish: Mutex::new(()),
            }),
        }
    }

    /// Applies a new filter selection, resets to the first page, and fetches.
    pub fn search(&self, selection: FilterSelection, sort: SortSpec) {
        {
            let mut request = self.inner.request.lock().unwrap();
            request.selection = selection;
            request.sort = sort;
            request.page = 1;
        }
        self.spawn_fetch();
    }

    /// Moves to another page of the current selection and fetches.
    pub fn go_to_page(&self, page: usize) {
        {
            let mut request = self.inner.request.lock().unwrap();
            request.page = page.max(1);
        }
        self.spawn_fetch();
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Empty-result wording for this session's context.
    pub fn no_results_message(&self) -> &'static str {
        self.inner.context.no_results_message()
    }

    fn spawn_fetch(&self) {
        // Bump the generation first: anything still in flight is now stale.
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(SearchState::Loading);

        // Capture the query now; the request state may change again before
        // the fetch task runs.
        let query = {
            let request = self.inner.request.lock().unwrap();
            PropertyQuery::compose(
                &request.selection,
                request.sort,
                request.page,
                self.inner.page_size,
            )
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = inner.store.search(&query).await;

            let _guard = inner.publish.lock().unwrap();
            if inner.generation.load(Ordering::SeqCst) != generation {
                // A newer fetch superseded this one; drop the result.
                return;
            }

            let next = match outcome {
                Ok(page) => SearchState::Loaded {
                    items: page.items,
                    total_count: page.total_count,
                    page: page.page,
                    total_pages: page.total_pages,
                },
                Err(err) => {
                    tracing::error!(error = %err, "listing query failed");
                    SearchState::Failed {
                        message: FETCH_FAILED_MESSAGE.to_string(),
                    }
                }
            };
            inner.state.send_replace(next);
        });
    }
}
