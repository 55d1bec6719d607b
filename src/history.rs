use crate::client::DashboardDataClient;
use crate::error::ClientError;
use crate::events::DashboardEvent;
use crate::models::{ClassCounts, HistoryPage, HistoryRow};
use tracing::{debug, warn};

/// Handle for one history fetch. Only the most recently issued one is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    page: u32,
}

impl LoadTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Paginated prediction history.
///
/// The displayed page is replaced wholesale by each successful fetch. While a
/// fetch is in flight, or after one failed, the previous rows stay visible.
#[derive(Debug)]
pub struct HistoryViewModel {
    page: Option<HistoryPage>,
    page_size: u32,
    loading: bool,
    /// Page the newest fetch is for
    pending_page: Option<u32>,
    stale: bool,
    last_error: Option<ClientError>,
    generation: u64,
}

impl HistoryViewModel {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: None,
            page_size: page_size.max(1),
            loading: false,
            pending_page: None,
            stale: false,
            last_error: None,
            generation: 0,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page(&self) -> Option<&HistoryPage> {
        self.page.as_ref()
    }

    pub fn rows(&self) -> &[HistoryRow] {
        self.page.as_ref().map(|p| p.rows.as_slice()).unwrap_or(&[])
    }

    pub fn current_page(&self) -> u32 {
        self.page.as_ref().map(|p| p.current_page).unwrap_or(1)
    }

    pub fn total_pages(&self) -> u32 {
        self.page.as_ref().map(|p| p.total_pages).unwrap_or(1)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True when the rows shown are older than the last attempted fetch
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn has_next(&self) -> bool {
        !self.loading && self.page.as_ref().is_some_and(|p| p.has_next())
    }

    pub fn has_prev(&self) -> bool {
        !self.loading && self.page.as_ref().is_some_and(|p| p.has_prev())
    }

    /// New predictions change what the history lists
    pub fn wants_refresh(event: &DashboardEvent) -> bool {
        matches!(event, DashboardEvent::PredictionCreated { .. })
    }

    /// Start fetching `page`, superseding any fetch in flight. Pages outside
    /// the known range are refused.
    pub fn begin_load(&mut self, page: u32) -> Option<LoadTicket> {
        if page == 0 {
            return None;
        }
        if self.page.is_some() && page > self.total_pages() {
            return None;
        }

        self.generation += 1;
        self.loading = true;
        self.pending_page = Some(page);
        debug!(page, generation = self.generation, "history load started");
        Some(LoadTicket {
            generation: self.generation,
            page,
        })
    }

    pub fn next(&mut self) -> Option<LoadTicket> {
        if !self.has_next() {
            return None;
        }
        self.begin_load(self.current_page() + 1)
    }

    pub fn prev(&mut self) -> Option<LoadTicket> {
        if !self.has_prev() {
            return None;
        }
        self.begin_load(self.current_page() - 1)
    }

    /// Re-fetch the page currently shown, or the one being navigated to
    pub fn refresh(&mut self) -> LoadTicket {
        let page = self.pending_page.unwrap_or_else(|| self.current_page());
        self.generation += 1;
        self.loading = true;
        self.pending_page = Some(page);
        LoadTicket {
            generation: self.generation,
            page,
        }
    }

    /// Apply a fetch result. Returns false if a newer fetch superseded it.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<HistoryPage, ClientError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(page = ticket.page, "discarding superseded history response");
            return false;
        }
        self.loading = false;
        self.pending_page = None;

        match outcome {
            Ok(page) => {
                self.page = Some(page);
                self.stale = false;
                self.last_error = None;
            }
            Err(err) => {
                warn!(page = ticket.page, error = %err, "history fetch failed, keeping last page");
                self.stale = true;
                self.last_error = Some(err);
            }
        }
        true
    }

    /// Fetch `page` and wait for it. A failed fetch is returned as well as
    /// recorded, so one-shot callers can report it.
    pub async fn load(&mut self, client: &DashboardDataClient, page: u32) -> Result<(), ClientError> {
        let Some(ticket) = self.begin_load(page) else {
            return Err(ClientError::Validation(format!(
                "page {} is out of range, history has {} page(s)",
                page,
                self.total_pages()
            )));
        };
        let outcome = client.fetch_history(ticket.page(), self.page_size).await;
        self.complete_load(ticket, outcome.clone());
        outcome.map(|_| ())
    }

    /// Label counts over the rows on screen
    pub fn class_breakdown(&self) -> ClassCounts {
        let mut counts = ClassCounts::default();
        for row in self.rows() {
            counts.increment(row.result);
        }
        counts
    }
}
