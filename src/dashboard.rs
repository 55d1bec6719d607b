use crate::analytics::{AnalyticsViewModel, FetchTicket};
use crate::client::DashboardDataClient;
use crate::controller::{
    ClassifyTicket, FeedbackTicket, PredictionInteractionController, SubmitRejected,
};
use crate::error::ClientError;
use crate::events::{EventBus, Subscription};
use crate::history::{HistoryViewModel, LoadTicket};
use crate::models::{AnalyticsSummary, HistoryPage, Label, PredictionResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Response of a background request, routed back to its owner
#[derive(Debug)]
enum Completion {
    Classify(ClassifyTicket, Result<PredictionResult, ClientError>),
    Feedback(FeedbackTicket, Result<(), ClientError>),
    History(LoadTicket, Result<HistoryPage, ClientError>),
    Analytics(FetchTicket, Result<AnalyticsSummary, ClientError>),
}

/// Which part of the dashboard a completion changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Prediction,
    History,
    Analytics,
}

/// Wires the prediction controller and the two dependent views to one
/// client.
///
/// The views learn about server-side changes only through the event bus.
/// Every request runs as a background task whose completion is applied on
/// the next [`Dashboard::pump`] or [`Dashboard::settle`], so paging or
/// refreshing stays possible while a classification is loading. A
/// completion that arrives after the dashboard is gone has nowhere to go and
/// is dropped.
pub struct Dashboard {
    client: Arc<DashboardDataClient>,
    controller: PredictionInteractionController,
    history: HistoryViewModel,
    analytics: AnalyticsViewModel,
    history_events: Subscription,
    analytics_events: Subscription,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: Vec<JoinHandle<()>>,
}

impl Dashboard {
    pub fn new(client: DashboardDataClient, page_size: u32) -> Self {
        let bus = EventBus::default();
        let history_events = bus.subscribe();
        let analytics_events = bus.subscribe();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            client: Arc::new(client),
            controller: PredictionInteractionController::new(bus),
            history: HistoryViewModel::new(page_size),
            analytics: AnalyticsViewModel::new(),
            history_events,
            analytics_events,
            completions_tx,
            completions_rx,
            in_flight: Vec::new(),
        }
    }

    pub fn controller(&self) -> &PredictionInteractionController {
        &self.controller
    }

    pub fn history(&self) -> &HistoryViewModel {
        &self.history
    }

    pub fn analytics(&self) -> &AnalyticsViewModel {
        &self.analytics
    }

    /// Initial fetch of both views
    pub fn start(&mut self) {
        if let Some(ticket) = self.history.begin_load(1) {
            self.spawn_history(ticket);
        }
        let ticket = self.analytics.begin_refresh();
        self.spawn_analytics(ticket);
    }

    /// Start classifying `text`. Dependent views refresh once the result
    /// has been applied.
    pub fn analyze(&mut self, text: &str) -> Result<(), SubmitRejected> {
        let ticket = self.controller.submit(text)?;
        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        self.in_flight.push(tokio::spawn(async move {
            let outcome = client.classify(ticket.text()).await;
            if tx.send(Completion::Classify(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping classification");
            }
        }));
        Ok(())
    }

    pub fn close_result(&mut self) {
        self.controller.close();
    }

    pub fn open_feedback(&mut self) -> bool {
        self.controller.open_feedback()
    }

    pub fn cancel_feedback(&mut self) {
        self.controller.cancel_feedback();
    }

    /// Start sending a correction. False when no prompt is open or a
    /// correction is already on its way.
    pub fn submit_feedback(&mut self, label: Label) -> bool {
        let Some(ticket) = self.controller.begin_feedback(label) else {
            return false;
        };
        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        self.in_flight.push(tokio::spawn(async move {
            let outcome = client
                .submit_feedback(ticket.text(), ticket.language(), ticket.label())
                .await;
            if tx.send(Completion::Feedback(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping feedback response");
            }
        }));
        true
    }

    pub fn next_page(&mut self) -> bool {
        match self.history.next() {
            Some(ticket) => {
                self.spawn_history(ticket);
                true
            }
            None => false,
        }
    }

    pub fn prev_page(&mut self) -> bool {
        match self.history.prev() {
            Some(ticket) => {
                self.spawn_history(ticket);
                true
            }
            None => false,
        }
    }

    pub fn refresh_analytics(&mut self) {
        let ticket = self.analytics.begin_refresh();
        self.spawn_analytics(ticket);
    }

    /// Turn queued events into background refreshes for the views that
    /// care about them
    fn dispatch_events(&mut self) {
        if self.history_events.take_refresh_signal(HistoryViewModel::wants_refresh) {
            let ticket = self.history.refresh();
            self.spawn_history(ticket);
        }
        if self
            .analytics_events
            .take_refresh_signal(AnalyticsViewModel::wants_refresh)
        {
            let ticket = self.analytics.begin_refresh();
            self.spawn_analytics(ticket);
        }
    }

    fn spawn_history(&mut self, ticket: LoadTicket) {
        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        let page_size = self.history.page_size();
        self.in_flight.push(tokio::spawn(async move {
            let outcome = client.fetch_history(ticket.page(), page_size).await;
            if tx.send(Completion::History(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping history response");
            }
        }));
    }

    fn spawn_analytics(&mut self, ticket: FetchTicket) {
        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        self.in_flight.push(tokio::spawn(async move {
            let outcome = client.fetch_analytics().await;
            if tx.send(Completion::Analytics(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping analytics response");
            }
        }));
    }

    /// Hand a completion to its owner. None when it was stale.
    fn apply(&mut self, completion: Completion) -> Option<Update> {
        let (applied, update) = match completion {
            Completion::Classify(ticket, outcome) => {
                let applied = self.controller.complete_classify(&ticket, outcome);
                self.dispatch_events();
                (applied, Update::Prediction)
            }
            Completion::Feedback(ticket, outcome) => {
                let applied = self.controller.complete_feedback(&ticket, outcome);
                self.dispatch_events();
                (applied, Update::Prediction)
            }
            Completion::History(ticket, outcome) => {
                (self.history.complete_load(ticket, outcome), Update::History)
            }
            Completion::Analytics(ticket, outcome) => {
                (self.analytics.complete_refresh(ticket, outcome), Update::Analytics)
            }
        };
        applied.then_some(update)
    }

    /// Apply whatever completions have arrived without waiting
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply(completion).is_some() {
                applied += 1;
            }
        }
        self.in_flight.retain(|handle| !handle.is_finished());
        applied
    }

    /// Wait for the next background completion and apply it. Pending forever
    /// when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Update> {
        let completion = self.completions_rx.recv().await?;
        let update = self.apply(completion);
        self.in_flight.retain(|handle| !handle.is_finished());
        update
    }

    /// Wait for every background request, including refreshes triggered by
    /// the ones that complete, and apply the results
    pub async fn settle(&mut self) {
        while !self.in_flight.is_empty() {
            for handle in std::mem::take(&mut self.in_flight) {
                if let Err(e) = handle.await {
                    warn!(error = %e, "background task failed");
                }
            }
            self.pump();
        }
    }
}
