use crate::error::ClientError;
use crate::events::{DashboardEvent, EventBus};
use crate::models::{Label, PredictionResult};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub const FEEDBACK_CONFIRMATION: &str = "Feedback saved. Thank you!";

/// Where the prediction panel is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InteractionState {
    /// Nothing submitted yet, result hidden
    Idle,
    /// Classification request in flight
    Loading,
    Expanded,
    Collapsed,
    /// Correction prompt open over an expanded result
    FeedbackOpen,
}

/// The displayed classification together with the text that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultState {
    pub text: String,
    pub prediction: PredictionResult,
}

/// Why a submit did not start a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("text is blank")]
    Blank,
    #[error("a classification is already in progress")]
    InFlight,
    #[error("close the feedback prompt before analyzing new text")]
    FeedbackOpen,
}

/// Handle for one classify request. Completions with a stale ticket are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyTicket {
    id: u64,
    text: String,
}

impl ClassifyTicket {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackTicket {
    id: u64,
    text: String,
    language: String,
    /// Label shown when the correction was sent
    predicted: Label,
    label: Label,
}

impl FeedbackTicket {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn label(&self) -> Label {
        self.label
    }
}

/// Owns the current result and drives
/// Idle → Loading → Expanded ⇄ FeedbackOpen, Expanded → Collapsed.
///
/// Every request is split into a synchronous `submit`/`begin` step that
/// updates state and hands out a ticket, and a `complete` step that applies
/// the response. Server-mutating successes are announced on the event bus.
#[derive(Debug)]
pub struct PredictionInteractionController {
    state: InteractionState,
    /// State to fall back to when the in-flight classification fails
    resume_state: InteractionState,
    result: Option<ResultState>,
    last_error: Option<ClientError>,
    confirmation: Option<String>,
    next_ticket: u64,
    classify_in_flight: Option<u64>,
    feedback_in_flight: Option<u64>,
    events: EventBus,
}

impl PredictionInteractionController {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: InteractionState::Idle,
            resume_state: InteractionState::Idle,
            result: None,
            last_error: None,
            confirmation: None,
            next_ticket: 0,
            classify_in_flight: None,
            feedback_in_flight: None,
            events,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn result(&self) -> Option<&ResultState> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn confirmation(&self) -> Option<&str> {
        self.confirmation.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state == InteractionState::Loading
    }

    pub fn is_feedback_pending(&self) -> bool {
        self.feedback_in_flight.is_some()
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Start classifying `text`. Blank text, a request already in flight, or
    /// an open feedback prompt leave the state untouched.
    pub fn submit(&mut self, text: &str) -> Result<ClassifyTicket, SubmitRejected> {
        match self.state {
            InteractionState::Loading => return Err(SubmitRejected::InFlight),
            InteractionState::FeedbackOpen => return Err(SubmitRejected::FeedbackOpen),
            InteractionState::Idle | InteractionState::Expanded | InteractionState::Collapsed => {}
        }
        if text.trim().is_empty() {
            return Err(SubmitRejected::Blank);
        }

        let id = self.issue_ticket();
        self.resume_state = self.state;
        self.state = InteractionState::Loading;
        self.classify_in_flight = Some(id);
        self.last_error = None;
        self.confirmation = None;
        info!(ticket = id, "classification started");

        Ok(ClassifyTicket {
            id,
            text: text.to_string(),
        })
    }

    /// Apply the classify response. Returns false if the ticket was stale.
    pub fn complete_classify(
        &mut self,
        ticket: &ClassifyTicket,
        outcome: Result<PredictionResult, ClientError>,
    ) -> bool {
        if self.classify_in_flight != Some(ticket.id) {
            warn!(ticket = ticket.id, "discarding stale classification response");
            return false;
        }
        self.classify_in_flight = None;

        match outcome {
            Ok(mut prediction) => {
                prediction.expanded = true;
                info!(label = %prediction.label, language = %prediction.language, "classification shown");
                let event = DashboardEvent::PredictionCreated {
                    label: prediction.label,
                    language: prediction.language.clone(),
                };
                self.result = Some(ResultState {
                    text: ticket.text.clone(),
                    prediction,
                });
                self.state = InteractionState::Expanded;
                self.events.publish(event);
            }
            Err(err) => {
                warn!(error = %err, "classification failed, keeping previous result");
                self.state = self.resume_state;
                self.last_error = Some(err);
            }
        }
        true
    }

    /// Collapse the expanded result. Idempotent.
    pub fn close(&mut self) {
        if self.state != InteractionState::Expanded {
            return;
        }
        if let Some(result) = self.result.as_mut() {
            result.prediction.expanded = false;
        }
        self.state = InteractionState::Collapsed;
    }

    /// Open the correction prompt. Only an expanded result can be corrected.
    pub fn open_feedback(&mut self) -> bool {
        if self.state != InteractionState::Expanded {
            return false;
        }
        self.state = InteractionState::FeedbackOpen;
        self.confirmation = None;
        true
    }

    pub fn cancel_feedback(&mut self) {
        if self.state == InteractionState::FeedbackOpen {
            self.state = InteractionState::Expanded;
        }
    }

    /// Start sending the correction `label` for the displayed result
    pub fn begin_feedback(&mut self, label: Label) -> Option<FeedbackTicket> {
        if self.state != InteractionState::FeedbackOpen || self.feedback_in_flight.is_some() {
            return None;
        }
        let result = self.result.as_ref()?;
        let (text, language, predicted) = (
            result.text.clone(),
            result.prediction.language.clone(),
            result.prediction.label,
        );

        let id = self.issue_ticket();
        self.feedback_in_flight = Some(id);
        self.last_error = None;
        Some(FeedbackTicket {
            id,
            text,
            language,
            predicted,
            label,
        })
    }

    /// Apply the feedback response. Success closes the prompt; failure keeps
    /// it open for a retry.
    pub fn complete_feedback(
        &mut self,
        ticket: &FeedbackTicket,
        outcome: Result<(), ClientError>,
    ) -> bool {
        if self.feedback_in_flight != Some(ticket.id) {
            warn!(ticket = ticket.id, "discarding stale feedback response");
            return false;
        }
        self.feedback_in_flight = None;

        match outcome {
            Ok(()) => {
                info!(label = %ticket.label, "feedback recorded");
                if self.state == InteractionState::FeedbackOpen {
                    self.state = InteractionState::Expanded;
                }
                self.confirmation = Some(FEEDBACK_CONFIRMATION.to_string());
                self.events.publish(DashboardEvent::FeedbackRecorded {
                    predicted: ticket.predicted,
                    actual: ticket.label,
                });
            }
            Err(err) => {
                warn!(error = %err, "feedback failed");
                self.last_error = Some(err);
            }
        }
        true
    }
}
