use crate::models::Label;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 64;

/// Something happened on the server that dependent views may need to reflect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// A classification was stored
    PredictionCreated { label: Label, language: String },
    /// A correction was stored for the displayed prediction
    FeedbackRecorded { predicted: Label, actual: Label },
}

/// Publish side of the dashboard event channel. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `event` to every current subscriber
    pub fn publish(&self, event: DashboardEvent) {
        debug!(?event, "publishing dashboard event");
        if self.sender.send(event).is_err() {
            debug!("no subscribers for dashboard event");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receive side held by one dependent view
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<DashboardEvent>,
}

impl Subscription {
    /// Drain everything queued and report whether a refresh is due.
    ///
    /// Several matching events collapse into one refresh. If the subscriber
    /// fell behind and events were dropped, a refresh is always due.
    pub fn take_refresh_signal(&mut self, interested: impl Fn(&DashboardEvent) -> bool) -> bool {
        let mut due = false;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => due |= interested(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard events dropped, forcing refresh");
                    due = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return due,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction() -> DashboardEvent {
        DashboardEvent::PredictionCreated {
            label: Label::Offensive,
            language: "en".to_string(),
        }
    }

    fn feedback() -> DashboardEvent {
        DashboardEvent::FeedbackRecorded {
            predicted: Label::Offensive,
            actual: Label::Hate,
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = EventBus::default();
        bus.publish(prediction());
    }

    #[test]
    fn test_matching_events_collapse_into_one_signal() {
        let bus = EventBus::default();
        let mut subscription = bus.subscribe();
        bus.publish(prediction());
        bus.publish(prediction());

        assert!(subscription.take_refresh_signal(|_| true));
        assert!(!subscription.take_refresh_signal(|_| true));
    }

    #[test]
    fn test_uninteresting_events_are_drained() {
        let bus = EventBus::default();
        let mut subscription = bus.subscribe();
        bus.publish(feedback());

        let only_predictions = |e: &DashboardEvent| matches!(e, DashboardEvent::PredictionCreated { .. });
        assert!(!subscription.take_refresh_signal(only_predictions));
        bus.publish(prediction());
        assert!(subscription.take_refresh_signal(only_predictions));
    }

    #[test]
    fn test_each_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish(feedback());

        assert!(first.take_refresh_signal(|_| true));
        assert!(second.take_refresh_signal(|_| true));
    }

    #[test]
    fn test_lagging_subscriber_is_forced_to_refresh() {
        let bus = EventBus::new(1);
        let mut subscription = bus.subscribe();
        bus.publish(feedback());
        bus.publish(feedback());
        bus.publish(feedback());

        assert!(subscription.take_refresh_signal(|_| false));
    }
}
