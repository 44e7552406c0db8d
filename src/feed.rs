use crate::models::PendingStatus;

/// Events emitted after a state change has been committed. Observers never
/// see an event for a write that was rolled back.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    RecordSaved {
        transaction_id: i64,
        merchant: String,
        amount: f64,
    },
    RecordBlocked {
        rule_name: String,
        merchant: String,
    },
    PendingQueued {
        pending_id: i64,
        merchant: String,
        expires_at: String,
    },
    PendingResolved {
        pending_id: i64,
        status: PendingStatus,
    },
}

pub trait FeedListener {
    fn on_event(&self, event: &LedgerEvent);
}

impl<F: Fn(&LedgerEvent)> FeedListener for F {
    fn on_event(&self, event: &LedgerEvent) {
        self(event)
    }
}

/// Explicit subscribe/notify seam for the UI layer. Replaces reactive
/// storage observation: callers publish after commit, listeners run inline.
#[derive(Default)]
pub struct ChangeFeed {
    listeners: Vec<Box<dyn FeedListener>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn FeedListener>) {
        self.listeners.push(listener);
    }

    pub fn publish(&self, event: &LedgerEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_reaches_all_listeners() {
        let seen_a: Rc<RefCell<Vec<String>>> = Rc::default();
        let seen_b: Rc<RefCell<Vec<String>>> = Rc::default();
        let mut feed = ChangeFeed::new();
        let a = seen_a.clone();
        feed.subscribe(Box::new(move |e: &LedgerEvent| {
            a.borrow_mut().push(format!("{e:?}"));
        }));
        let b = seen_b.clone();
        feed.subscribe(Box::new(move |e: &LedgerEvent| {
            b.borrow_mut().push(format!("{e:?}"));
        }));

        feed.publish(&LedgerEvent::PendingResolved {
            pending_id: 7,
            status: PendingStatus::Rejected,
        });

        assert_eq!(seen_a.borrow().len(), 1);
        assert_eq!(seen_b.borrow().len(), 1);
        assert!(seen_a.borrow()[0].contains("Rejected"));
    }

    #[test]
    fn test_empty_feed_is_a_no_op() {
        let feed = ChangeFeed::new();
        feed.publish(&LedgerEvent::RecordSaved {
            transaction_id: 1,
            merchant: "Amazon".to_string(),
            amount: 500.0,
        });
    }
}
