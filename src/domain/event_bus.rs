//! Topic-based publish/subscribe bus for in-process signals.
//!
//! [`EventBus`] lets views that know nothing about each other ask for a
//! reload: the entry editor publishes [`LOGBOOK_RELOAD`] after a submit,
//! and the logbook tree and entry list subscribe to it. The server uses a
//! second instance to fan out entry and logbook signals to configured
//! actions.
//!
//! Delivery is synchronous, in registration order, and only reaches
//! callbacks registered when `publish` is called. There is no replay for
//! late subscribers and no delivery across processes.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard, Weak};

/// Topic published after an entry was written; payload is the
/// [`super::LogbookId`] whose views must refetch.
pub const LOGBOOK_RELOAD: &str = "logbook.reload";

/// A subscriber callback.
///
/// Identity is the `Arc` allocation: [`EventBus::unsubscribe`] only removes
/// a registration holding the very same `Arc`.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registration<T> {
    id: u64,
    callback: Callback<T>,
}

struct Topics<T> {
    next_id: u64,
    by_topic: HashMap<String, Vec<Registration<T>>>,
}

impl<T> Topics<T> {
    fn remove_id(&mut self, topic: &str, id: u64) -> bool {
        let Some(registrations) = self.by_topic.get_mut(topic) else {
            return false;
        };
        let Some(pos) = registrations.iter().position(|r| r.id == id) else {
            return false;
        };
        registrations.remove(pos);
        if registrations.is_empty() {
            self.by_topic.remove(topic);
        }
        true
    }
}

/// Outcome of a single publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    /// Callbacks registered for the topic when publishing started.
    pub subscribers: usize,
    /// Callbacks that panicked; their panic was caught and logged.
    pub failed: usize,
}

impl Delivery {
    /// Returns `true` if at least one subscriber existed at publish time.
    #[must_use]
    pub const fn had_subscribers(&self) -> bool {
        self.subscribers > 0
    }
}

/// Publish/subscribe dispatcher keyed by topic name.
///
/// Cloning is cheap and every clone shares the same subscriber table, so
/// one bus is created per session and handed to each component that needs
/// it.
pub struct EventBus<T> {
    topics: Arc<RwLock<Topics<T>>>,
}

impl<T> EventBus<T> {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(Topics {
                next_id: 0,
                by_topic: HashMap::new(),
            })),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Topics<T>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `callback` under `topic`.
    ///
    /// Registering the same callback twice yields two registrations, each
    /// invoked once per publish. The returned [`Subscription`] removes only
    /// its own registration when dropped; call [`Subscription::detach`] to
    /// keep the callback registered until [`EventBus::unsubscribe`].
    pub fn subscribe(&self, topic: impl Into<String>, callback: Callback<T>) -> Subscription<T> {
        let topic = topic.into();
        let mut topics = self.write();
        let id = topics.next_id;
        topics.next_id = topics.next_id.wrapping_add(1);
        topics
            .by_topic
            .entry(topic.clone())
            .or_default()
            .push(Registration { id, callback });
        tracing::trace!(topic = %topic, id, "bus subscription added");
        Subscription {
            topics: Arc::downgrade(&self.topics),
            topic,
            id: Some(id),
        }
    }

    /// Convenience wrapper around [`EventBus::subscribe`] for closures.
    pub fn subscribe_fn<F>(&self, topic: impl Into<String>, callback: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(topic, Arc::new(callback))
    }

    /// Removes the first registration of exactly `callback` under `topic`.
    ///
    /// Returns `false` (and does nothing) when the callback is not
    /// registered there.
    pub fn unsubscribe(&self, topic: &str, callback: &Callback<T>) -> bool {
        let mut topics = self.write();
        let id = topics.by_topic.get(topic).and_then(|registrations| {
            registrations
                .iter()
                .find(|r| Arc::ptr_eq(&r.callback, callback))
                .map(|r| r.id)
        });
        match id {
            Some(id) => topics.remove_id(topic, id),
            None => false,
        }
    }

    /// Invokes every callback registered for `topic` with `data`.
    ///
    /// Returns `true` if at least one subscriber existed at call time.
    pub fn publish(&self, topic: &str, data: &T) -> bool {
        self.publish_report(topic, data).had_subscribers()
    }

    /// Like [`EventBus::publish`], reporting how many callbacks ran and how
    /// many of them panicked.
    ///
    /// The subscriber list is snapshotted before the first callback runs
    /// and no lock is held while callbacks execute, so callbacks may
    /// subscribe or unsubscribe; such changes apply to the next publish.
    pub fn publish_report(&self, topic: &str, data: &T) -> Delivery {
        let callbacks: Vec<Callback<T>> = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            topics
                .by_topic
                .get(topic)
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|r| Arc::clone(&r.callback))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut delivery = Delivery {
            subscribers: callbacks.len(),
            failed: 0,
        };
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(data))) {
                delivery.failed += 1;
                tracing::error!(
                    topic,
                    index,
                    error = panic_message(payload.as_ref()),
                    "event bus callback panicked"
                );
            }
        }
        tracing::debug!(
            topic,
            subscribers = delivery.subscribers,
            failed = delivery.failed,
            "published"
        );
        delivery
    }

    /// Returns the number of registrations for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.by_topic.get(topic).map_or(0, Vec::len)
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
        }
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts: Vec<(&str, usize)> = topics
            .by_topic
            .iter()
            .map(|(topic, registrations)| (topic.as_str(), registrations.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventBus").field("topics", &counts).finish()
    }
}

/// Handle for one registration made by [`EventBus::subscribe`].
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) removes
/// the registration. Both are idempotent and never panic, also when the
/// bus itself is gone.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription<T> {
    topics: Weak<RwLock<Topics<T>>>,
    topic: String,
    id: Option<u64>,
}

impl<T> Subscription<T> {
    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns `true` while the registration is still in place.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let (Some(id), Some(topics)) = (self.id, self.topics.upgrade()) else {
            return false;
        };
        let topics = topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .by_topic
            .get(&self.topic)
            .is_some_and(|registrations| registrations.iter().any(|r| r.id == id))
    }

    /// Removes the registration now.
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    /// Leaves the registration in place after the handle is dropped.
    pub fn detach(mut self) {
        self.id = None;
    }

    fn dispose(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(topics) = self.topics.upgrade() {
            let mut topics = topics.write().unwrap_or_else(PoisonError::into_inner);
            topics.remove_id(&self.topic, id);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::domain::LogbookId;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Callback<u64> {
        let log = Arc::clone(log);
        Arc::new(move |data: &u64| {
            if let Ok(mut log) = log.lock() {
                log.push(format!("{name}:{data}"));
            }
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    #[test]
    fn publish_without_subscribers_returns_false() {
        let bus: EventBus<u64> = EventBus::new();
        assert!(!bus.publish("logbook.reload", &1));
        assert_eq!(bus.publish_report("nothing", &1), Delivery::default());
    }

    #[test]
    fn subscribers_run_once_in_registration_order() {
        let bus = EventBus::new();
        let log = Log::default();
        let _a = bus.subscribe("t", recorder(&log, "a"));
        let _b = bus.subscribe("t", recorder(&log, "b"));
        let _c = bus.subscribe("t", recorder(&log, "c"));

        assert!(bus.publish("t", &9));
        assert_eq!(entries(&log), vec!["a:9", "b:9", "c:9"]);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::new();
        let log = Log::default();
        let _a = bus.subscribe("one", recorder(&log, "a"));
        assert!(!bus.publish("two", &1));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn unsubscribe_by_identity() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        bus.subscribe("t", Arc::clone(&a)).detach();
        bus.subscribe("t", Arc::clone(&b)).detach();

        assert!(bus.unsubscribe("t", &a));
        bus.publish("t", &1);
        assert_eq!(entries(&log), vec!["b:1"]);
    }

    #[test]
    fn unsubscribe_of_unknown_callback_is_a_noop() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "a");
        let look_alike = recorder(&log, "a");
        bus.subscribe("t", Arc::clone(&a)).detach();

        assert!(!bus.unsubscribe("t", &look_alike));
        assert!(!bus.unsubscribe("other", &a));
        assert_eq!(bus.subscriber_count("t"), 1);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "a");
        bus.subscribe("t", Arc::clone(&a)).detach();
        bus.subscribe("t", Arc::clone(&a)).detach();

        bus.publish("t", &3);
        assert_eq!(entries(&log), vec!["a:3", "a:3"]);

        // one unsubscribe removes one registration
        assert!(bus.unsubscribe("t", &a));
        assert_eq!(bus.subscriber_count("t"), 1);
    }

    #[test]
    fn dropping_subscription_removes_only_its_registration() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "a");
        let first = bus.subscribe("t", Arc::clone(&a));
        let second = bus.subscribe("t", Arc::clone(&a));

        drop(first);
        assert!(second.is_active());
        assert_eq!(bus.subscriber_count("t"), 1);

        second.unsubscribe();
        assert_eq!(bus.subscriber_count("t"), 0);
        assert!(!bus.publish("t", &1));
    }

    #[test]
    fn subscription_outliving_bus_drops_cleanly() {
        let bus: EventBus<u64> = EventBus::new();
        let sub = bus.subscribe_fn("t", |_| {});
        drop(bus);
        assert!(!sub.is_active());
        drop(sub);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let log = Log::default();
        let _a = bus.subscribe("t", recorder(&log, "a"));
        let _boom = bus.subscribe_fn("t", |_: &u64| panic!("boom"));
        let _c = bus.subscribe("t", recorder(&log, "c"));

        let delivery = bus.publish_report("t", &5);
        assert_eq!(delivery.subscribers, 3);
        assert_eq!(delivery.failed, 1);
        assert_eq!(entries(&log), vec!["a:5", "c:5"]);
    }

    #[test]
    fn subscriptions_added_during_publish_apply_next_time() {
        let bus: EventBus<u64> = EventBus::new();
        let log = Log::default();
        let late = recorder(&log, "late");
        let inner_bus = bus.clone();
        let _adder = bus.subscribe_fn("t", move |_| {
            inner_bus.subscribe("t", Arc::clone(&late)).detach();
        });

        bus.publish("t", &1);
        assert!(entries(&log).is_empty());

        bus.publish("t", &2);
        assert_eq!(entries(&log), vec!["late:2"]);
    }

    #[test]
    fn late_subscriber_gets_no_replay() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.publish("t", &1);
        let _a = bus.subscribe("t", recorder(&log, "a"));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn reload_reaches_sibling_view() {
        let bus: EventBus<LogbookId> = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _entry_list = bus.subscribe_fn(LOGBOOK_RELOAD, move |id: &LogbookId| {
            if let Ok(mut ids) = sink.lock() {
                ids.push(*id);
            }
        });

        let editor = bus.clone();
        assert!(editor.publish(LOGBOOK_RELOAD, &LogbookId::new(7)));

        let ids = received.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(ids, vec![LogbookId::new(7)]);
    }

    #[test]
    fn debug_lists_topic_counts() {
        let bus: EventBus<u64> = EventBus::new();
        let _a = bus.subscribe_fn("b.topic", |_| {});
        let _b = bus.subscribe_fn("a.topic", |_| {});
        let rendered = format!("{bus:?}");
        assert!(rendered.contains("a.topic"));
        assert!(rendered.contains("b.topic"));
    }
}
