//! # Bus Core
//!
//! Subscriber registry plus synchronous fan-out. `publish` runs while the
//! committing request still holds its collection's publish permit, touches
//! only subscriber queues (never the store), and returns without waiting on
//! any consumer.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::observability::{log, Severity};
use crate::rules::{evaluate, ParsedRule, RuleContext};
use crate::schema::{RuleOp, SchemaRegistry};

use super::errors::{BusError, BusResult};
use super::event::RecordEvent;
use super::subscriber::{EventStream, PushOutcome, SubscriberQueue};

struct Subscriber {
    collection: String,
    /// Client-supplied filter, intersected with the view rule
    filter: Option<ParsedRule>,
    /// Identity claims captured at subscribe time; `None` = anonymous
    claims: Option<Map<String, Value>>,
    /// Admins bypass rules explicitly
    is_admin: bool,
    queue: Arc<SubscriberQueue>,
}

/// The event bus.
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
    by_collection: RwLock<HashMap<String, HashSet<String>>>,
    registry: Arc<SchemaRegistry>,
    queue_capacity: usize,
}

impl EventBus {
    /// A bus over the given registry. The registry supplies the *current*
    /// view rule at publish time.
    pub fn new(registry: Arc<SchemaRegistry>, queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            by_collection: RwLock::new(HashMap::new()),
            registry,
            queue_capacity,
        }
    }

    /// Subscribe to a collection. Returns the subscription id and the
    /// receiving stream; dropping the stream ends delivery.
    pub fn subscribe(
        &self,
        collection: &str,
        filter: Option<ParsedRule>,
        claims: Option<Map<String, Value>>,
        is_admin: bool,
    ) -> BusResult<(String, EventStream)> {
        if self.registry.get(collection).is_none() {
            return Err(BusError::CollectionNotFound(collection.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let queue = Arc::new(SubscriberQueue::new(self.queue_capacity));
        let subscriber = Arc::new(Subscriber {
            collection: collection.to_string(),
            filter,
            claims,
            is_admin,
            queue: Arc::clone(&queue),
        });

        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .insert(id.clone(), subscriber);
        self.by_collection
            .write()
            .expect("bus lock poisoned")
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone());

        Ok((id, EventStream { queue }))
    }

    /// Remove a subscription and release its buffer.
    pub fn unsubscribe(&self, id: &str) -> BusResult<()> {
        let subscriber = self
            .subscribers
            .write()
            .expect("bus lock poisoned")
            .remove(id)
            .ok_or_else(|| BusError::SubscriptionNotFound(id.to_string()))?;

        subscriber.queue.close();
        if let Some(ids) = self
            .by_collection
            .write()
            .expect("bus lock poisoned")
            .get_mut(&subscriber.collection)
        {
            ids.remove(id);
        }
        Ok(())
    }

    /// Fan an event out to every authorized, matching subscriber.
    ///
    /// Called synchronously after commit confirmation; must stay fast and
    /// must never block on subscriber consumption.
    pub fn publish(&self, event: &RecordEvent) {
        let ids: Vec<String> = {
            let by_collection = self.by_collection.read().expect("bus lock poisoned");
            match by_collection.get(&event.collection) {
                Some(ids) => ids.iter().cloned().collect(),
                None => return,
            }
        };
        if ids.is_empty() {
            return;
        }

        let view_rule = self
            .registry
            .get(&event.collection)
            .and_then(|c| c.rules.get(RuleOp::View).cloned());

        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().expect("bus lock poisoned");
            for id in &ids {
                let Some(subscriber) = subscribers.get(id) else {
                    continue;
                };

                if !self.authorized(subscriber, view_rule.as_ref(), &event.record) {
                    continue;
                }

                match subscriber.queue.push(event.clone()) {
                    PushOutcome::Delivered => {}
                    PushOutcome::DroppedOldest => {
                        log(
                            Severity::Warn,
                            "bus.drop",
                            &[("collection", event.collection.as_str()), ("subscription", id)],
                        );
                    }
                    PushOutcome::Closed => dead.push(id.clone()),
                }
            }
        }

        for id in dead {
            let _ = self.unsubscribe(&id);
        }
    }

    /// Publish-time authorization: the subscriber's own identity against the
    /// collection's current view rule, intersected with its filter.
    fn authorized(
        &self,
        subscriber: &Subscriber,
        view_rule: Option<&ParsedRule>,
        record: &Value,
    ) -> bool {
        if !subscriber.is_admin {
            // Fail-closed: no view rule means no subscriber traffic.
            let Some(rule) = view_rule else {
                return false;
            };
            let mut ctx = RuleContext::anonymous().with_record(record);
            if let Some(claims) = &subscriber.claims {
                ctx = ctx.with_auth(claims);
            }
            if !evaluate(rule, &ctx) {
                return false;
            }
        }

        if let Some(filter) = &subscriber.filter {
            let mut ctx = RuleContext::anonymous().with_record(record);
            if let Some(claims) = &subscriber.claims {
                ctx = ctx.with_auth(claims);
            }
            if !evaluate(filter, &ctx) {
                return false;
            }
        }

        true
    }

    /// Number of live subscriptions (tests and observability).
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().expect("bus lock poisoned").len()
    }
}
