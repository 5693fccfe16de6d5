//! Debounced, deduplicated query dispatch over a [`StoreChannel`]. Nothing
//! here sleeps; the host drives timers through [`QueryDispatcher::tick`].

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::cache::{CachedResults, QueryCache};
use super::dom::NodeId;
use super::rank::{default_suggestions, DefaultLimits};
use crate::config::RecallConfig;
use crate::error::TransportError;
use crate::storage::{snippets_from_value, StoreChannel, StoreRequest, StoreResponse, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimings {
    pub debounce: Duration,
    pub retry_delay: Duration,
    pub response_timeout: Duration,
}

impl From<&RecallConfig> for DispatchTimings {
    fn from(config: &RecallConfig) -> Self {
        Self {
            debounce: config.debounce(),
            retry_delay: config.retry_delay(),
            response_timeout: config.response_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    Transport(TransportError),
    Store(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Results {
        origin: NodeId,
        query: String,
        items: CachedResults,
    },
    Failed {
        origin: NodeId,
        query: String,
        failure: DispatchFailure,
    },
}

#[derive(Debug, Clone)]
struct PendingQuery {
    query: String,
    origin: NodeId,
    due: Instant,
}

#[derive(Debug, Clone)]
struct InFlight {
    query: String,
    origin: NodeId,
    request: StoreRequest,
    sent_at: Instant,
}

#[derive(Debug, Clone)]
struct Retry {
    ticket: Ticket,
    flight: InFlight,
    due: Instant,
}

pub struct QueryDispatcher<C> {
    channel: C,
    timings: DispatchTimings,
    limits: DefaultLimits,
    cache: QueryCache,
    pending: Option<PendingQuery>,
    in_flight: HashMap<Ticket, InFlight>,
    retries: Vec<Retry>,
    last_sent: Option<String>,
    next_ticket: Ticket,
    ready: VecDeque<DispatchOutcome>,
}

impl<C: StoreChannel> QueryDispatcher<C> {
    pub fn new(channel: C, timings: DispatchTimings, limits: DefaultLimits, cache_capacity: usize) -> Self {
        Self {
            channel,
            timings,
            limits,
            cache: QueryCache::new(cache_capacity),
            pending: None,
            in_flight: HashMap::new(),
            retries: Vec::new(),
            last_sent: None,
            next_ticket: 1,
            ready: VecDeque::new(),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn set_timings(&mut self, timings: DispatchTimings) {
        self.timings = timings;
    }

    pub fn set_limits(&mut self, limits: DefaultLimits) {
        self.limits = limits;
    }

    pub fn invalidate_cache(&mut self) {
        log::debug!("Dropping {} cached queries", self.cache.len());
        self.cache.clear();
        self.last_sent = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len() + self.retries.len()
    }

    pub fn schedule(&mut self, query: &str, origin: NodeId, now: Instant) -> Option<Instant> {
        let query = query.trim();
        if query.is_empty() {
            self.pending = None;
            self.last_sent = None;
            self.request_defaults(origin, now);
            return None;
        }

        let due = now + self.timings.debounce;
        self.pending = Some(PendingQuery {
            query: query.to_string(),
            origin,
            due,
        });
        Some(due)
    }

    /// Forgets the debounced query and the dedup memory. Requests already
    /// sent are left to the caller's staleness check.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_sent = None;
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        let pending = self.pending.as_ref().map(|p| p.due);
        let retries = self.retries.iter().map(|r| r.due);
        let timeouts = self
            .in_flight
            .values()
            .map(|f| f.sent_at + self.timings.response_timeout);
        pending.into_iter().chain(retries).chain(timeouts).min()
    }

    pub fn tick(&mut self, now: Instant, is_current: impl Fn(NodeId, &str) -> bool) -> Vec<DispatchOutcome> {
        if self.pending.as_ref().is_some_and(|p| p.due <= now) {
            if let Some(pending) = self.pending.take() {
                self.fire(pending.query, pending.origin, now);
            }
        }

        self.resend_due(now);
        self.drain_responses(&is_current);
        self.expire(now);

        self.ready.drain(..).collect()
    }

    fn fire(&mut self, query: String, origin: NodeId, now: Instant) {
        if self.retarget(&query, origin) {
            log::debug!("Query {:?} already in flight", query);
            return;
        }

        if self.last_sent.as_deref() == Some(query.as_str()) {
            log::debug!("Query {:?} already sent, skipping", query);
            return;
        }

        if let Some(items) = self.cache.get(&query) {
            log::debug!("Cache hit for {:?}", query);
            self.last_sent = Some(query.clone());
            self.ready.push_back(DispatchOutcome::Results { origin, query, items });
            return;
        }

        self.last_sent = Some(query.clone());
        let request = StoreRequest::SearchItems { query: query.clone() };
        self.send(query, origin, request, now);
    }

    fn request_defaults(&mut self, origin: NodeId, now: Instant) {
        if self.retarget("", origin) {
            return;
        }
        self.send(String::new(), origin, StoreRequest::saved_texts(), now);
    }

    /// Hands any outstanding request for `query` over to `origin`, so its
    /// answer reaches whoever asked last. Returns false when nothing was
    /// outstanding.
    fn retarget(&mut self, query: &str, origin: NodeId) -> bool {
        let flights = self
            .in_flight
            .values_mut()
            .chain(self.retries.iter_mut().map(|r| &mut r.flight))
            .filter(|f| f.query == query);
        let mut found = false;
        for flight in flights {
            flight.origin = origin;
            found = true;
        }
        found
    }

    fn send(&mut self, query: String, origin: NodeId, request: StoreRequest, now: Instant) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let flight = InFlight {
            query,
            origin,
            request,
            sent_at: now,
        };

        match self.channel.send(ticket, flight.request.clone()) {
            Ok(()) => {
                log::debug!("Sent {:?} as #{}", flight.request, ticket);
                self.in_flight.insert(ticket, flight);
            }
            Err(e) if e.is_transient() => {
                log::warn!("Send of #{} failed ({}), retrying in {:?}", ticket, e, self.timings.retry_delay);
                self.retries.push(Retry {
                    ticket,
                    flight,
                    due: now + self.timings.retry_delay,
                });
            }
            Err(e) => self.fail(flight, DispatchFailure::Transport(e)),
        }
    }

    fn resend_due(&mut self, now: Instant) {
        let (due, waiting): (Vec<Retry>, Vec<Retry>) = self.retries.drain(..).partition(|r| r.due <= now);
        self.retries = waiting;

        for Retry { ticket, mut flight, .. } in due {
            match self.channel.send(ticket, flight.request.clone()) {
                Ok(()) => {
                    flight.sent_at = now;
                    self.in_flight.insert(ticket, flight);
                }
                Err(e) => {
                    log::warn!("Retry of #{} failed: {}", ticket, e);
                    self.fail(flight, DispatchFailure::Transport(e));
                }
            }
        }
    }

    fn drain_responses(&mut self, is_current: &impl Fn(NodeId, &str) -> bool) {
        loop {
            match self.channel.try_recv() {
                Ok(Some((ticket, response))) => self.accept(ticket, response, is_current),
                Ok(None) => break,
                Err(e) => {
                    if !self.in_flight.is_empty() {
                        log::warn!("Store channel failed: {}", e);
                    }
                    let failed: Vec<InFlight> = self.in_flight.drain().map(|(_, f)| f).collect();
                    for flight in failed {
                        self.fail(flight, DispatchFailure::Transport(e.clone()));
                    }
                    break;
                }
            }
        }
    }

    fn accept(&mut self, ticket: Ticket, response: StoreResponse, is_current: &impl Fn(NodeId, &str) -> bool) {
        let Some(flight) = self.in_flight.remove(&ticket) else {
            log::debug!("Dropping response for unknown ticket #{}", ticket);
            return;
        };

        let items: CachedResults = match response {
            StoreResponse::Items(items) => {
                if !is_current(flight.origin, &flight.query) {
                    log::debug!("Dropping stale results for {:?}", flight.query);
                    return;
                }
                let items: CachedResults = items.into();
                self.cache.insert(&flight.query, items.clone(), Some(&flight.query));
                items
            }
            StoreResponse::Value(value) => match snippets_from_value(&value) {
                Ok(all) => {
                    if !is_current(flight.origin, &flight.query) {
                        log::debug!("Dropping stale default suggestions");
                        return;
                    }
                    default_suggestions(&all, self.limits).into()
                }
                Err(e) => return self.fail(flight, DispatchFailure::Store(e.to_string())),
            },
            StoreResponse::Failed { error } => return self.fail(flight, DispatchFailure::Store(error)),
        };

        self.ready.push_back(DispatchOutcome::Results {
            origin: flight.origin,
            query: flight.query,
            items,
        });
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.timings.response_timeout;
        let expired: Vec<Ticket> = self
            .in_flight
            .iter()
            .filter(|(_, f)| now.duration_since(f.sent_at) >= timeout)
            .map(|(ticket, _)| *ticket)
            .collect();

        for ticket in expired {
            if let Some(flight) = self.in_flight.remove(&ticket) {
                log::warn!("No response for #{} within {:?}", ticket, timeout);
                self.fail(flight, DispatchFailure::Transport(TransportError::Timeout(timeout)));
            }
        }
    }

    fn fail(&mut self, flight: InFlight, failure: DispatchFailure) {
        if self.last_sent.as_deref() == Some(flight.query.as_str()) {
            self.last_sent = None;
        }
        self.ready.push_back(DispatchOutcome::Failed {
            origin: flight.origin,
            query: flight.query,
            failure,
        });
    }
}
