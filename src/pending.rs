use crate::protocol::is_query;
use crate::types::TimeoutClass;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

/// What to do with a line handed to [`RequestQueue::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a query: write it right away
    Now(String),
    /// Queued; will be due at the given instant
    Queued(Instant),
}

/// Classification of a received line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Answers the oldest transmitted query, which is given back
    Reply(String),
    /// Nothing was awaiting a reply
    Unsolicited,
}

#[derive(Debug)]
struct PendingRequest {
    line: String,
    send_at: Instant,
    timeout: Duration,
    /// Set once the line has been written
    deadline: Option<Instant>,
}

/// FIFO of queries, spaced by the inter-message delay
#[derive(Debug)]
pub struct RequestQueue {
    delay: Duration,
    timeout: Duration,
    extended_timeout: Duration,
    requests: VecDeque<PendingRequest>,
    last_slot: Option<Instant>,
}

impl RequestQueue {
    pub fn new(delay: Duration, timeout: Duration, extended_timeout: Duration) -> Self {
        Self {
            delay,
            timeout,
            extended_timeout,
            requests: VecDeque::new(),
            last_slot: None,
        }
    }

    /// Queries queued or awaiting a reply
    pub fn ongoing(&self) -> usize {
        self.requests.len()
    }

    /// Queries written and not yet answered
    pub fn in_flight(&self) -> usize {
        self.requests.iter().filter(|r| r.deadline.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn timeout_for(&self, line: &str) -> Duration {
        match TimeoutClass::for_line(line) {
            TimeoutClass::Standard => self.timeout,
            TimeoutClass::Extended => self.extended_timeout,
        }
    }

    /// Accept a line for sending
    ///
    /// A query goes to the back of the queue with a slot `delay` after each
    /// query already ongoing, and never closer than `delay` to the previous
    /// query's slot.
    pub fn submit(&mut self, line: String, now: Instant) -> Dispatch {
        if !is_query(&line) {
            return Dispatch::Now(line);
        }

        let ahead = self.requests.len() as u32;
        let mut send_at = now + self.delay * ahead;
        if let Some(last) = self.last_slot {
            send_at = send_at.max(last + self.delay);
        }
        self.last_slot = Some(send_at);

        tracing::debug!(
            "Will send line: {} in {:?} (ongoing calls: {})",
            line,
            send_at.saturating_duration_since(now),
            ahead + 1
        );
        let timeout = self.timeout_for(&line);
        self.requests.push_back(PendingRequest {
            line,
            send_at,
            timeout,
            deadline: None,
        });
        Dispatch::Queued(send_at)
    }

    /// Earliest slot of a query not yet written
    pub fn next_send_time(&self) -> Option<Instant> {
        self.requests
            .iter()
            .find(|r| r.deadline.is_none())
            .map(|r| r.send_at)
    }

    /// The oldest query whose slot has come; arms its reply deadline
    ///
    /// Hands out one line per call. A deadline runs from the moment of
    /// writing, extended by whatever is left of the deadline of the query
    /// written before it.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        let previous = self.requests.iter().rev().find_map(|r| r.deadline);
        let request = self.requests.iter_mut().find(|r| r.deadline.is_none())?;
        if request.send_at > now {
            return None;
        }

        let base = previous.map_or(now, |d| d.max(now));
        request.deadline = Some(base + request.timeout);
        Some(request.line.clone())
    }

    /// Record that the line from [`take_due`](Self::take_due) finished
    /// writing at `at`
    ///
    /// Its deadline runs from `at` at the earliest, and every unsent query
    /// moves to at least `delay` after the one before it.
    pub fn written(&mut self, at: Instant) {
        if let Some(request) = self.requests.iter_mut().rev().find(|r| r.deadline.is_some()) {
            if let Some(deadline) = request.deadline.as_mut() {
                *deadline = (*deadline).max(at + request.timeout);
            }
        }

        let mut previous = at;
        for request in self.requests.iter_mut().filter(|r| r.deadline.is_none()) {
            request.send_at = request.send_at.max(previous + self.delay);
            previous = request.send_at;
        }
        self.last_slot = Some(self.last_slot.map_or(previous, |last| last.max(previous)));
    }

    /// Reply deadline of the oldest unanswered query
    pub fn deadline(&self) -> Option<Instant> {
        self.requests.front().and_then(|r| r.deadline)
    }

    /// Whether the oldest unanswered query has run out of time
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|d| d <= now)
    }

    /// Classify a received line
    ///
    /// A reply removes the oldest transmitted query and gives the next one at
    /// least a full timeout from now. Unsolicited lines change nothing.
    pub fn on_line(&mut self, now: Instant) -> Received {
        let answered = self.requests.front().is_some_and(|r| r.deadline.is_some());
        if !answered {
            return Received::Unsolicited;
        }

        let Some(request) = self.requests.pop_front() else {
            return Received::Unsolicited;
        };
        if let Some(next) = self.requests.front_mut() {
            if let Some(deadline) = next.deadline.as_mut() {
                *deadline = (*deadline).max(now + next.timeout);
            }
        }
        Received::Reply(request.line)
    }

    /// Abandon everything, transmitted or not; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.requests.len();
        self.requests.clear();
        dropped
    }
}
