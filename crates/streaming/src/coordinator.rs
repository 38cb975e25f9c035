use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fingerprint::{Fingerprint, FingerprintError};

/// A request the caller must now perform, and settle with
/// [`FetchCoordinator::settle`] under the same fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket<Q> {
    pub id: u64,
    pub fingerprint: Fingerprint,
    pub request: Q,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Begin<Q> {
    Issued(FetchTicket<Q>),
    /// An identical request is already in flight; its result will serve this one too.
    Attached(Fingerprint),
}

#[derive(Debug)]
pub enum Settled<T> {
    Fresh(Arc<T>),
    /// Superseded while in flight. Dropped without touching state.
    Stale,
    Failed(String),
}

/// Sans-IO request bookkeeping for one backend endpoint.
///
/// The coordinator never performs I/O. It hands out tickets, tracks which
/// fingerprints are in flight and which one is current, and decides on
/// arrival whether a result is applied or discarded. A result is applied only
/// if its fingerprint is still the current one, so a superseded request can
/// never overwrite newer state even though its transport was not cancelled.
#[derive(Debug)]
pub struct FetchCoordinator<Q, T> {
    label: &'static str,
    next_id: u64,
    in_flight: BTreeMap<Fingerprint, u64>,
    current: Option<Fingerprint>,
    latest: Option<Arc<T>>,
    latest_fingerprint: Option<Fingerprint>,
    last_error: Option<String>,
    _request: PhantomData<fn(Q)>,
}

impl<Q: Serialize, T> FetchCoordinator<Q, T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            next_id: 1,
            in_flight: BTreeMap::new(),
            current: None,
            latest: None,
            latest_fingerprint: None,
            last_error: None,
            _request: PhantomData,
        }
    }

    /// Makes `request` the current one.
    pub fn begin(&mut self, request: Q) -> Result<Begin<Q>, FingerprintError> {
        let fingerprint = Fingerprint::of(&request)?;
        self.current = Some(fingerprint.clone());
        self.last_error = None;

        if self.in_flight.contains_key(&fingerprint) {
            debug!(
                endpoint = self.label,
                fingerprint = fingerprint.short(),
                "attached to in-flight request"
            );
            return Ok(Begin::Attached(fingerprint));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(fingerprint.clone(), id);
        info!(
            endpoint = self.label,
            id,
            fingerprint = fingerprint.short(),
            "fetch issued"
        );
        Ok(Begin::Issued(FetchTicket {
            id,
            fingerprint,
            request,
        }))
    }

    /// Records the outcome of an issued request.
    pub fn settle<E: std::fmt::Display>(
        &mut self,
        fingerprint: &Fingerprint,
        outcome: Result<T, E>,
    ) -> Settled<T> {
        self.in_flight.remove(fingerprint);

        if self.current.as_ref() != Some(fingerprint) {
            debug!(
                endpoint = self.label,
                fingerprint = fingerprint.short(),
                "discarding superseded response"
            );
            return Settled::Stale;
        }

        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                self.latest = Some(value.clone());
                self.latest_fingerprint = Some(fingerprint.clone());
                info!(
                    endpoint = self.label,
                    fingerprint = fingerprint.short(),
                    "fetch applied"
                );
                Settled::Fresh(value)
            }
            Err(err) => {
                let msg = err.to_string();
                warn!(
                    endpoint = self.label,
                    fingerprint = fingerprint.short(),
                    "fetch failed: {msg}"
                );
                self.last_error = Some(msg.clone());
                Settled::Failed(msg)
            }
        }
    }

    /// True while the current request has not settled.
    pub fn is_loading(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|fp| self.in_flight.contains_key(fp))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn latest(&self) -> Option<&Arc<T>> {
        self.latest.as_ref()
    }

    pub fn latest_fingerprint(&self) -> Option<&Fingerprint> {
        self.latest_fingerprint.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Nothing is current anymore; any response still in flight will be
    /// discarded on arrival. The stored result is kept.
    pub fn supersede(&mut self) {
        self.current = None;
    }

    /// Supersedes and drops the stored result.
    pub fn clear(&mut self) {
        self.supersede();
        self.latest = None;
        self.latest_fingerprint = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{Begin, FetchCoordinator, Settled};

    fn issued(b: Begin<&'static str>) -> super::FetchTicket<&'static str> {
        match b {
            Begin::Issued(t) => t,
            Begin::Attached(_) => panic!("expected a new ticket"),
        }
    }

    #[test]
    fn identical_requests_share_one_fetch() {
        let mut c: FetchCoordinator<&str, u32> = FetchCoordinator::new("test");
        let t = issued(c.begin("a").unwrap());
        assert!(matches!(c.begin("a").unwrap(), Begin::Attached(fp) if fp == t.fingerprint));
        assert_eq!(c.in_flight(), 1);

        assert!(matches!(
            c.settle(&t.fingerprint, Ok::<_, String>(7)),
            Settled::Fresh(v) if *v == 7
        ));
        assert!(!c.is_loading());
        assert_eq!(c.latest().map(|v| **v), Some(7));
    }

    #[test]
    fn superseded_response_is_discarded() {
        let mut c: FetchCoordinator<&str, u32> = FetchCoordinator::new("test");
        let a = issued(c.begin("a").unwrap());
        let b = issued(c.begin("b").unwrap());

        assert!(matches!(c.settle(&a.fingerprint, Ok::<_, String>(1)), Settled::Stale));
        assert!(c.latest().is_none());
        assert!(c.is_loading());

        assert!(matches!(c.settle(&b.fingerprint, Ok::<_, String>(2)), Settled::Fresh(_)));
        assert_eq!(c.latest().map(|v| **v), Some(2));
    }

    #[test]
    fn loading_tracks_only_the_current_request() {
        let mut c: FetchCoordinator<&str, u32> = FetchCoordinator::new("test");
        let a = issued(c.begin("a").unwrap());
        let b = issued(c.begin("b").unwrap());
        c.settle(&b.fingerprint, Ok::<_, String>(2));
        assert!(!c.is_loading());
        assert_eq!(c.in_flight(), 1);
        c.settle(&a.fingerprint, Ok::<_, String>(1));
        assert_eq!(c.latest().map(|v| **v), Some(2));
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut c: FetchCoordinator<&str, u32> = FetchCoordinator::new("test");
        let a = issued(c.begin("a").unwrap());
        c.settle(&a.fingerprint, Ok::<_, String>(1));

        let b = issued(c.begin("b").unwrap());
        assert!(matches!(
            c.settle(&b.fingerprint, Err("timeout")),
            Settled::Failed(m) if m == "timeout"
        ));
        assert_eq!(c.latest().map(|v| **v), Some(1));
        assert_eq!(c.last_error(), Some("timeout"));

        // Re-submitting issues a fresh ticket; nothing retried on its own.
        assert!(matches!(c.begin("b").unwrap(), Begin::Issued(_)));
        assert_eq!(c.last_error(), None);
    }

    #[test]
    fn supersede_discards_in_flight_and_clear_drops_result() {
        let mut c: FetchCoordinator<&str, u32> = FetchCoordinator::new("test");
        let a = issued(c.begin("a").unwrap());
        c.settle(&a.fingerprint, Ok::<_, String>(1));
        let b = issued(c.begin("b").unwrap());

        c.supersede();
        assert!(!c.is_loading());
        assert!(matches!(c.settle(&b.fingerprint, Ok::<_, String>(2)), Settled::Stale));
        assert_eq!(c.latest().map(|v| **v), Some(1));

        c.clear();
        assert!(c.latest().is_none());
        assert!(c.latest_fingerprint().is_none());
    }
}
