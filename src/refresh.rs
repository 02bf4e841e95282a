use std::collections::HashMap;

/// Per-class refresh bookkeeping. The UI's auto-refresh timer and its manual
/// refresh button both funnel through `begin`; only one fetch per class is
/// ever in flight, and only the latest in-flight request may apply its
/// result. There is no cross-thread state here, just last-write-wins
/// sequencing for responses that arrive out of order or after cancellation.
#[derive(Debug, Default)]
pub struct RefreshState {
    classes: HashMap<String, ClassRefresh>,
}

#[derive(Debug, Default)]
struct ClassRefresh {
    next_request_id: u64,
    in_flight: Option<u64>,
    loaded: bool,
    load_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started { request_id: u64 },
    /// A fetch for this class is already in flight; the caller must not
    /// start a duplicate request.
    Coalesced,
}

impl RefreshState {
    fn entry(&mut self, class_id: &str) -> &mut ClassRefresh {
        self.classes.entry(class_id.to_string()).or_default()
    }

    pub fn begin(&mut self, class_id: &str) -> BeginOutcome {
        let c = self.entry(class_id);
        if c.in_flight.is_some() {
            return BeginOutcome::Coalesced;
        }
        c.next_request_id += 1;
        let request_id = c.next_request_id;
        c.in_flight = Some(request_id);
        BeginOutcome::Started { request_id }
    }

    /// View unmount: forget the in-flight request so its eventual response
    /// is discarded as stale. In-flight HTTP is not cancelled, just ignored.
    pub fn cancel(&mut self, class_id: &str) {
        self.entry(class_id).in_flight = None;
    }

    /// Whether a completion carrying this request id would apply right now.
    /// Lets callers reject a stale response before attempting side effects,
    /// without committing any state change. Completions without a request id
    /// are direct pushes and are always current.
    pub fn is_current(&self, class_id: &str, request_id: Option<u64>) -> bool {
        match request_id {
            None => true,
            Some(rid) => self
                .classes
                .get(class_id)
                .map(|c| c.in_flight == Some(rid))
                .unwrap_or(false),
        }
    }

    /// A fetch completed with data. Returns false when the response is stale
    /// (superseded or cancelled) and must not be applied. Completions that
    /// carry no request id are direct pushes and always apply.
    pub fn complete_ok(&mut self, class_id: &str, request_id: Option<u64>) -> bool {
        let c = self.entry(class_id);
        if let Some(rid) = request_id {
            if c.in_flight != Some(rid) {
                return false;
            }
            c.in_flight = None;
        }
        c.loaded = true;
        c.load_failed = false;
        true
    }

    /// A fetch failed upstream. Stale failures are ignored the same way
    /// stale successes are. Cached records stay untouched; only the flag
    /// flips so the caller can distinguish "failed" from "zero attendance".
    pub fn complete_failed(&mut self, class_id: &str, request_id: Option<u64>) -> bool {
        let c = self.entry(class_id);
        if let Some(rid) = request_id {
            if c.in_flight != Some(rid) {
                return false;
            }
            c.in_flight = None;
        }
        c.load_failed = true;
        true
    }

    pub fn is_loaded(&self, class_id: &str) -> bool {
        self.classes.get(class_id).map(|c| c.loaded).unwrap_or(false)
    }

    pub fn is_load_failed(&self, class_id: &str) -> bool {
        self.classes
            .get(class_id)
            .map(|c| c.load_failed)
            .unwrap_or(false)
    }

    pub fn is_in_flight(&self, class_id: &str) -> bool {
        self.classes
            .get(class_id)
            .map(|c| c.in_flight.is_some())
            .unwrap_or(false)
    }
}
