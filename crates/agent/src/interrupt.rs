//! Human-in-the-loop confirmation of agent interrupts.
//!
//! The agent pauses its turn with an [`InterruptEvent`]. While a request is
//! pending the handler exposes an editable draft of its payload; confirming
//! or cancelling resolves the request exactly once through a single-use
//! channel and returns the handler to idle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub resume_token: String,
}

/// Value handed back to the agent to resume the suspended turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeValue {
    pub token: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Confirmed(Map<String, Value>),
    Cancelled,
}

impl Resolution {
    pub fn into_value(self) -> Value {
        match self {
            Resolution::Confirmed(data) => Value::Object(data),
            Resolution::Cancelled => json!({ "cancelled": true }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptError {
    UnrecognizedKind(String),
    AlreadyPending,
    NothingPending,
    UnknownField(String),
}

impl std::fmt::Display for InterruptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterruptError::UnrecognizedKind(kind) => {
                write!(f, "unrecognized interrupt kind: {kind}")
            }
            InterruptError::AlreadyPending => write!(f, "another confirmation is already pending"),
            InterruptError::NothingPending => write!(f, "no confirmation is pending"),
            InterruptError::UnknownField(name) => write!(f, "confirmation has no field {name:?}"),
        }
    }
}

impl std::error::Error for InterruptError {}

/// Single-use resolution side of a pending interrupt.
#[derive(Debug)]
pub struct ResolveHandle {
    token: String,
    tx: Option<oneshot::Sender<ResumeValue>>,
}

impl ResolveHandle {
    pub fn channel(token: impl Into<String>) -> (Self, oneshot::Receiver<ResumeValue>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                token: token.into(),
                tx: Some(tx),
            },
            rx,
        )
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }

    /// Sends `value` to the agent. Returns `false`, and sends nothing, if the
    /// handle was already used.
    pub fn resolve(&mut self, value: Value) -> bool {
        let Some(tx) = self.tx.take() else {
            debug!(token = %self.token, "interrupt already resolved, ignoring");
            return false;
        };
        let resume = ResumeValue {
            token: self.token.clone(),
            value,
        };
        if tx.send(resume).is_err() {
            debug!(token = %self.token, "resume receiver dropped");
        }
        true
    }
}

/// Read-only view backing the confirmation UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationView {
    pub kind: String,
    pub prompt: String,
    /// Fields in key order, with edits applied.
    pub fields: Vec<(String, Value)>,
}

#[derive(Debug)]
struct Pending {
    kind: String,
    prompt: String,
    draft: Map<String, Value>,
    handle: ResolveHandle,
}

#[derive(Debug)]
pub struct InterruptHandler {
    recognized: Vec<String>,
    pending: Option<Pending>,
}

impl InterruptHandler {
    pub fn new(recognized: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            recognized: recognized.into_iter().map(Into::into).collect(),
            pending: None,
        }
    }

    pub fn is_recognized(&self, kind: &str) -> bool {
        self.recognized.iter().any(|k| k == kind)
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Idle -> AwaitingConfirmation. The returned receiver yields the single
    /// resume value once the user decides.
    pub fn on_pause(
        &mut self,
        event: InterruptEvent,
    ) -> Result<oneshot::Receiver<ResumeValue>, InterruptError> {
        if !self.is_recognized(&event.kind) {
            return Err(InterruptError::UnrecognizedKind(event.kind));
        }
        if self.pending.is_some() {
            return Err(InterruptError::AlreadyPending);
        }
        let (handle, rx) = ResolveHandle::channel(event.resume_token);
        info!(kind = %event.kind, fields = event.data.len(), "awaiting confirmation");
        self.pending = Some(Pending {
            kind: event.kind,
            prompt: event.message,
            draft: event.data,
            handle,
        });
        Ok(rx)
    }

    pub fn view(&self) -> Option<ConfirmationView> {
        let p = self.pending.as_ref()?;
        Some(ConfirmationView {
            kind: p.kind.clone(),
            prompt: p.prompt.clone(),
            fields: p.draft.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    /// Replaces one field of the draft.
    pub fn edit_field(&mut self, name: &str, value: Value) -> Result<(), InterruptError> {
        let p = self.pending.as_mut().ok_or(InterruptError::NothingPending)?;
        let Some(slot) = p.draft.get_mut(name) else {
            return Err(InterruptError::UnknownField(name.to_string()));
        };
        *slot = value;
        Ok(())
    }

    /// Resolves with the edited draft.
    pub fn confirm(&mut self) -> Result<(), InterruptError> {
        let mut p = self.pending.take().ok_or(InterruptError::NothingPending)?;
        let draft = std::mem::take(&mut p.draft);
        p.handle.resolve(Resolution::Confirmed(draft).into_value());
        info!(kind = %p.kind, "confirmation submitted");
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), InterruptError> {
        let mut p = self.pending.take().ok_or(InterruptError::NothingPending)?;
        p.handle.resolve(Resolution::Cancelled.into_value());
        info!(kind = %p.kind, "confirmation cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::{InterruptError, InterruptEvent, InterruptHandler, ResolveHandle};

    fn event(kind: &str, data: Value) -> InterruptEvent {
        let Value::Object(data) = data else {
            panic!("payload must be an object");
        };
        InterruptEvent {
            kind: kind.to_string(),
            message: "Please confirm".to_string(),
            data,
            resume_token: "tok-1".to_string(),
        }
    }

    #[test]
    fn handle_resolves_once() {
        let (mut h, mut rx) = ResolveHandle::channel("t");
        assert!(h.resolve(json!({"a": 1})));
        assert!(!h.resolve(json!({"a": 2})));
        assert!(h.is_resolved());

        let got = rx.try_recv().unwrap();
        assert_eq!(got.token, "t");
        assert_eq!(got.value, json!({"a": 1}));
    }

    #[test]
    fn edit_then_confirm_sends_edited_payload() {
        let mut h = InterruptHandler::new(["confirm_flood_event"]);
        let mut rx = h
            .on_pause(event("confirm_flood_event", json!({"event": "X", "location": "Y"})))
            .unwrap();
        assert!(h.is_awaiting());
        assert_eq!(
            h.view().unwrap().fields,
            vec![
                ("event".to_string(), json!("X")),
                ("location".to_string(), json!("Y")),
            ]
        );

        h.edit_field("event", json!("X2")).unwrap();
        assert_eq!(
            h.edit_field("nope", json!(1)),
            Err(InterruptError::UnknownField("nope".to_string()))
        );
        h.confirm().unwrap();

        assert!(!h.is_awaiting());
        let resume = rx.try_recv().unwrap();
        assert_eq!(resume.token, "tok-1");
        assert_eq!(resume.value, json!({"event": "X2", "location": "Y"}));
        assert_eq!(h.confirm(), Err(InterruptError::NothingPending));
    }

    #[test]
    fn cancel_sends_marker() {
        let mut h = InterruptHandler::new(["confirm_flood_event"]);
        let mut rx = h
            .on_pause(event("confirm_flood_event", Value::Object(Map::new())))
            .unwrap();
        h.cancel().unwrap();
        assert_eq!(rx.try_recv().unwrap().value, json!({"cancelled": true}));
        assert_eq!(h.cancel(), Err(InterruptError::NothingPending));
    }

    #[test]
    fn unrecognized_and_overlapping_pauses_are_rejected() {
        let mut h = InterruptHandler::new(["confirm_flood_event"]);
        assert!(matches!(
            h.on_pause(event("approve_budget", json!({}))),
            Err(InterruptError::UnrecognizedKind(_))
        ));
        assert!(!h.is_awaiting());

        let _rx = h.on_pause(event("confirm_flood_event", json!({"event": "A"}))).unwrap();
        assert!(matches!(
            h.on_pause(event("confirm_flood_event", json!({"event": "B"}))),
            Err(InterruptError::AlreadyPending)
        ));
        assert_eq!(h.view().unwrap().fields[0].1, json!("A"));
    }
}
