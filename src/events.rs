//! Hook registry for upload lifecycle events.
//!
//! One callback per event kind; registering again replaces the previous
//! callback. A `start` hook that returns [`Flow::Abort`] (or `false`) vetoes
//! the upload before anything is sent.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::error::UploadError;
use crate::progress::ProgressReport;
use crate::selection::FileSelection;
use crate::transport::{TransportResponse, UserData};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("Event type not supported: {name}")]
    UnknownEvent { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Progress,
    Complete,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Start,
        EventKind::Progress,
        EventKind::Complete,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Progress => "progress",
            EventKind::Complete => "complete",
            EventKind::Error => "error",
        }
    }
}

impl FromStr for EventKind {
    type Err = HookError;

    /// Case-insensitive, with an optional `on` prefix (`onProgress`, `ERROR`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        let name = lowered.strip_prefix("on").unwrap_or(&lowered);

        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| HookError::UnknownEvent {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload passed to hooks
#[derive(Debug, Clone, Copy)]
pub enum UploadEvent<'a> {
    Start {
        files: &'a FileSelection,
        user_data: &'a UserData,
    },
    Progress {
        report: &'a ProgressReport,
        user_data: &'a UserData,
    },
    Complete {
        response: &'a TransportResponse,
        user_data: &'a UserData,
    },
    Error {
        error: &'a UploadError,
        user_data: &'a UserData,
    },
}

impl UploadEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            UploadEvent::Start { .. } => EventKind::Start,
            UploadEvent::Progress { .. } => EventKind::Progress,
            UploadEvent::Complete { .. } => EventKind::Complete,
            UploadEvent::Error { .. } => EventKind::Error,
        }
    }

    pub fn user_data(&self) -> &UserData {
        match self {
            UploadEvent::Start { user_data, .. }
            | UploadEvent::Progress { user_data, .. }
            | UploadEvent::Complete { user_data, .. }
            | UploadEvent::Error { user_data, .. } => user_data,
        }
    }
}

/// What a hook tells the orchestrator to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Proceed,
    Abort,
}

impl Flow {
    pub fn is_abort(&self) -> bool {
        matches!(self, Flow::Abort)
    }
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Proceed
    }
}

/// Only an explicit `false` aborts
impl From<bool> for Flow {
    fn from(proceed: bool) -> Self {
        if proceed { Flow::Proceed } else { Flow::Abort }
    }
}

type Hook = Arc<dyn Fn(&UploadEvent<'_>) -> Flow + Send + Sync>;

/// Registry mapping event kinds to their single callback
#[derive(Clone)]
pub struct EventHub {
    hooks: BTreeMap<EventKind, Hook>,
}

impl EventHub {
    /// Hub with only the default `error` hook, which logs the failure
    pub fn new() -> Self {
        let mut hub = Self::empty();
        hub.set(EventKind::Error, |event: &UploadEvent<'_>| {
            if let UploadEvent::Error { error, .. } = event {
                tracing::error!(kind = error.kind(), "{}", error);
            }
        });
        hub
    }

    /// Hub with no hooks at all
    pub fn empty() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    /// Register a hook by event name, replacing any previous one
    pub fn on<F, R>(&mut self, name: &str, callback: F) -> Result<(), HookError>
    where
        F: Fn(&UploadEvent<'_>) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        let kind = name.parse::<EventKind>()?;
        self.set(kind, callback);
        Ok(())
    }

    pub fn set<F, R>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&UploadEvent<'_>) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        let hook: Hook = Arc::new(move |event: &UploadEvent<'_>| callback(event).into());
        self.hooks.insert(kind, hook);
    }

    /// Remove a hook; returns whether one was registered
    pub fn clear(&mut self, kind: EventKind) -> bool {
        self.hooks.remove(&kind).is_some()
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.hooks.contains_key(&kind)
    }

    /// Invoke the hook for this event; with no hook the answer is `Proceed`
    pub fn dispatch(&self, event: &UploadEvent<'_>) -> Flow {
        match self.hooks.get(&event.kind()) {
            Some(hook) => hook(event),
            None => Flow::Proceed,
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
