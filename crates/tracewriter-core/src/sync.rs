//! Debounced save scheduling.
//!
//! [`SaveScheduler`] is the whole concurrency policy of the persistence
//! path, as a pure state machine:
//!
//! ```text
//!            edit                       timer (deadline reached)
//!   Idle ───────────▶ Pending{deadline} ─────────────────────────▶ InFlight{clean}
//!                      ▲   │ edit: deadline = now + debounce            │ edit
//!                      │   └──────┘                                     ▼
//!                      │                                          InFlight{dirty}
//!                      └──────────── response (dirty) ─────────────────┘
//!   InFlight{clean} ── response ──▶ Idle
//! ```
//!
//! At most one save is in flight. Edits during a save only mark it dirty;
//! the trailing save is scheduled when the response arrives. A failed save
//! is not retried: the response moves the machine on exactly like a success.
//!
//! Time is passed in by the caller, so tests drive it with plain `Instant`
//! arithmetic and no runtime.

use std::time::{Duration, Instant};

/// Recommended quiescence window before a save.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing unsaved.
    Idle,
    /// A save is due at `deadline`.
    Pending { deadline: Instant },
    /// A save is running. `dirty` records edits made since it started.
    InFlight { dirty: bool },
}

#[derive(Debug, Clone)]
pub struct SaveScheduler {
    debounce: Duration,
    state: SaveState,
}

impl SaveScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: SaveState::Idle,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn is_idle(&self) -> bool {
        self.state == SaveState::Idle
    }

    /// A local mutation happened.
    pub fn on_edit(&mut self, now: Instant) {
        self.state = match self.state {
            SaveState::Idle | SaveState::Pending { .. } => SaveState::Pending {
                deadline: now + self.debounce,
            },
            SaveState::InFlight { .. } => SaveState::InFlight { dirty: true },
        };
    }

    /// The timer fired. Returns `true` if the caller must start a save now.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        match self.state {
            SaveState::Pending { deadline } if now >= deadline => {
                self.state = SaveState::InFlight { dirty: false };
                true
            }
            _ => false,
        }
    }

    /// The in-flight save finished, successfully or not.
    pub fn on_response(&mut self, now: Instant) {
        self.state = match self.state {
            SaveState::InFlight { dirty: true } => SaveState::Pending {
                deadline: now + self.debounce,
            },
            SaveState::InFlight { dirty: false } => SaveState::Idle,
            other => other,
        };
    }

    /// Make a pending save due immediately.
    pub fn flush(&mut self, now: Instant) {
        if let SaveState::Pending { .. } = self.state {
            self.state = SaveState::Pending { deadline: now };
        }
    }

    /// When the caller should next call [`on_timer`](Self::on_timer).
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SaveState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
