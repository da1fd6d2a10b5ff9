use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::domain::{
    CancellationToken, ClientError, ErrorResponseBody, GenerateRequestBody, GenerateResponseBody,
    ModelSelector,
};
use crate::infra::api_client::{GenerationTransport, TransportResponse};

pub const REVEAL_DELAY: Duration = Duration::from_millis(15);
pub const REVEAL_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealPhase {
    #[default]
    Idle,
    Dispatching,
    AwaitingResult,
    Revealing,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevealSnapshot {
    pub phase: RevealPhase,
    pub displayed: String,
    pub is_loading: bool,
    pub is_typing: bool,
    pub generation: Option<u64>,
}

/// How one update changed the displayed text. Per-character steps carry only
/// the new character; `snapshot` holds the full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayChange {
    Unchanged,
    Appended(char),
    Replaced(String),
}

impl DisplayChange {
    pub fn apply_to(&self, displayed: &mut String) {
        match self {
            Self::Unchanged => {}
            Self::Appended(character) => displayed.push(*character),
            Self::Replaced(text) => displayed.clone_from(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealUpdate {
    pub generation: u64,
    pub phase: RevealPhase,
    pub change: DisplayChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Blank prompt, or another submission is still in flight.
    Ignored,
    Completed,
    Stopped,
    Failed(ClientError),
}

/// Suspends the reveal loop between characters.
pub trait RevealPacer: Send + Sync {
    fn pause(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl RevealPacer for ThreadPacer {
    fn pause(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

pub struct RevealController {
    transport: Arc<dyn GenerationTransport>,
    pacer: Arc<dyn RevealPacer>,
    delay: Duration,
    next_generation: AtomicU64,
    shared: Mutex<SharedState>,
}

#[derive(Default)]
struct SharedState {
    snapshot: RevealSnapshot,
    active: Option<CancellationToken>,
    latest: Option<RevealUpdate>,
    updates: VecDeque<RevealUpdate>,
}

impl SharedState {
    fn owns(&self, token: &CancellationToken) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation() == token.generation())
    }

    fn push_update(&mut self, generation: u64, change: DisplayChange) {
        let update = RevealUpdate {
            generation,
            phase: self.snapshot.phase,
            change,
        };
        self.latest = Some(update.clone());
        self.updates.push_back(update);
    }
}

impl RevealController {
    pub fn new(transport: Arc<dyn GenerationTransport>, pacer: Arc<dyn RevealPacer>) -> Self {
        Self::with_delay(transport, pacer, REVEAL_DELAY)
    }

    pub fn with_delay(
        transport: Arc<dyn GenerationTransport>,
        pacer: Arc<dyn RevealPacer>,
        delay: Duration,
    ) -> Self {
        Self {
            transport,
            pacer,
            delay,
            next_generation: AtomicU64::new(1),
            shared: Mutex::new(SharedState::default()),
        }
    }

    /// Runs one submission to completion on the calling thread. `handle_stop`
    /// may be called from any other thread meanwhile.
    pub fn submit(&self, prompt: &str, model: Option<ModelSelector>) -> RevealOutcome {
        let Some(token) = self.begin(prompt) else {
            return RevealOutcome::Ignored;
        };

        let body = GenerateRequestBody::new(prompt, model);
        let outcome = self.run(&token, &body);
        self.finish(&token, &outcome);
        outcome
    }

    /// Raises the current token's stop flag, then aborts its request. Leaves
    /// whatever text is displayed. Does nothing when no submission is active.
    pub fn handle_stop(&self) {
        let mut shared = self.lock();
        let Some(token) = shared.active.take() else {
            return;
        };

        token.cancel();
        shared.snapshot.is_loading = false;
        shared.snapshot.is_typing = false;
        shared.snapshot.phase = RevealPhase::Idle;
        shared.push_update(token.generation(), DisplayChange::Unchanged);
        info!(generation = token.generation(), "generation stopped by user");
    }

    pub fn snapshot(&self) -> RevealSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn latest_update(&self) -> Option<RevealUpdate> {
        self.lock().latest.clone()
    }

    pub fn drain_updates(&self) -> Vec<RevealUpdate> {
        self.lock().updates.drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().expect("reveal state lock poisoned")
    }

    fn begin(&self, prompt: &str) -> Option<CancellationToken> {
        if prompt.trim().is_empty() {
            return None;
        }

        let mut shared = self.lock();
        if shared.snapshot.is_loading || shared.snapshot.is_typing {
            debug!("submission ignored while a request is in flight");
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new(generation);
        shared.active = Some(token.clone());
        shared.snapshot = RevealSnapshot {
            phase: RevealPhase::Dispatching,
            displayed: String::new(),
            is_loading: true,
            is_typing: false,
            generation: Some(generation),
        };
        shared.push_update(generation, DisplayChange::Replaced(String::new()));
        Some(token)
    }

    fn run(&self, token: &CancellationToken, body: &GenerateRequestBody) -> RevealOutcome {
        let response = match self.transport.send(body, token.abort_signal()) {
            Ok(response) => response,
            Err(error) if error.is_aborted() || token.is_stopped() => {
                return RevealOutcome::Stopped;
            }
            Err(error) => return RevealOutcome::Failed(error),
        };

        if token.is_stopped() || !self.enter_phase(token, RevealPhase::AwaitingResult) {
            return RevealOutcome::Stopped;
        }

        let text = match decode_response(&response) {
            Ok(text) => text,
            Err(error) => return RevealOutcome::Failed(error),
        };

        if token.is_stopped() {
            return RevealOutcome::Stopped;
        }
        if text.is_empty() {
            return RevealOutcome::Completed;
        }
        if !self.enter_phase(token, RevealPhase::Revealing) {
            return RevealOutcome::Stopped;
        }

        for (index, character) in text.chars().enumerate() {
            if token.is_stopped() || !self.append(token, character) {
                debug!(
                    generation = token.generation(),
                    at_char = index,
                    "stop detected, halting reveal"
                );
                return RevealOutcome::Stopped;
            }
            self.pacer.pause(self.delay);
        }

        RevealOutcome::Completed
    }

    fn enter_phase(&self, token: &CancellationToken, phase: RevealPhase) -> bool {
        let mut shared = self.lock();
        if !shared.owns(token) {
            return false;
        }

        shared.snapshot.phase = phase;
        if phase == RevealPhase::Revealing {
            shared.snapshot.is_typing = true;
        }
        shared.push_update(token.generation(), DisplayChange::Unchanged);
        true
    }

    fn append(&self, token: &CancellationToken, character: char) -> bool {
        let mut shared = self.lock();
        if !shared.owns(token) {
            return false;
        }

        shared.snapshot.displayed.push(character);
        shared.push_update(token.generation(), DisplayChange::Appended(character));
        true
    }

    fn finish(&self, token: &CancellationToken, outcome: &RevealOutcome) {
        let mut shared = self.lock();
        if !shared.owns(token) {
            return;
        }

        if let RevealOutcome::Failed(failure) = outcome {
            error!(generation = token.generation(), error = %failure, "generation request failed");
            shared.snapshot.phase = RevealPhase::Errored;
            shared.snapshot.displayed = REVEAL_ERROR_MESSAGE.to_string();
            shared.push_update(
                token.generation(),
                DisplayChange::Replaced(REVEAL_ERROR_MESSAGE.to_string()),
            );
        }

        shared.snapshot.phase = RevealPhase::Idle;
        shared.snapshot.is_loading = false;
        shared.snapshot.is_typing = false;
        shared.active = None;
        shared.push_update(token.generation(), DisplayChange::Unchanged);
    }
}

fn decode_response(response: &TransportResponse) -> Result<String, ClientError> {
    if !response.is_success() {
        let message = serde_json::from_str::<ErrorResponseBody>(&response.body)
            .map(|body| match body.details {
                Some(details) => format!("{}: {details}", body.error),
                None => body.error,
            })
            .unwrap_or_else(|_| response.body.trim().to_string());
        return Err(ClientError::Status {
            status: response.status,
            message,
        });
    }

    serde_json::from_str::<GenerateResponseBody>(&response.body)
        .map(|body| body.result)
        .map_err(|err| ClientError::Decode {
            message: err.to_string(),
        })
}
