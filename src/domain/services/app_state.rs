#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::domain::models::CyclePhase;
use crate::domain::models::Settings;
use crate::domain::models::Transcript;

/// Runtime context created once at startup and handed to every chat
/// operation by reference.
pub struct AppState {
    pub settings: RwLock<Settings>,
    pub transcript: Mutex<Transcript>,
    in_flight: AtomicBool,
    phase: watch::Sender<CyclePhase>,
}

impl AppState {
    pub fn new(settings: Settings, transcript: Transcript) -> AppState {
        let (phase, _) = watch::channel(CyclePhase::Idle);

        return AppState {
            settings: RwLock::new(settings),
            transcript: Mutex::new(transcript),
            in_flight: AtomicBool::new(false),
            phase,
        };
    }

    pub async fn current_settings(&self) -> Settings {
        return self.settings.read().await.clone();
    }

    pub async fn snapshot(&self) -> Transcript {
        return self.transcript.lock().await.clone();
    }

    pub fn is_in_flight(&self) -> bool {
        return self.in_flight.load(Ordering::SeqCst);
    }

    pub fn phase(&self) -> CyclePhase {
        return *self.phase.borrow();
    }

    pub fn subscribe(&self) -> watch::Receiver<CyclePhase> {
        return self.phase.subscribe();
    }

    pub(crate) fn set_phase(&self, phase: CyclePhase) {
        self.phase.send_replace(phase);
    }

    /// Takes the single writer lock. Returns `None` when it is already held.
    /// The lock is released when the guard drops.
    pub(crate) fn try_lock(&self) -> Option<CycleGuard<'_>> {
        let acquired = self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !acquired {
            return None;
        }

        return Some(CycleGuard { state: self });
    }
}

/// Holds the single writer lock. Dropping it releases the lock even when a
/// cycle is abandoned midway, for example when its future is dropped. The open
/// assistant message is closed and the phase goes back to `Idle`.
pub struct CycleGuard<'a> {
    state: &'a AppState,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        match self.state.transcript.try_lock() {
            Ok(mut transcript) => transcript.close(),
            Err(_) => tracing::warn!("Transcript busy while releasing the cycle lock"),
        }

        self.state.phase.send_if_modified(|phase| {
            if *phase == CyclePhase::Idle {
                return false;
            }

            *phase = CyclePhase::Idle;
            return true;
        });
        self.state.in_flight.store(false, Ordering::SeqCst);
    }
}
