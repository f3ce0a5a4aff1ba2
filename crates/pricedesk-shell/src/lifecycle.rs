use std::fmt;
use tracing::{debug, warn};

/// Application window track. The app is tray-resident: closing the main
/// window hides it, only an explicit quit reaches `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Starting,
    SplashShown,
    MainHidden,
    MainVisible,
    Closed,
}

/// Parallel worker track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Starting,
    Running,
    Crashed,
    Stopped,
}

/// Which signal opens the splash-to-main gate: a fixed delay, or an explicit
/// `ready` handshake frame from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyGate {
    Timer,
    WorkerHandshake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    AppReady,
    SplashClosed,
    SplashTimerElapsed,
    WorkerReadyHandshake,
    MainWindowClosed,
    TrayActivated,
    QuitRequested,
    WorkerSpawned,
    WorkerCrashed,
    WorkerShutDown,
}

impl fmt::Display for LifecycleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleInput::AppReady => "app-ready",
            LifecycleInput::SplashClosed => "splash-closed",
            LifecycleInput::SplashTimerElapsed => "splash-timer-elapsed",
            LifecycleInput::WorkerReadyHandshake => "worker-ready-handshake",
            LifecycleInput::MainWindowClosed => "main-window-closed",
            LifecycleInput::TrayActivated => "tray-activated",
            LifecycleInput::QuitRequested => "quit-requested",
            LifecycleInput::WorkerSpawned => "worker-spawned",
            LifecycleInput::WorkerCrashed => "worker-crashed",
            LifecycleInput::WorkerShutDown => "worker-shut-down",
        };
        f.write_str(name)
    }
}

pub struct WindowLifecycle {
    window: WindowPhase,
    worker: WorkerPhase,
    gate: ReadyGate,
}

impl WindowLifecycle {
    pub fn new(gate: ReadyGate) -> Self {
        Self {
            window: WindowPhase::Starting,
            worker: WorkerPhase::Starting,
            gate,
        }
    }

    pub fn window(&self) -> WindowPhase {
        self.window
    }

    pub fn worker(&self) -> WorkerPhase {
        self.worker
    }

    /// Applies one input; returns true when a phase changed. Inputs that are
    /// illegal in the current phase are logged and ignored, never a panic.
    pub fn apply(&mut self, input: LifecycleInput) -> bool {
        if self.window == WindowPhase::Closed {
            debug!("ignoring {input} after close");
            return false;
        }
        match input {
            LifecycleInput::QuitRequested => self.set_window(WindowPhase::Closed),
            LifecycleInput::AppReady => match self.window {
                WindowPhase::Starting => self.set_window(WindowPhase::SplashShown),
                _ => self.reject(input),
            },
            LifecycleInput::SplashClosed => match self.window {
                WindowPhase::SplashShown => self.set_window(WindowPhase::MainHidden),
                _ => self.reject(input),
            },
            LifecycleInput::SplashTimerElapsed => self.open_gate(ReadyGate::Timer, input),
            LifecycleInput::WorkerReadyHandshake => {
                self.open_gate(ReadyGate::WorkerHandshake, input)
            }
            LifecycleInput::MainWindowClosed => match self.window {
                // tray-resident: the app and the worker stay alive
                WindowPhase::MainVisible => self.set_window(WindowPhase::MainHidden),
                _ => self.reject(input),
            },
            LifecycleInput::TrayActivated => match self.window {
                WindowPhase::MainHidden => self.set_window(WindowPhase::MainVisible),
                _ => self.reject(input),
            },
            LifecycleInput::WorkerSpawned => match self.worker {
                WorkerPhase::Starting => self.set_worker(WorkerPhase::Running),
                _ => self.reject(input),
            },
            LifecycleInput::WorkerCrashed => match self.worker {
                WorkerPhase::Stopped => self.reject(input),
                _ => self.set_worker(WorkerPhase::Crashed),
            },
            LifecycleInput::WorkerShutDown => match self.worker {
                WorkerPhase::Running => self.set_worker(WorkerPhase::Stopped),
                _ => self.reject(input),
            },
        }
    }

    fn open_gate(&mut self, source: ReadyGate, input: LifecycleInput) -> bool {
        if self.gate != source {
            debug!("ignoring {input}: gate is {:?}", self.gate);
            return false;
        }
        match self.window {
            WindowPhase::SplashShown | WindowPhase::MainHidden => {
                self.set_window(WindowPhase::MainVisible)
            }
            _ => self.reject(input),
        }
    }

    fn set_window(&mut self, next: WindowPhase) -> bool {
        debug!("window {:?} -> {next:?}", self.window);
        self.window = next;
        true
    }

    fn set_worker(&mut self, next: WorkerPhase) -> bool {
        debug!("worker {:?} -> {next:?}", self.worker);
        self.worker = next;
        true
    }

    fn reject(&mut self, input: LifecycleInput) -> bool {
        warn!(
            "ignoring {input} in window phase {:?}, worker phase {:?}",
            self.window, self.worker
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_gated_startup_reaches_main_visible() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        assert!(lc.apply(LifecycleInput::AppReady));
        assert_eq!(lc.window(), WindowPhase::SplashShown);
        assert!(lc.apply(LifecycleInput::WorkerSpawned));
        assert!(lc.apply(LifecycleInput::SplashTimerElapsed));
        assert_eq!(lc.window(), WindowPhase::MainVisible);
        assert_eq!(lc.worker(), WorkerPhase::Running);
    }

    #[test]
    fn handshake_gate_ignores_the_timer() {
        let mut lc = WindowLifecycle::new(ReadyGate::WorkerHandshake);
        lc.apply(LifecycleInput::AppReady);
        assert!(!lc.apply(LifecycleInput::SplashTimerElapsed));
        assert_eq!(lc.window(), WindowPhase::SplashShown);
        assert!(lc.apply(LifecycleInput::WorkerReadyHandshake));
        assert_eq!(lc.window(), WindowPhase::MainVisible);
    }

    #[test]
    fn gate_opens_from_main_hidden_after_splash_closes() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        lc.apply(LifecycleInput::AppReady);
        lc.apply(LifecycleInput::SplashClosed);
        assert_eq!(lc.window(), WindowPhase::MainHidden);
        assert!(lc.apply(LifecycleInput::SplashTimerElapsed));
        assert_eq!(lc.window(), WindowPhase::MainVisible);
    }

    #[test]
    fn closing_main_window_does_not_quit() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        lc.apply(LifecycleInput::AppReady);
        lc.apply(LifecycleInput::WorkerSpawned);
        lc.apply(LifecycleInput::SplashTimerElapsed);
        assert!(lc.apply(LifecycleInput::MainWindowClosed));
        assert_eq!(lc.window(), WindowPhase::MainHidden);
        assert_eq!(lc.worker(), WorkerPhase::Running);
        assert!(lc.apply(LifecycleInput::TrayActivated));
        assert_eq!(lc.window(), WindowPhase::MainVisible);
    }

    #[test]
    fn worker_crash_leaves_window_recoverable() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        lc.apply(LifecycleInput::AppReady);
        lc.apply(LifecycleInput::WorkerSpawned);
        lc.apply(LifecycleInput::SplashTimerElapsed);
        assert!(lc.apply(LifecycleInput::WorkerCrashed));
        assert_eq!(lc.worker(), WorkerPhase::Crashed);
        assert_eq!(lc.window(), WindowPhase::MainVisible);
    }

    #[test]
    fn quit_is_reachable_from_any_phase_and_final() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        lc.apply(LifecycleInput::AppReady);
        assert!(lc.apply(LifecycleInput::QuitRequested));
        assert_eq!(lc.window(), WindowPhase::Closed);
        assert!(!lc.apply(LifecycleInput::AppReady));
        assert!(!lc.apply(LifecycleInput::TrayActivated));
        assert_eq!(lc.window(), WindowPhase::Closed);
    }

    #[test]
    fn crash_before_spawn_is_still_a_crash() {
        let mut lc = WindowLifecycle::new(ReadyGate::Timer);
        lc.apply(LifecycleInput::AppReady);
        assert!(lc.apply(LifecycleInput::WorkerCrashed));
        assert_eq!(lc.worker(), WorkerPhase::Crashed);
    }
}
