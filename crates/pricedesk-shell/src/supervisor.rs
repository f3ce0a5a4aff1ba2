use pricedesk_core::{
    encode_frame, CommandFrame, DecodeReport, EventFrame, NdjsonDecoder, WorkerAction,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("worker already running")]
    AlreadyRunning,
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What the supervisor reports upward. A `Crashed` signal is deliberately
/// generic: stderr activity, a spawn failure and an unexpected exit all look
/// the same to the UI, which presents a recoverable state either way.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Frame(EventFrame),
    Crashed,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub worker_path: PathBuf,
    pub app_data_dir: PathBuf,
    pub grace_period: Duration,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    NotRunning,
    Graceful,
    Forced,
}

struct WorkerHandle {
    writer: mpsc::UnboundedSender<Vec<u8>>,
    kill: oneshot::Sender<()>,
    exited: watch::Receiver<bool>,
}

/// Owns the lifecycle of exactly one external worker process. All other
/// components reach the worker only through `send`; the handle itself never
/// leaves this struct. There is no automatic restart of a dead worker.
pub struct WorkerSupervisor {
    config: SupervisorConfig,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    handle: Arc<Mutex<Option<WorkerHandle>>>,
    shutting_down: Arc<AtomicBool>,
    crash_reported: Arc<AtomicBool>,
}

impl WorkerSupervisor {
    pub fn new(config: SupervisorConfig, events: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        Self {
            config,
            events,
            handle: Arc::new(Mutex::new(None)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            crash_reported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Spawns the worker with the app data directory as its only positional
    /// argument. A spawn failure is reported as a crash event so the host
    /// application stays alive and the UI can offer a retry.
    pub fn start(&self) -> Result<(), SupervisorError> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.shutting_down.store(false, Ordering::SeqCst);
        self.crash_reported.store(false, Ordering::SeqCst);

        let mut command = Command::new(&self.config.worker_path);
        command
            .arg(&self.config.app_data_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("worker spawn failed: {err}");
                let _ = self.events.send(SupervisorEvent::Crashed);
                return Err(SupervisorError::Spawn(err));
            }
        };

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                while let Some(bytes) = writer_rx.recv().await {
                    if let Err(err) = stdin.write_all(&bytes).await {
                        warn!("worker stdin write failed: {err}");
                        break;
                    }
                    if let Err(err) = stdin.flush().await {
                        warn!("worker stdin flush failed: {err}");
                        break;
                    }
                }
                // channel closed or write failed; dropping stdin gives the
                // worker EOF on its input stream
            });
        }

        if let Some(mut stdout) = child.stdout.take() {
            let events = self.events.clone();
            let max_frame_bytes = self.config.max_frame_bytes;
            tokio::spawn(async move {
                let mut decoder = NdjsonDecoder::<EventFrame>::new(max_frame_bytes);
                let mut buffer = [0u8; 8192];
                loop {
                    let read = match stdout.read(&mut buffer).await {
                        Ok(0) => break,
                        Ok(count) => count,
                        Err(_) => break,
                    };
                    dispatch_report(&events, decoder.push_chunk(&buffer[..read]));
                }
                dispatch_report(&events, decoder.finish());
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let events = self.events.clone();
            let shutting_down = self.shutting_down.clone();
            let crash_reported = self.crash_reported.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "worker", "{line}");
                    // stderr activity is a heuristic crash signal, reported
                    // at most once per worker instance
                    if !shutting_down.load(Ordering::SeqCst)
                        && !crash_reported.swap(true, Ordering::SeqCst)
                    {
                        let _ = events.send(SupervisorEvent::Crashed);
                    }
                }
            });
        }

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (exited_tx, exited_rx) = watch::channel(false);
        let slot = self.handle.clone();
        let events = self.events.clone();
        let shutting_down = self.shutting_down.clone();
        let crash_reported = self.crash_reported.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                requested = &mut kill_rx => {
                    if requested.is_ok() {
                        if let Err(err) = child.start_kill() {
                            warn!("worker kill failed: {err}");
                        }
                    }
                    child.wait().await
                }
            };
            match status {
                Ok(status) => info!("worker exited: {status}"),
                Err(err) => warn!("worker wait failed: {err}"),
            }
            if let Ok(mut slot) = slot.lock() {
                slot.take();
            }
            let _ = exited_tx.send(true);
            // the exit code does not distinguish a crash from a clean stop;
            // only an initiated shutdown does
            if !shutting_down.load(Ordering::SeqCst)
                && !crash_reported.swap(true, Ordering::SeqCst)
            {
                let _ = events.send(SupervisorEvent::Crashed);
            }
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(WorkerHandle {
                writer: writer_tx,
                kill: kill_tx,
                exited: exited_rx,
            });
        }
        info!("worker started: {}", self.config.worker_path.display());
        Ok(())
    }

    /// Frames and enqueues one command. Never blocks and never errors to the
    /// caller: with no worker present or a closed stream the command is
    /// logged and dropped.
    pub fn send(&self, action: WorkerAction, data: Value) {
        let frame = CommandFrame::new(action, data);
        let bytes = match encode_frame(&frame, self.config.max_frame_bytes) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("command {action} not encodable: {err}");
                return;
            }
        };
        let Ok(slot) = self.handle.lock() else {
            return;
        };
        match slot.as_ref() {
            Some(handle) => {
                if handle.writer.send(bytes).is_err() {
                    warn!("command {action} dropped: worker stream closed");
                }
            }
            None => warn!("command {action} dropped: worker not running"),
        }
    }

    /// Two-phase shutdown: ask nicely with a framed `shutdown` message and a
    /// closed stdin, then escalate to a kill once the grace period elapses.
    /// At most one kill is ever issued.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.shutting_down.store(true, Ordering::SeqCst);
        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(handle) = handle else {
            return ShutdownOutcome::NotRunning;
        };
        let WorkerHandle {
            writer,
            kill,
            mut exited,
        } = handle;

        let mut escalate = false;
        match encode_frame(
            &CommandFrame::bare(WorkerAction::Shutdown),
            self.config.max_frame_bytes,
        ) {
            Ok(bytes) => {
                if writer.send(bytes).is_err() {
                    warn!("shutdown message undeliverable; forcing termination");
                    escalate = true;
                }
            }
            Err(err) => {
                warn!("shutdown message not encodable: {err}");
                escalate = true;
            }
        }
        drop(writer);

        if !escalate {
            if let Ok(Ok(_)) =
                tokio::time::timeout(self.config.grace_period, exited.wait_for(|done| *done))
                    .await
            {
                info!("worker exited within grace period");
                return ShutdownOutcome::Graceful;
            }
            warn!(
                "worker did not exit within {:?}; sending kill",
                self.config.grace_period
            );
        }

        escalate_or_confirm(kill, exited).await
    }
}

/// The worker can exit right at the grace boundary; report a forced stop
/// only when the kill was actually issued.
async fn escalate_or_confirm(
    kill: oneshot::Sender<()>,
    mut exited: watch::Receiver<bool>,
) -> ShutdownOutcome {
    if *exited.borrow() {
        info!("worker exited before the kill was issued");
        return ShutdownOutcome::Graceful;
    }
    let _ = kill.send(());
    let _ = exited.wait_for(|done| *done).await;
    ShutdownOutcome::Forced
}

fn dispatch_report(
    events: &mpsc::UnboundedSender<SupervisorEvent>,
    report: DecodeReport<EventFrame>,
) {
    for line in report.diagnostics {
        info!(target: "worker", "{line}");
    }
    for err in report.errors {
        warn!(target: "worker", "frame error: {err}");
    }
    for frame in report.frames {
        let _ = events.send(SupervisorEvent::Frame(frame));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pricedesk_core::DEFAULT_MAX_FRAME_BYTES;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("worker.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod script");
        path
    }

    fn supervisor(
        worker: PathBuf,
        data_dir: PathBuf,
        grace_ms: u64,
    ) -> (WorkerSupervisor, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = SupervisorConfig {
            worker_path: worker,
            app_data_dir: data_dir,
            grace_period: Duration::from_millis(grace_ms),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        };
        (WorkerSupervisor::new(config, tx), rx)
    }

    #[tokio::test]
    async fn send_without_worker_is_a_quiet_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (sup, mut rx) = supervisor(
            dir.path().join("worker.sh"),
            dir.path().to_path_buf(),
            3_000,
        );
        sup.send(WorkerAction::Search, json!("aspirin"));
        assert!(!sup.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn spawn_failure_reports_crash_and_keeps_host_alive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (sup, mut rx) = supervisor(
            dir.path().join("missing-worker"),
            dir.path().to_path_buf(),
            3_000,
        );
        assert!(matches!(sup.start(), Err(SupervisorError::Spawn(_))));
        assert_eq!(rx.recv().await, Some(SupervisorEvent::Crashed));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn frames_from_worker_are_dispatched_by_tag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            concat!(
                "printf '{\"type\":\"ready\",\"data\":null}\\n",
                "{\"type\":\"parities\",\"data\":{\"usd\":41.2}}\\n'\n",
                "cat >/dev/null",
            ),
        );
        let (sup, mut rx) = supervisor(script, dir.path().to_path_buf(), 3_000);
        sup.start().expect("start");

        let first = rx.recv().await.expect("first frame");
        let second = rx.recv().await.expect("second frame");
        assert_eq!(
            first,
            SupervisorEvent::Frame(EventFrame {
                kind: "ready".to_string(),
                data: Value::Null,
            })
        );
        assert_eq!(
            second,
            SupervisorEvent::Frame(EventFrame {
                kind: "parities".to_string(),
                data: json!({"usd": 41.2}),
            })
        );

        assert_eq!(sup.shutdown().await, ShutdownOutcome::Graceful);
        assert!(rx.try_recv().is_err(), "clean shutdown must not report a crash");
    }

    #[tokio::test]
    async fn worker_stderr_triggers_exactly_one_crash_signal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "echo boom >&2\necho again >&2\ncat >/dev/null",
        );
        let (sup, mut rx) = supervisor(script, dir.path().to_path_buf(), 3_000);
        sup.start().expect("start");

        assert_eq!(rx.recv().await, Some(SupervisorEvent::Crashed));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err(), "crash must be reported once");
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn unexpected_exit_clears_handle_and_reports_one_crash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "exit 1");
        let (sup, mut rx) = supervisor(script, dir.path().to_path_buf(), 3_000);
        sup.start().expect("start");

        assert_eq!(rx.recv().await, Some(SupervisorEvent::Crashed));
        assert!(!sup.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sup.shutdown().await, ShutdownOutcome::NotRunning);
    }

    #[tokio::test]
    async fn commands_reach_worker_stdin_in_call_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "cat > \"$1/lines.txt\"");
        let (sup, _rx) = supervisor(script, dir.path().to_path_buf(), 3_000);
        sup.start().expect("start");

        sup.send(WorkerAction::Search, json!("aspirin"));
        sup.send(WorkerAction::CancelSearch, Value::Null);
        sup.send(WorkerAction::SaveSettings, json!({"currency": "TRY"}));
        assert_eq!(sup.shutdown().await, ShutdownOutcome::Graceful);

        let written =
            std::fs::read_to_string(dir.path().join("lines.txt")).expect("worker input log");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"action":"search","data":"aspirin"}"#,
                r#"{"action":"cancel_search","data":null}"#,
                r#"{"action":"save_settings","data":{"currency":"TRY"}}"#,
                r#"{"action":"shutdown","data":null}"#,
            ]
        );
    }

    #[tokio::test]
    async fn hung_worker_is_forcibly_terminated_after_grace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "trap '' TERM\nwhile true; do sleep 1; done",
        );
        let (sup, _rx) = supervisor(script, dir.path().to_path_buf(), 200);
        sup.start().expect("start");

        let started = std::time::Instant::now();
        assert_eq!(sup.shutdown().await, ShutdownOutcome::Forced);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn closed_worker_stdin_escalates_without_waiting_out_the_grace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "exec 0<&-\necho '{\"type\":\"ready\",\"data\":null}'\nsleep 10",
        );
        let (sup, mut rx) = supervisor(script, dir.path().to_path_buf(), 10_000);
        sup.start().expect("start");

        // the ready frame guarantees the worker has already closed its stdin
        assert_eq!(
            rx.recv().await,
            Some(SupervisorEvent::Frame(EventFrame {
                kind: "ready".to_string(),
                data: Value::Null,
            }))
        );
        sup.send(WorkerAction::GetParities, Value::Null);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        assert_eq!(sup.shutdown().await, ShutdownOutcome::Forced);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "undeliverable shutdown must escalate immediately"
        );
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn exit_at_the_grace_boundary_is_not_reported_forced() {
        let (kill_tx, mut kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        exited_tx.send(true).expect("mark exited");

        assert_eq!(
            escalate_or_confirm(kill_tx, exited_rx).await,
            ShutdownOutcome::Graceful
        );
        assert!(
            kill_rx.try_recv().is_err(),
            "no kill may be issued after the worker exited"
        );
    }

    #[tokio::test]
    async fn escalation_kills_a_worker_still_running_after_grace() {
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let outcome = tokio::spawn(escalate_or_confirm(kill_tx, exited_rx));

        kill_rx.await.expect("kill request");
        exited_tx.send(true).expect("mark exited");
        assert_eq!(outcome.await.expect("join"), ShutdownOutcome::Forced);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "cat >/dev/null");
        let (sup, _rx) = supervisor(script, dir.path().to_path_buf(), 3_000);
        sup.start().expect("start");
        assert!(matches!(
            sup.start(),
            Err(SupervisorError::AlreadyRunning)
        ));
        sup.shutdown().await;
    }
}
