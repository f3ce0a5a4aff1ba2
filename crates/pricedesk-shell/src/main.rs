use anyhow::Context;
use clap::Parser;
use pricedesk_core::DEFAULT_MAX_FRAME_BYTES;
use pricedesk_shell::bridge::UiChannel;
use pricedesk_shell::config::{self, Args};
use pricedesk_shell::lifecycle::{LifecycleInput, WindowLifecycle, WindowPhase};
use pricedesk_shell::logging;
use pricedesk_shell::picker::NativeFilePicker;
use pricedesk_shell::shell::{self, ShellCapabilities};
use pricedesk_shell::supervisor::{SupervisorConfig, WorkerSupervisor};
use pricedesk_shell::updater::{HttpReleaseFeed, UpdateChecker, UpdaterHandle};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::load(args)?;
    let _log_guard = logging::init(&config);

    std::fs::create_dir_all(&config.app_data_dir).with_context(|| {
        format!("creating app data dir {}", config.app_data_dir.display())
    })?;

    let (events_tx, _) = broadcast::channel(256);
    let (sup_tx, sup_rx) = mpsc::unbounded_channel();
    let supervisor = Arc::new(WorkerSupervisor::new(
        SupervisorConfig {
            worker_path: config.worker_path.clone(),
            app_data_dir: config.app_data_dir.clone(),
            grace_period: config.grace_period,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        },
        sup_tx,
    ));
    shell::spawn_event_router(sup_rx, events_tx.clone());

    let updater_handle = UpdaterHandle::new(events_tx.clone());
    let caps = ShellCapabilities::new(
        supervisor.clone(),
        events_tx.clone(),
        Arc::new(NativeFilePicker),
        updater_handle.clone(),
    );

    if let Some(feed_url) = config.update_feed.clone() {
        let checker = UpdateChecker::new(
            HttpReleaseFeed::new(feed_url),
            env!("CARGO_PKG_VERSION"),
            config.update_interval,
            updater_handle,
        );
        tokio::spawn(checker.run());
    }

    let mut lifecycle = WindowLifecycle::new(config.ready_gate);
    lifecycle.apply(LifecycleInput::AppReady);

    let mut crash_events = caps.subscribe(UiChannel::WorkerCrashed);
    let mut ready_events = caps.subscribe(UiChannel::WorkerReady);

    match supervisor.start() {
        Ok(()) => {
            lifecycle.apply(LifecycleInput::WorkerSpawned);
        }
        // the crash event is already on its way to the UI; the host stays up
        Err(err) => error!("worker failed to start: {err}"),
    }

    let splash = tokio::time::sleep(config.splash_delay);
    tokio::pin!(splash);
    let mut splash_done = false;

    loop {
        tokio::select! {
            _ = &mut splash, if !splash_done => {
                splash_done = true;
                lifecycle.apply(LifecycleInput::SplashClosed);
                if lifecycle.apply(LifecycleInput::SplashTimerElapsed)
                    && lifecycle.window() == WindowPhase::MainVisible
                {
                    caps.renderer_ready();
                }
            }
            event = ready_events.next() => {
                if event.is_some()
                    && lifecycle.apply(LifecycleInput::WorkerReadyHandshake)
                    && lifecycle.window() == WindowPhase::MainVisible
                {
                    caps.renderer_ready();
                }
            }
            event = crash_events.next() => {
                if event.is_some() {
                    lifecycle.apply(LifecycleInput::WorkerCrashed);
                    info!("worker crashed; waiting for an explicit restart");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                lifecycle.apply(LifecycleInput::QuitRequested);
                break;
            }
        }
    }

    info!("shutting down worker");
    let outcome = supervisor.shutdown().await;
    lifecycle.apply(LifecycleInput::WorkerShutDown);
    info!("worker shutdown: {outcome:?}");
    Ok(())
}
