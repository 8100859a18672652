// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Daemon task management
//!
//! The daemon wires the register table to the Modbus transport and to the
//! remote control receiver, and runs every long-lived activity as its own
//! task:
//!
//! | Task | Runs on | Period |
//! |------|---------|--------|
//! | Modbus TCP server | tokio | request driven |
//! | Register service loop | tokio | `registers.service_interval_ms` |
//! | Remote command dispatcher | tokio | command driven |
//! | Decode pipeline | blocking thread | `receiver.capture_timeout_ms` polls |
//! | Heartbeat | tokio | 60 s |
//!
//! All tasks watch the shared `running` flag and end once [`Daemon::shutdown`]
//! clears it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{CaptureSourceKind, Config};
use crate::diagnostics::{Diagnostics, SharedDiagnostics};
use crate::modbus::{serve_tcp, HoldingRegisterStore};
use crate::receiver::{
    Burst, CaptureSource, ChannelCapture, DecodePipeline, RemoteCommand, SimulatedRemote,
};
use crate::registers::{RegisterSyncBridge, RegisterTable, SharedRegisterTable, Transport};
use crate::service::{write_initial_text, ControllerCommand, RemoteCommandMirror, ServiceLoop};

/// How often idle tasks check the running flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Interval between two heartbeat log lines
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Bursts buffered between an external capture driver and the decode pipeline
const BURST_QUEUE: usize = 32;

/// Coordinates the background services of the register bridge
///
/// # Fields
///
/// * `tasks` - Handles of every spawned task, awaited by [`Daemon::join`]
/// * `running` - Flag shared with all tasks to coordinate shutdown
///
/// The register table, the transport store and the diagnostic counters are
/// created by [`Daemon::launch`] and can be inspected afterwards.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    diagnostics: SharedDiagnostics,
    table: Option<SharedRegisterTable>,
    store: Option<Arc<HoldingRegisterStore>>,
    modbus_addr: Option<SocketAddr>,
    burst_sender: Option<SyncSender<Burst>>,
    controller_sink: Option<mpsc::Sender<ControllerCommand>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// ```
    /// use rust_register_bridge::daemon::launch_daemon::Daemon;
    ///
    /// let daemon = Daemon::new();
    /// assert!(daemon.register_table().is_none());
    /// ```
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            diagnostics: Diagnostics::shared(),
            table: None,
            store: None,
            modbus_addr: None,
            burst_sender: None,
            controller_sink: None,
        }
    }

    /// Receive the command bits posted by the controller
    ///
    /// Must be called before [`Daemon::launch`]; without a subscriber the
    /// bits are only logged.
    pub fn controller_commands(&mut self, capacity: usize) -> mpsc::Receiver<ControllerCommand> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.controller_sink = Some(tx);
        rx
    }

    /// Launch all configured tasks based on configuration
    ///
    /// The register table is always created and serviced. The Modbus server
    /// and the remote control receiver are started when enabled.
    ///
    /// # Errors
    ///
    /// Fails if the Modbus listener cannot be bound or the initial text of a
    /// field does not fit the table under the `report` bounds policy.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        self.build_register_table(config)?;

        if config.modbus.enabled {
            self.start_modbus_server(config).await?;
        }

        self.start_service_loop(config)?;

        let (command_tx, command_rx) = mpsc::channel(config.receiver.command_queue.max(1));
        self.start_command_dispatcher(config, command_rx)?;
        if config.receiver.enabled {
            self.start_receiver(config, command_tx)?;
        }

        self.start_heartbeat()?;
        Ok(())
    }

    fn table(&self) -> Result<SharedRegisterTable> {
        self.table
            .clone()
            .context("Register table used before the daemon was launched")
    }

    /// Create the transport store, the sync bridge and the register table
    fn build_register_table(&mut self, config: &Config) -> Result<()> {
        let registers = &config.registers;
        info!(
            "Creating register table with {} holding registers ({:?} bounds policy)",
            registers.count, registers.bounds_policy
        );

        let store = HoldingRegisterStore::shared(registers.count);
        let transport: Arc<dyn Transport> = store.clone();
        let bridge = RegisterSyncBridge::new(transport, Arc::clone(&self.diagnostics));
        let table = Arc::new(
            RegisterTable::new(
                usize::from(registers.count),
                registers.bounds_policy,
                Arc::clone(&self.diagnostics),
            )
            .with_bridge(bridge),
        );

        write_initial_text(&table, registers).context("Failed to write initial text fields")?;

        self.store = Some(store);
        self.table = Some(table);
        Ok(())
    }

    /// Bind the Modbus listener and serve the holding registers
    async fn start_modbus_server(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting modbus server on {}:{}",
            config.modbus.address, config.modbus.port
        );
        let store = self
            .store
            .clone()
            .context("Holding register store missing")?;
        let listener = TcpListener::bind((config.modbus.address.as_str(), config.modbus.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind Modbus server to {}:{}",
                    config.modbus.address, config.modbus.port
                )
            })?;
        self.modbus_addr = listener.local_addr().ok();

        let server_handle = tokio::spawn(async move {
            if let Err(e) = serve_tcp(listener, store).await {
                error!("Modbus server error: {}", e);
            }
        });

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                time::sleep(SHUTDOWN_POLL).await;
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();
            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }
            Ok(())
        });

        self.tasks.push(task);
        info!("Modbus server started");
        Ok(())
    }

    /// Periodically pump the transport and relay controller commands
    fn start_service_loop(&mut self, config: &Config) -> Result<()> {
        let period = Duration::from_millis(config.registers.service_interval_ms.max(1));
        debug!("Starting register service loop every {:?}", period);

        let mut service = ServiceLoop::new(self.table()?, config.registers.command_register);
        if let Some(sink) = self.controller_sink.clone() {
            service = service.with_command_sink(sink);
        }

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                service.tick();
            }
            debug!("Register service loop stopped");
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Mirror confirmed remote commands into the register map
    fn start_command_dispatcher(
        &mut self,
        config: &Config,
        mut commands: mpsc::Receiver<RemoteCommand>,
    ) -> Result<()> {
        let mut mirror =
            RemoteCommandMirror::new(self.table()?, config.registers.remote_command_register);

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let mut open = true;
            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    command = commands.recv(), if open => match command {
                        Some(command) => {
                            mirror.publish(&command);
                        }
                        None => open = false,
                    },
                    _ = time::sleep(SHUTDOWN_POLL) => {}
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the decode pipeline on a blocking thread
    fn start_receiver(
        &mut self,
        config: &Config,
        commands: mpsc::Sender<RemoteCommand>,
    ) -> Result<()> {
        match config.receiver.source {
            CaptureSourceKind::Simulated => {
                info!(
                    "Starting remote control receiver with a simulated remote (codes {:?})",
                    config.receiver.simulated.codes
                );
                let remote = SimulatedRemote::new(config.receiver.simulated.clone());
                self.spawn_pipeline(remote, config, commands);
            }
            CaptureSourceKind::External => {
                info!("Starting remote control receiver fed by an external capture driver");
                let (sender, capture) = ChannelCapture::new(BURST_QUEUE);
                self.burst_sender = Some(sender);
                self.spawn_pipeline(capture, config, commands);
            }
        }
        Ok(())
    }

    fn spawn_pipeline<C: CaptureSource + 'static>(
        &mut self,
        capture: C,
        config: &Config,
        commands: mpsc::Sender<RemoteCommand>,
    ) {
        let pipeline = DecodePipeline::new(
            capture,
            &config.receiver,
            commands,
            Arc::clone(&self.diagnostics),
        );
        let running = self.running.clone();
        let task = tokio::task::spawn_blocking(move || {
            pipeline.run(running);
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Start a heartbeat task that logs the diagnostic counters periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let diagnostics = Arc::clone(&self.diagnostics);
        let task = tokio::spawn(async move {
            loop {
                sleep_while_running(&running, HEARTBEAT_INTERVAL).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let snapshot = diagnostics.snapshot();
                if snapshot.has_faults() {
                    warn!("Daemon heartbeat: running with faults {:?}", snapshot);
                } else {
                    debug!("Daemon heartbeat: running {:?}", snapshot);
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// The register table, once launched
    pub fn register_table(&self) -> Option<SharedRegisterTable> {
        self.table.clone()
    }

    /// The transport-side register copy served over Modbus, once launched
    pub fn holding_registers(&self) -> Option<Arc<HoldingRegisterStore>> {
        self.store.clone()
    }

    /// Address the Modbus server actually listens on
    pub fn modbus_local_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Entry point for an external capture driver
    ///
    /// Only available when the receiver runs with the `external` source.
    pub fn burst_sender(&self) -> Option<SyncSender<Burst>> {
        self.burst_sender.clone()
    }

    pub fn diagnostics(&self) -> SharedDiagnostics {
        Arc::clone(&self.diagnostics)
    }

    /// Stop all running tasks
    ///
    /// Only signals the tasks; call [`Daemon::join`] to wait for them.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Panicked or failed tasks are logged, a task hanging for more than five
    /// seconds is abandoned.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        info!("Daemon stopped");
        Ok(())
    }
}

/// Sleep for `duration`, waking early once `running` is cleared
async fn sleep_while_running(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        time::sleep((deadline - now).min(SHUTDOWN_POLL)).await;
    }
}
