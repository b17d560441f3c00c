use super::types::{exit_code_for, ShutdownReason, EXIT_OK};
use super::SkycamOrchestrator;
use crate::error::Result;
use tokio::signal;
use tracing::{error, info, warn};

impl SkycamOrchestrator {
    /// Run one session to completion and return the process exit code
    pub async fn run(&mut self) -> Result<i32> {
        self.setup_signal_handlers();

        let started = match self.start().await {
            Ok(started) => started,
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.shutdown
                    .request(ShutdownReason::Error(e.to_string()));
                self.shutdown().await;
                return Ok(exit_code_for(&e));
            }
        };

        // The queue closes once every other producer has gone
        self.commands.take();

        info!("Skycam session is running");
        let outcome = started
            .router
            .run(started.commands, started.events)
            .await;

        let exit_code = match outcome {
            Ok(report) => {
                info!(
                    "Session {} recorded {} packets ({} bytes) to {}",
                    report.session_id,
                    report.packets_recorded,
                    report.bytes_recorded,
                    report.recording_path.display()
                );
                info!(
                    "Commands: {} dispatched, {} failed; telemetry reports: {}; decode failures: {}; frames relayed: {}, dropped: {} ({:.1}% delivered)",
                    report.stats.commands_dispatched,
                    report.stats.commands_failed,
                    report.stats.telemetry_reports,
                    report.stats.decode_failures,
                    report.relay.frames_relayed,
                    report.relay.frames_dropped,
                    report.relay.efficiency() * 100.0
                );
                self.shutdown.request(ShutdownReason::InputsClosed);
                EXIT_OK
            }
            Err(e) => {
                error!("Session ended with error: {}", e);
                self.shutdown
                    .request(ShutdownReason::Error(e.to_string()));
                exit_code_for(&e)
            }
        };

        self.shutdown().await;

        info!("Skycam session finished with exit code {}", exit_code);
        Ok(exit_code)
    }

    /// Request shutdown on SIGINT and SIGTERM
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                let token = shutdown.token();
                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        shutdown.request(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let token = shutdown.token();
            tokio::select! {
                _ = token.cancelled() => {}
                result = signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Received SIGINT signal (Ctrl+C)");
                        shutdown.request(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                },
            }
        });
    }
}
