use crate::core::config::TransportConfig;
use crate::core::errors::ExchangeError;
use crate::core::traits::Pinger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveState {
    Idle,
    Ticking,
    Stopped,
}

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveExit {
    Cancelled,
    PingFailed,
    LivenessTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveSettings {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub liveness_window: Duration,
}

impl From<&TransportConfig> for KeepaliveSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            ping_timeout: config.ping_timeout,
            liveness_window: config.liveness_window,
        }
    }
}

/// Pong hook held by the inbound reader.
///
/// It is the only writer of the liveness timestamp; the monitor's ticking
/// loop is the only reader.
#[derive(Debug)]
pub struct PongObserver {
    last_seen: watch::Sender<Instant>,
}

impl PongObserver {
    pub fn observe(&self) {
        self.last_seen.send_replace(Instant::now());
    }
}

/// Handle to a running monitor
#[derive(Debug)]
pub struct KeepaliveHandle {
    state: watch::Receiver<KeepaliveState>,
    task: JoinHandle<KeepaliveExit>,
}

impl KeepaliveHandle {
    pub fn state(&self) -> KeepaliveState {
        *self.state.borrow()
    }

    /// Wait for the monitor to stop and report why
    pub async fn join(self) -> KeepaliveExit {
        self.task.await.unwrap_or(KeepaliveExit::Cancelled)
    }
}

pub struct KeepaliveMonitor<P: Pinger> {
    pinger: Arc<P>,
    settings: KeepaliveSettings,
    state: watch::Sender<KeepaliveState>,
}

impl<P: Pinger> KeepaliveMonitor<P> {
    pub fn new(pinger: Arc<P>, settings: KeepaliveSettings) -> Self {
        let (state, _) = watch::channel(KeepaliveState::Idle);
        Self {
            pinger,
            settings,
            state,
        }
    }

    pub fn state(&self) -> KeepaliveState {
        *self.state.borrow()
    }

    /// Start ticking. Liveness is recorded as "now" at this point.
    ///
    /// When the monitor gives up it publishes the reason on `errors` and
    /// cancels `token`, so the reader and every waiting caller see the
    /// connection die instead of waiting for a read to fail.
    pub fn start(
        self,
        errors: mpsc::Sender<ExchangeError>,
        token: CancellationToken,
    ) -> (KeepaliveHandle, PongObserver) {
        let (last_seen_tx, last_seen) = watch::channel(Instant::now());
        self.state.send_replace(KeepaliveState::Ticking);
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(last_seen, errors, token));

        (
            KeepaliveHandle { state, task },
            PongObserver {
                last_seen: last_seen_tx,
            },
        )
    }

    async fn run(
        self,
        last_seen: watch::Receiver<Instant>,
        errors: mpsc::Sender<ExchangeError>,
        token: CancellationToken,
    ) -> KeepaliveExit {
        let KeepaliveSettings {
            ping_interval,
            ping_timeout,
            liveness_window,
        } = self.settings;
        let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (exit, failure) = loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break (KeepaliveExit::Cancelled, None),
                _ = ticker.tick() => {}
            }

            match tokio::time::timeout(ping_timeout, self.pinger.ping(Vec::new())).await {
                Ok(Ok(())) => trace!("ping sent"),
                Ok(Err(e)) => {
                    break (
                        KeepaliveExit::PingFailed,
                        Some(ExchangeError::PingFailed(e.to_string())),
                    )
                }
                Err(_) => {
                    break (
                        KeepaliveExit::PingFailed,
                        Some(ExchangeError::PingFailed(format!(
                            "ping write exceeded {:?}",
                            ping_timeout
                        ))),
                    )
                }
            }

            let silent_for = last_seen.borrow().elapsed();
            if silent_for > liveness_window {
                break (
                    KeepaliveExit::LivenessTimeout,
                    Some(ExchangeError::KeepaliveTimeout(silent_for)),
                );
            }
        };

        // whoever cancelled the connection already reported its death
        let (exit, failure) = match failure {
            Some(err) if token.is_cancelled() => {
                debug!(error = %err, "ping failed on a connection already torn down");
                (KeepaliveExit::Cancelled, None)
            }
            other => (exit, other),
        };

        self.state.send_replace(KeepaliveState::Stopped);
        match failure {
            Some(err) => {
                error!(error = %err, "keepalive stopped, connection considered dead");
                if errors.try_send(err).is_err() {
                    debug!("error channel unavailable for keepalive failure");
                }
                token.cancel();
            }
            None => debug!("keepalive cancelled"),
        }
        exit
    }
}
