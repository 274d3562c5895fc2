//! Translation of process signals into control-loop intents
//!
//! OS signal registration lives behind [`IntentSource`] so the controller can
//! be driven by synthetic events. A [`SignalRouter`] is built fresh for every
//! run and fires at most once.

use crate::lifecycle::ReloadSlot;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// External interrupt: end this run and exit.
    Terminate,
    /// Hang-up: end this run and load the configuration again.
    Reload,
    /// Programmatic shutdown, same outcome as `Terminate`.
    Stop,
}

/// Source of intents for one run.
///
/// Each call to `subscribe` starts a new listener; notifications that arrived
/// before it are not delivered to it.
pub trait IntentSource: Send + Sync {
    fn subscribe(&self) -> std::io::Result<mpsc::Receiver<Intent>>;
}

/// Listens for SIGINT and SIGHUP.
///
/// Handlers are registered per subscription. A signal that arrives between
/// runs, while the next configuration is loading or its outputs are
/// connecting, reaches no listener and is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

impl IntentSource for OsSignals {
    #[cfg(unix)]
    fn subscribe(&self) -> std::io::Result<mpsc::Receiver<Intent>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut hangup = signal(SignalKind::hangup())?;
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let intent = tokio::select! {
                _ = interrupt.recv() => Intent::Terminate,
                _ = hangup.recv() => Intent::Reload,
                _ = tx.closed() => return,
            };
            let _ = tx.send(intent).await;
        });

        Ok(rx)
    }

    #[cfg(not(unix))]
    fn subscribe(&self) -> std::io::Result<mpsc::Receiver<Intent>> {
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        let _ = tx.send(Intent::Terminate).await;
                    }
                }
                _ = tx.closed() => {}
            }
        });

        Ok(rx)
    }
}

/// Intent source driven by hand, for embedding and tests.
#[derive(Debug)]
pub struct ManualSignals {
    current: Mutex<Option<mpsc::Sender<Intent>>>,
    subscriptions: watch::Sender<usize>,
}

impl ManualSignals {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            subscriptions: watch::channel(0).0,
        }
    }

    /// Deliver `intent` to the current subscriber. Returns false when nobody
    /// is listening, in which case the intent is lost.
    pub fn fire(&self, intent: Intent) -> bool {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match current {
            Some(tx) => tx.try_send(intent).is_ok(),
            None => false,
        }
    }

    /// Number of runs that have subscribed so far.
    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.borrow()
    }

    /// Wait until at least `count` runs have subscribed.
    pub async fn wait_for_subscriptions(&self, count: usize) {
        let mut rx = self.subscriptions.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }
}

impl Default for ManualSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentSource for ManualSignals {
    fn subscribe(&self) -> std::io::Result<mpsc::Receiver<Intent>> {
        let (tx, rx) = mpsc::channel(4);
        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.subscriptions.send_modify(|n| *n += 1);
        Ok(rx)
    }
}

impl<T: IntentSource + ?Sized> IntentSource for Arc<T> {
    fn subscribe(&self) -> std::io::Result<mpsc::Receiver<Intent>> {
        (**self).subscribe()
    }
}

/// Routes the first intent of a run to the reload slot and shutdown token.
pub struct SignalRouter {
    reload: Arc<ReloadSlot>,
    stop: CancellationToken,
    shutdown: CancellationToken,
}

impl SignalRouter {
    /// `stop` is the process-wide programmatic stop request; the shutdown
    /// token is new for this run.
    pub fn new(reload: Arc<ReloadSlot>, stop: CancellationToken) -> Self {
        Self {
            reload,
            stop,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn the watch task. It resolves to the intent that fired, or `None`
    /// if the run was shut down by other means first.
    pub fn arm(self, events: mpsc::Receiver<Intent>) -> JoinHandle<Option<Intent>> {
        tokio::spawn(self.route(events))
    }

    async fn route(self, mut events: mpsc::Receiver<Intent>) -> Option<Intent> {
        let intent = tokio::select! {
            Some(intent) = events.recv() => intent,
            _ = self.stop.cancelled() => Intent::Stop,
            _ = self.shutdown.cancelled() => return None,
        };

        match intent {
            Intent::Reload => {
                info!("Reloading Pulse config");
                self.reload.request().await;
            }
            Intent::Terminate => info!("Received interrupt, shutting down"),
            Intent::Stop => debug!("Stop requested, shutting down"),
        }

        self.shutdown.cancel();
        Some(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_sets_slot_and_shuts_down() {
        let reload = Arc::new(ReloadSlot::new(false));
        let signals = ManualSignals::new();
        let router = SignalRouter::new(reload.clone(), CancellationToken::new());
        let shutdown = router.shutdown_token();

        let task = router.arm(signals.subscribe().unwrap());
        assert!(signals.fire(Intent::Reload));

        assert_eq!(task.await.unwrap(), Some(Intent::Reload));
        assert!(shutdown.is_cancelled());
        assert_eq!(reload.peek().await, Some(true));
    }

    #[tokio::test]
    async fn test_terminate_leaves_slot_alone() {
        let reload = Arc::new(ReloadSlot::new(false));
        let signals = ManualSignals::new();
        let router = SignalRouter::new(reload.clone(), CancellationToken::new());
        let shutdown = router.shutdown_token();

        let task = router.arm(signals.subscribe().unwrap());
        signals.fire(Intent::Terminate);

        assert_eq!(task.await.unwrap(), Some(Intent::Terminate));
        assert!(shutdown.is_cancelled());
        assert_eq!(reload.peek().await, Some(false));
    }

    #[tokio::test]
    async fn test_stop_request() {
        let reload = Arc::new(ReloadSlot::new(false));
        let stop = CancellationToken::new();
        let router = SignalRouter::new(reload.clone(), stop.clone());
        let shutdown = router.shutdown_token();
        let (_tx, rx) = mpsc::channel(1);

        let task = router.arm(rx);
        stop.cancel();

        assert_eq!(task.await.unwrap(), Some(Intent::Stop));
        assert!(shutdown.is_cancelled());
        assert_eq!(reload.peek().await, Some(false));
    }

    #[tokio::test]
    async fn test_router_fires_once() {
        let reload = Arc::new(ReloadSlot::new(false));
        let signals = ManualSignals::new();
        let router = SignalRouter::new(reload.clone(), CancellationToken::new());

        let task = router.arm(signals.subscribe().unwrap());
        signals.fire(Intent::Terminate);
        signals.fire(Intent::Reload);

        assert_eq!(task.await.unwrap(), Some(Intent::Terminate));
        assert_eq!(reload.peek().await, Some(false));
    }

    #[tokio::test]
    async fn test_external_shutdown_disarms() {
        let reload = Arc::new(ReloadSlot::new(false));
        let router = SignalRouter::new(reload, CancellationToken::new());
        let shutdown = router.shutdown_token();
        let (_tx, rx) = mpsc::channel(1);

        let task = router.arm(rx);
        shutdown.cancel();
        assert_eq!(task.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reload_is_logged() {
        let (logs, _guard) = crate::logging::capture::capture_logs();
        let reload = Arc::new(ReloadSlot::new(false));
        let signals = ManualSignals::new();
        let router = SignalRouter::new(reload, CancellationToken::new());

        let events = signals.subscribe().unwrap();
        signals.fire(Intent::Reload);
        assert_eq!(router.route(events).await, Some(Intent::Reload));

        assert!(logs.contents().contains("Reloading Pulse config"));
    }

    #[cfg(unix)]
    fn send_to_self(signal: &str) {
        let status = std::process::Command::new("kill")
            .arg(format!("-{}", signal))
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_os_signals_map_to_intents() {
        use std::time::Duration;

        let mut events = OsSignals.subscribe().unwrap();
        send_to_self("HUP");
        let intent = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert_eq!(intent, Some(Intent::Reload));

        let mut events = OsSignals.subscribe().unwrap();
        send_to_self("INT");
        let intent = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert_eq!(intent, Some(Intent::Terminate));
    }

    #[test]
    fn test_fire_without_subscriber_is_lost() {
        let signals = ManualSignals::new();
        assert!(!signals.fire(Intent::Reload));
        assert_eq!(signals.subscriptions(), 0);
    }
}
