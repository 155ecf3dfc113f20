//! RouteSync - keeps the route shadow table consistent with the kernel.
//!
//! The table is seeded from one full listing at startup. Afterwards a single
//! background task applies change notifications in delivery order and, when
//! no notification arrives within the reconcile interval, re-lists the kernel
//! table and merges it so a dropped event is repaired within one interval.

use super::source::KernelRoutes;
use super::table::{RouteDump, RouteShadowTable};
use super::types::{AddressFamilyFilter, RouteEvent};
use crate::error::{BngError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Idle window after which the kernel table is re-listed.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(2);

/// Default capacity of the route event channel.
pub const DEFAULT_EVENT_QUEUE_DEPTH: usize = 1024;

/// Tunables for [`RouteSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSyncOptions {
    pub family: AddressFamilyFilter,
    pub reconcile_interval: Duration,
    pub event_queue_depth: usize,
}

impl Default for RouteSyncOptions {
    fn default() -> Self {
        Self {
            family: AddressFamilyFilter::All,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            event_queue_depth: DEFAULT_EVENT_QUEUE_DEPTH,
        }
    }
}

/// RouteSync - owner and sole writer of a [`RouteShadowTable`].
pub struct RouteSync<S> {
    source: S,
    table: RouteShadowTable,
    options: RouteSyncOptions,
}

impl<S: KernelRoutes> RouteSync<S> {
    /// Builds the table from a full kernel listing.
    ///
    /// A listing failure is returned as-is; the daemon treats it as fatal
    /// because an empty table would silently mis-route.
    #[instrument(skip_all, fields(family = ?options.family))]
    pub async fn initialize(source: S, options: RouteSyncOptions) -> Result<Self> {
        info!("Initializing route cache");

        let routes = source.list_routes(options.family).await?;
        let table = RouteShadowTable::new();
        for route in &routes {
            debug!(route = %route, "Add route");
        }
        table.merge(&routes);

        info!(
            kernel_routes = routes.len(),
            cached = table.len(),
            "Route cache initialized"
        );
        debug!(
            "{}",
            RouteDump {
                title: "Route Cache",
                routes: &table.snapshot(),
            }
        );

        Ok(Self {
            source,
            table,
            options,
        })
    }

    /// Returns a read handle to the table.
    pub fn table(&self) -> RouteShadowTable {
        self.table.clone()
    }

    /// Opens the kernel subscription and starts the update loop on its own task.
    ///
    /// Failure to subscribe is fatal and returned before any task is spawned.
    #[instrument(skip_all)]
    pub async fn spawn(self) -> Result<RouteSyncHandle> {
        let events = self
            .source
            .subscribe(self.options.family, self.options.event_queue_depth)
            .await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let table = self.table.clone();
        let task = tokio::spawn(self.run(events, shutdown_rx));

        Ok(RouteSyncHandle {
            shutdown: shutdown_tx,
            task,
            table,
        })
    }

    /// Runs the update loop until `shutdown` fires or is dropped, or the
    /// event stream ends.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<RouteEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!(
            reconcile_interval_ms = self.options.reconcile_interval.as_millis() as u64,
            "Route update loop started"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Route update loop received shutdown");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("Route subscription closed, stopping update loop");
                        break;
                    };
                    if !self.options.family.matches(&event.route.key()) {
                        trace!(route = %event.route, "Ignoring route of filtered family");
                        continue;
                    }
                    self.table.apply_event(&event);
                }
                _ = tokio::time::sleep(self.options.reconcile_interval) => {
                    debug!(
                        interval_ms = self.options.reconcile_interval.as_millis() as u64,
                        "No route changes within reconcile interval"
                    );
                    self.reconcile().await;
                }
            }
        }

        info!("Route update loop stopped");
    }

    /// Re-lists the kernel table and merges it into the shadow table.
    ///
    /// Returns the number of entries changed. Listing failures here are not
    /// fatal: the table keeps its contents and the next interval retries.
    pub async fn reconcile(&self) -> usize {
        let listing = match self.source.list_routes(self.options.family).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Route reconciliation listing failed");
                return 0;
            }
        };

        let changed = self.table.merge(&listing);
        if changed > 0 {
            info!(changed, "Reconciliation repaired route cache");
        }

        debug!(
            "{}",
            RouteDump {
                title: "Kernel Route Table",
                routes: &listing,
            }
        );
        debug!(
            "{}",
            RouteDump {
                title: "Route Cache",
                routes: &self.table.snapshot(),
            }
        );

        changed
    }
}

/// Handle to a running route update loop.
pub struct RouteSyncHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    table: RouteShadowTable,
}

impl RouteSyncHandle {
    /// Returns a read handle to the table maintained by the loop.
    pub fn table(&self) -> RouteShadowTable {
        self.table.clone()
    }

    /// Returns true once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the shutdown channel and waits for the loop to exit.
    ///
    /// Consumes the handle, so the channel is closed exactly once.
    pub async fn shutdown(self) -> Result<()> {
        // The loop may already have stopped on its own if the subscription closed.
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| BngError::Task(format!("route update loop failed: {}", e)))
    }

    /// Supervises the loop until `signal` completes, then shuts it down.
    ///
    /// The loop must outlive the signal: if it stops on its own first (the
    /// kernel subscription was lost) the table can no longer be kept
    /// current, and a `Subscription` error is returned. An error from
    /// `signal` itself is returned after the loop has been shut down.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let RouteSyncHandle {
            shutdown, mut task, ..
        } = self;

        tokio::select! {
            signalled = signal => {
                let _ = shutdown.send(());
                task.await
                    .map_err(|e| BngError::Task(format!("route update loop failed: {}", e)))?;
                signalled?;
                Ok(())
            }
            joined = &mut task => {
                joined.map_err(|e| BngError::Task(format!("route update loop failed: {}", e)))?;
                Err(BngError::Subscription(
                    "route update loop stopped before shutdown was requested".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::KernelRoute;
    use async_trait::async_trait;
    use bng_types::IpPrefix;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn route(dst: &str, gw: Option<&str>) -> KernelRoute {
        KernelRoute::new(dst.parse().unwrap(), gw.map(|g| g.parse().unwrap()))
    }

    #[derive(Default)]
    struct MockState {
        routes: Mutex<Vec<KernelRoute>>,
        fail_listing: AtomicBool,
        fail_subscribe: AtomicBool,
        list_calls: AtomicUsize,
        events: Mutex<Option<mpsc::Sender<RouteEvent>>>,
    }

    #[derive(Clone, Default)]
    struct MockKernel(Arc<MockState>);

    impl MockKernel {
        fn with_routes(routes: Vec<KernelRoute>) -> Self {
            let mock = Self::default();
            *mock.0.routes.lock() = routes;
            mock
        }

        fn sender(&self) -> mpsc::Sender<RouteEvent> {
            self.0.events.lock().clone().expect("subscribed")
        }
    }

    #[async_trait]
    impl KernelRoutes for MockKernel {
        async fn list_routes(&self, family: AddressFamilyFilter) -> Result<Vec<KernelRoute>> {
            self.0.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_listing.load(Ordering::SeqCst) {
                return Err(BngError::RouteListing("mock listing failure".into()));
            }
            Ok(self
                .0
                .routes
                .lock()
                .iter()
                .filter(|r| family.matches(&r.key()))
                .copied()
                .collect())
        }

        async fn subscribe(
            &self,
            _family: AddressFamilyFilter,
            queue_depth: usize,
        ) -> Result<mpsc::Receiver<RouteEvent>> {
            if self.0.fail_subscribe.load(Ordering::SeqCst) {
                return Err(BngError::Subscription("mock subscribe failure".into()));
            }
            let (tx, rx) = mpsc::channel(queue_depth);
            *self.0.events.lock() = Some(tx);
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn test_initialize_populates_table() {
        let kernel = MockKernel::with_routes(vec![
            route("10.0.0.0/24", Some("1.1.1.1")),
            route("0.0.0.0/0", Some("192.168.0.1")),
        ]);

        let sync = RouteSync::initialize(kernel, RouteSyncOptions::default())
            .await
            .unwrap();
        let table = sync.table();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.resolve_gateway(&"10.0.0.9".parse().unwrap()),
            Some("1.1.1.1".parse().unwrap())
        );
        assert_eq!(
            table.resolve_gateway(&"9.9.9.9".parse().unwrap()),
            Some("192.168.0.1".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_initialize_listing_failure_is_fatal() {
        let kernel = MockKernel::default();
        kernel.0.fail_listing.store(true, Ordering::SeqCst);

        let result = RouteSync::initialize(kernel, RouteSyncOptions::default()).await;
        assert!(matches!(result, Err(BngError::RouteListing(_))));
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_fatal() {
        let kernel = MockKernel::default();
        kernel.0.fail_subscribe.store(true, Ordering::SeqCst);

        let sync = RouteSync::initialize(kernel, RouteSyncOptions::default())
            .await
            .unwrap();
        assert!(matches!(sync.spawn().await, Err(BngError::Subscription(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_applied_in_order() {
        let kernel = MockKernel::with_routes(vec![route("10.0.0.0/24", Some("1.1.1.1"))]);
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();
        let table = handle.table();
        let tx = kernel.sender();

        tx.send(RouteEvent::added(route("10.0.1.0/24", Some("1.1.1.2"))))
            .await
            .unwrap();
        tx.send(RouteEvent::added(route("10.0.1.0/24", Some("1.1.1.3"))))
            .await
            .unwrap();
        tx.send(RouteEvent::removed(route("10.0.0.0/24", None)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            table.get(&"10.0.1.0/24".parse().unwrap()),
            Some(Some("1.1.1.3".parse().unwrap()))
        );
        assert!(!table.contains(&"10.0.0.0/24".parse().unwrap()));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_reconciles() {
        let kernel = MockKernel::with_routes(vec![route("10.0.0.0/24", Some("1.1.1.1"))]);
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();
        let table = handle.table();

        // A route the kernel never announced through an event.
        kernel
            .0
            .routes
            .lock()
            .push(route("172.16.0.0/12", Some("10.0.0.254")));
        assert!(!table.contains(&"172.16.0.0/12".parse().unwrap()));

        tokio::time::sleep(DEFAULT_RECONCILE_INTERVAL + Duration::from_millis(100)).await;

        assert!(kernel.0.list_calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(
            table.get(&"172.16.0.0/12".parse().unwrap()),
            Some(Some("10.0.0.254".parse().unwrap()))
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_failure_keeps_table() {
        let kernel = MockKernel::with_routes(vec![route("10.0.0.0/24", Some("1.1.1.1"))]);
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        kernel.0.fail_listing.store(true, Ordering::SeqCst);

        assert_eq!(sync.reconcile().await, 0);
        assert!(sync.table().contains(&"10.0.0.0/24".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_subscription_closes() {
        let kernel = MockKernel::default();
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();

        kernel.0.events.lock().take();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_finished());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_reports_lost_subscription() {
        let kernel = MockKernel::default();
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();

        kernel.0.events.lock().take();
        let result = handle.run_until(std::future::pending()).await;

        assert!(matches!(result, Err(BngError::Subscription(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_signal_shuts_down() {
        let kernel = MockKernel::with_routes(vec![route("10.0.0.0/24", Some("1.1.1.1"))]);
        let sync = RouteSync::initialize(kernel.clone(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();
        let table = handle.table();

        let signal = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), std::io::Error>(())
        };
        handle.run_until(signal).await.unwrap();

        // Reconcile kept running while the signal was pending.
        assert!(kernel.0.list_calls.load(Ordering::SeqCst) >= 3);
        assert!(table.contains(&"10.0.0.0/24".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_returns_signal_error() {
        let sync = RouteSync::initialize(MockKernel::default(), RouteSyncOptions::default())
            .await
            .unwrap();
        let handle = sync.spawn().await.unwrap();

        let signal = async { Err(std::io::Error::other("signal handler unavailable")) };
        let result = handle.run_until(signal).await;

        assert!(matches!(result, Err(BngError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_family_filter_ignores_other_family_events() {
        let kernel = MockKernel::default();
        let options = RouteSyncOptions {
            family: AddressFamilyFilter::Ipv4,
            ..RouteSyncOptions::default()
        };
        let sync = RouteSync::initialize(kernel.clone(), options).await.unwrap();
        let handle = sync.spawn().await.unwrap();
        let table = handle.table();

        kernel
            .sender()
            .send(RouteEvent::added(route("2001:db8::/32", Some("fe80::1"))))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!table.contains(&"2001:db8::/32".parse::<IpPrefix>().unwrap()));
        handle.shutdown().await.unwrap();
    }
}
