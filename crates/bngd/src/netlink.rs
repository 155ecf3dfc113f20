//! Netlink access to the kernel routing table
//!
//! Full listings are RTM_GETROUTE dumps on a short-lived socket, run on the
//! blocking pool. Change notifications come from a non-blocking socket joined
//! to the IPv4/IPv6 route multicast groups and polled through tokio's
//! `AsyncFd`, so no thread is parked waiting on the kernel.

#[cfg(target_os = "linux")]
mod linux {
    use crate::error::{BngError, Result};
    use crate::route::{AddressFamilyFilter, KernelRoute, KernelRoutes, RouteEvent};
    use async_trait::async_trait;
    use bng_types::{IpAddress, IpPrefix};
    use netlink_packet_core::{NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload};
    use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage, RouteType};
    use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use tokio::io::unix::AsyncFd;
    use tokio::sync::mpsc;
    use tracing::{debug, instrument, trace, warn};

    /// Netlink group for IPv4 route notifications
    const RTNLGRP_IPV4_ROUTE: u32 = 7;

    /// Netlink group for IPv6 route notifications
    const RTNLGRP_IPV6_ROUTE: u32 = 11;

    /// Main routing table id
    const RT_TABLE_MAIN: u32 = 254;

    /// Receive buffer for the notification socket (1MB)
    const SOCKET_RECV_BUFFER_SIZE: usize = 1024 * 1024;

    /// errno reported when the kernel dropped notifications for this socket
    const ENOBUFS: i32 = 105;

    fn group_mask(group: u32) -> u32 {
        1 << (group - 1)
    }

    fn subscription_groups(family: AddressFamilyFilter) -> u32 {
        match family {
            AddressFamilyFilter::All => {
                group_mask(RTNLGRP_IPV4_ROUTE) | group_mask(RTNLGRP_IPV6_ROUTE)
            }
            AddressFamilyFilter::Ipv4 => group_mask(RTNLGRP_IPV4_ROUTE),
            AddressFamilyFilter::Ipv6 => group_mask(RTNLGRP_IPV6_ROUTE),
        }
    }

    fn kernel_family(family: AddressFamilyFilter) -> AddressFamily {
        match family {
            AddressFamilyFilter::All => AddressFamily::Unspec,
            AddressFamilyFilter::Ipv4 => AddressFamily::Inet,
            AddressFamilyFilter::Ipv6 => AddressFamily::Inet6,
        }
    }

    /// Kernel route source backed by rtnetlink
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NetlinkRouteSource;

    impl NetlinkRouteSource {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl KernelRoutes for NetlinkRouteSource {
        #[instrument(skip(self))]
        async fn list_routes(&self, family: AddressFamilyFilter) -> Result<Vec<KernelRoute>> {
            tokio::task::spawn_blocking(move || dump_routes(family))
                .await
                .map_err(|e| BngError::RouteListing(format!("Dump task failed: {}", e)))?
        }

        #[instrument(skip(self))]
        async fn subscribe(
            &self,
            family: AddressFamilyFilter,
            queue_depth: usize,
        ) -> Result<mpsc::Receiver<RouteEvent>> {
            let mut socket = Socket::new(NETLINK_ROUTE).map_err(|e| {
                BngError::Subscription(format!("Failed to create socket: {}", e))
            })?;
            socket
                .bind(&SocketAddr::new(0, subscription_groups(family)))
                .map_err(|e| BngError::Subscription(format!("Failed to bind socket: {}", e)))?;
            socket.set_non_blocking(true).map_err(|e| {
                BngError::Subscription(format!("Failed to set non-blocking mode: {}", e))
            })?;
            tune_socket(&mut socket);

            let socket = AsyncFd::new(socket).map_err(|e| {
                BngError::Subscription(format!("Failed to create AsyncFd: {}", e))
            })?;

            debug!(?family, "Subscribed to kernel route notifications");

            let (tx, rx) = mpsc::channel(queue_depth);
            tokio::spawn(forward_events(socket, tx));
            Ok(rx)
        }
    }

    /// Enlarges the receive buffer and asks the kernel not to report
    /// overruns as errors. Failures are logged and ignored.
    fn tune_socket(socket: &mut Socket) {
        match socket.set_rx_buf_sz(SOCKET_RECV_BUFFER_SIZE) {
            Ok(()) => debug!(size = SOCKET_RECV_BUFFER_SIZE, "Set socket receive buffer"),
            Err(e) => warn!(error = %e, "Failed to set SO_RCVBUF, using default buffer size"),
        }
        if let Err(e) = socket.set_no_enobufs(true) {
            warn!(error = %e, "Failed to set NETLINK_NO_ENOBUFS");
        }
    }

    /// Receive errors after which the subscription is still usable
    fn is_recoverable(err: &std::io::Error) -> bool {
        err.raw_os_error() == Some(ENOBUFS) || err.kind() == std::io::ErrorKind::Interrupted
    }

    /// Sends an RTM_GETROUTE dump request and collects the replies (blocking)
    fn dump_routes(family: AddressFamilyFilter) -> Result<Vec<KernelRoute>> {
        let mut socket = Socket::new(NETLINK_ROUTE)
            .map_err(|e| BngError::RouteListing(format!("Failed to create socket: {}", e)))?;
        socket
            .bind_auto()
            .map_err(|e| BngError::RouteListing(format!("Failed to bind socket: {}", e)))?;
        socket
            .connect(&SocketAddr::new(0, 0))
            .map_err(|e| BngError::RouteListing(format!("Failed to connect socket: {}", e)))?;

        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_REQUEST | NLM_F_DUMP;

        let mut msg = RouteMessage::default();
        msg.header.address_family = kernel_family(family);
        let payload = RouteNetlinkMessage::GetRoute(msg);
        let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
        packet.finalize();

        let mut buf = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut buf);

        socket
            .send(&buf, 0)
            .map_err(|e| BngError::RouteListing(format!("Failed to send dump request: {}", e)))?;

        let mut routes = Vec::new();
        loop {
            let (bytes, _) = socket
                .recv_from_full()
                .map_err(|e| BngError::RouteListing(format!("Failed to receive: {}", e)))?;

            let mut offset = 0;
            while offset < bytes.len() {
                let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&bytes[offset..])
                    .map_err(|e| {
                        BngError::RouteListing(format!("Failed to parse message: {}", e))
                    })?;

                let len = msg.header.length as usize;
                if len == 0 {
                    break;
                }
                // Align to 4 bytes (netlink alignment requirement)
                offset = (offset + len + 3) & !3;

                match msg.payload {
                    NetlinkPayload::Done(_) => {
                        debug!(count = routes.len(), "Route dump complete");
                        return Ok(routes);
                    }
                    NetlinkPayload::Error(err) => {
                        return Err(BngError::RouteListing(format!(
                            "Kernel rejected dump: {:?}",
                            err
                        )));
                    }
                    NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewRoute(route)) => {
                        if let Some(route) = parse_route(&route) {
                            routes.push(route);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Reads notifications until the receiver is dropped or the socket fails
    async fn forward_events(socket: AsyncFd<Socket>, tx: mpsc::Sender<RouteEvent>) {
        loop {
            let mut guard = tokio::select! {
                _ = tx.closed() => {
                    debug!("Route event receiver dropped, closing subscription");
                    return;
                }
                ready = socket.readable() => match ready {
                    Ok(guard) => guard,
                    Err(e) => {
                        warn!(error = %e, "Route subscription socket failed");
                        return;
                    }
                },
            };

            let bytes = match guard.try_io(|inner| inner.get_ref().recv_from_full()) {
                Ok(Ok((bytes, _))) => bytes,
                Ok(Err(e)) if is_recoverable(&e) => {
                    // Lost notifications are repaired by the next reconcile.
                    warn!(error = %e, "Route notifications dropped by the kernel");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Route subscription receive failed");
                    return;
                }
                // Spurious wakeup, readiness already cleared
                Err(_would_block) => continue,
            };
            drop(guard);

            for event in parse_events(&bytes) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Parse a notification datagram into route events
    fn parse_events(bytes: &[u8]) -> Vec<RouteEvent> {
        let mut events = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let msg = match NetlinkMessage::<RouteNetlinkMessage>::deserialize(&bytes[offset..]) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "Failed to parse route notification");
                    break;
                }
            };

            let len = msg.header.length as usize;
            if len == 0 {
                break;
            }
            offset = (offset + len + 3) & !3;

            let event = match &msg.payload {
                NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewRoute(route)) => {
                    parse_route(route).map(RouteEvent::added)
                }
                NetlinkPayload::InnerMessage(RouteNetlinkMessage::DelRoute(route)) => {
                    parse_route(route).map(RouteEvent::removed)
                }
                _ => None,
            };

            if let Some(event) = event {
                trace!(kind = ?event.kind, route = %event.route, "Route notification");
                events.push(event);
            }
        }

        events
    }

    /// Parse a route message into a route, normalizing a missing destination
    /// to the default prefix of the message's family
    ///
    /// Only unicast-like routes of the main table are mirrored; local,
    /// broadcast and multicast entries and other tables (VRFs, policy
    /// routing) are dropped.
    fn parse_route(msg: &RouteMessage) -> Option<KernelRoute> {
        let mut destination = None;
        let mut gateway = None;
        let mut table = None;

        for attr in &msg.attributes {
            match attr {
                RouteAttribute::Destination(addr) => destination = parse_route_address(addr),
                RouteAttribute::Gateway(addr) => gateway = parse_route_address(addr),
                RouteAttribute::Table(id) => table = Some(*id),
                _ => {}
            }
        }

        // The header only holds 8 bits; ids above 255 show up there as
        // RT_TABLE_COMPAT and live in the attribute.
        let table = table.unwrap_or(u32::from(msg.header.table));
        if table != RT_TABLE_MAIN {
            trace!(table, "Ignoring route outside the main table");
            return None;
        }
        if matches!(
            msg.header.kind,
            RouteType::Local | RouteType::Broadcast | RouteType::Multicast | RouteType::Anycast
        ) {
            trace!(kind = ?msg.header.kind, "Ignoring non-forwarding route");
            return None;
        }

        let destination = match destination {
            Some(addr) => match IpPrefix::new(addr, msg.header.destination_prefix_length) {
                Ok(prefix) => prefix,
                Err(e) => {
                    warn!(error = %e, "Ignoring route with invalid prefix");
                    return None;
                }
            },
            None => match msg.header.address_family {
                AddressFamily::Inet => IpPrefix::DEFAULT_V4,
                AddressFamily::Inet6 => IpPrefix::DEFAULT_V6,
                other => {
                    trace!(family = ?other, "Ignoring non-IP route");
                    return None;
                }
            },
        };

        Some(KernelRoute::new(destination, gateway))
    }

    fn parse_route_address(addr: &RouteAddress) -> Option<IpAddress> {
        match addr {
            RouteAddress::Inet(v4) => Some(IpAddress::from(*v4)),
            RouteAddress::Inet6(v6) => Some(IpAddress::from(*v6)),
            _ => None,
        }
    }

}

#[cfg(target_os = "linux")]
pub use linux::*;

/// Stub implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod stub {
    use crate::error::{BngError, Result};
    use crate::route::{AddressFamilyFilter, KernelRoute, KernelRoutes, RouteEvent};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct NetlinkRouteSource;

    impl NetlinkRouteSource {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl KernelRoutes for NetlinkRouteSource {
        async fn list_routes(&self, _family: AddressFamilyFilter) -> Result<Vec<KernelRoute>> {
            Err(BngError::RouteListing(
                "netlink is only available on Linux".into(),
            ))
        }

        async fn subscribe(
            &self,
            _family: AddressFamilyFilter,
            _queue_depth: usize,
        ) -> Result<mpsc::Receiver<RouteEvent>> {
            Err(BngError::Subscription(
                "netlink is only available on Linux".into(),
            ))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use stub::*;
