use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, info, trace};

use crate::endpoint::{Bus, BusMessage, SubscriptionSet};
use crate::error::{BusError, Result};

/// The robot stack's default bus group.
pub const DEFAULT_UDPM_URL: &str = "udpm://239.255.76.67:7667?ttl=0";

/// LCM short-message magic, "LC02" big-endian.
const MAGIC_SHORT: u32 = 0x4C43_3032;

/// Largest UDP payload we will emit (IPv4 maximum minus headers).
const MAX_DATAGRAM: usize = 65_507;

/// Short-message header: magic (4) + sequence (4).
const DATAGRAM_HEADER: usize = 8;

/// Longest channel name the wire format admits (NUL-terminated on wire).
const MAX_CHANNEL_LEN: usize = 255;

/// UDP-multicast bus endpoint speaking the LCM udpm short-message format.
///
/// One socket serves both directions: publishes go to the group address,
/// receives are filtered against the subscription set. Fragmented (LC03)
/// traffic is not reassembled; every registered payload fits one
/// short message by orders of magnitude.
pub struct UdpmBus {
    socket: UdpSocket,
    group: SocketAddrV4,
    seq: AtomicU32,
    subscriptions: Mutex<SubscriptionSet>,
}

impl UdpmBus {
    /// Open an endpoint from a `udpm://group:port?ttl=N` URL.
    pub fn open(url: &str) -> Result<Self> {
        let (group, ttl) = parse_udpm_url(url)?;

        let socket = bind_reusable(group.port()).map_err(|source| BusError::Bind {
            port: group.port(),
            source,
        })?;
        socket
            .join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| BusError::Bind {
                port: group.port(),
                source,
            })?;
        socket.set_multicast_ttl_v4(u32::from(ttl))?;
        // Local subscribers (spy, other bridges) live on the same host.
        socket.set_multicast_loop_v4(true)?;

        info!(%group, ttl, "joined bus multicast group");

        Ok(Self {
            socket,
            group,
            seq: AtomicU32::new(0),
            subscriptions: Mutex::new(SubscriptionSet::default()),
        })
    }

    /// The multicast group this endpoint publishes to.
    pub fn group(&self) -> SocketAddrV4 {
        self.group
    }
}

impl Bus for UdpmBus {
    fn subscribe(&self, channel: &str) -> Result<()> {
        let mut subs = self.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subs.insert(channel);
        debug!(channel, "subscribed");
        Ok(())
    }

    fn subscribe_all(&self) -> Result<()> {
        let mut subs = self.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subs.insert_all();
        debug!("subscribed to all channels");
        Ok(())
    }

    fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let datagram = encode_datagram(seq, channel, payload)?;
        self.socket.send_to(&datagram, self.group)?;
        trace!(channel, seq, bytes = payload.len(), "published");
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<BusMessage>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            let received = match self.socket.recv_from(&mut buf) {
                Ok((n, _addr)) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None)
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(BusError::Io(err)),
            };

            let Some((channel, payload)) = decode_datagram(&buf[..received]) else {
                trace!(bytes = received, "ignoring malformed datagram");
                continue;
            };

            let subscribed = {
                let subs = self.subscriptions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                subs.matches(&channel)
            };
            if !subscribed {
                continue;
            }

            return Ok(Some(BusMessage { channel, payload }));
        }
    }
}

/// Encode one short-message datagram.
pub(crate) fn encode_datagram(seq: u32, channel: &str, payload: &[u8]) -> Result<BytesMut> {
    if channel.len() > MAX_CHANNEL_LEN {
        return Err(BusError::ChannelTooLong {
            len: channel.len(),
            max: MAX_CHANNEL_LEN,
        });
    }
    let header = DATAGRAM_HEADER + channel.len() + 1;
    if header + payload.len() > MAX_DATAGRAM {
        return Err(BusError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_DATAGRAM - header,
        });
    }

    let mut datagram = BytesMut::with_capacity(header + payload.len());
    datagram.put_u32(MAGIC_SHORT);
    datagram.put_u32(seq);
    datagram.put_slice(channel.as_bytes());
    datagram.put_u8(0);
    datagram.put_slice(payload);
    Ok(datagram)
}

/// Decode one short-message datagram; `None` for anything malformed or
/// not a short message (fragments, foreign traffic).
pub(crate) fn decode_datagram(datagram: &[u8]) -> Option<(String, Bytes)> {
    if datagram.len() < DATAGRAM_HEADER + 1 {
        return None;
    }
    let mut buf = datagram;
    if buf.get_u32() != MAGIC_SHORT {
        return None;
    }
    let _seq = buf.get_u32();

    let nul = buf.iter().position(|&b| b == 0)?;
    let channel = std::str::from_utf8(&buf[..nul]).ok()?.to_string();
    if channel.is_empty() {
        return None;
    }
    let payload = Bytes::copy_from_slice(&buf[nul + 1..]);
    Some((channel, payload))
}

fn parse_udpm_url(url: &str) -> Result<(SocketAddrV4, u8)> {
    let invalid = |reason| BusError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let rest = url
        .strip_prefix("udpm://")
        .ok_or_else(|| invalid("expected udpm:// scheme"))?;
    let (addr, query) = match rest.split_once('?') {
        Some((addr, query)) => (addr, Some(query)),
        None => (rest, None),
    };

    let (host, port) = addr
        .split_once(':')
        .ok_or_else(|| invalid("expected group:port"))?;
    let group: Ipv4Addr = host.parse().map_err(|_| invalid("bad group address"))?;
    if !group.is_multicast() {
        return Err(invalid("group address is not multicast"));
    }
    let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;

    let mut ttl = 0u8;
    if let Some(query) = query {
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("ttl", value)) => {
                    ttl = value.parse().map_err(|_| invalid("bad ttl"))?;
                }
                _ => return Err(invalid("unknown query parameter")),
            }
        }
    }

    Ok((SocketAddrV4::new(group, port), ttl))
}

/// Bind a UDP socket with address reuse so several processes on one host
/// (bridge, spy) can share the bus port, as LCM does.
fn bind_reusable(port: u16) -> std::io::Result<UdpSocket> {
    use std::os::fd::FromRawFd;

    // SAFETY: fd is a fresh socket owned by this function until handed to
    // UdpSocket::from_raw_fd; sockaddr_in is fully initialized.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let one: libc::c_int = 1;
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const libc::c_int).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            let rc = libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEPORT,
                (&one as *const libc::c_int).cast(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
        }

        let mut addr: libc::sockaddr_in = std::mem::zeroed();
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_port = port.to_be();
        addr.sin_addr.s_addr = u32::from(Ipv4Addr::UNSPECIFIED).to_be();
        let rc = libc::bind(
            fd,
            (&addr as *const libc::sockaddr_in).cast(),
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(UdpSocket::from_raw_fd(fd))
    }
}
