use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use botlink_bus::{Bus, BusMessage};
use botlink_frame::{Frame, FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use botlink_link::{LinkStream, SerialLink, DEFAULT_BAUD};
use botlink_msg::{Message, Timesync, Topic, TopicRegistry};
use tracing::{debug, info, trace, warn};

use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::stats::BridgeStats;

/// How often the outbound loop wakes to check timers and shutdown even
/// when the bus is quiet.
const OUTBOUND_TICK: Duration = Duration::from_millis(100);

/// Bridge runtime configuration. All of it comes from startup flags and
/// is never re-read at runtime.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Serial endpoint path (device node or socket).
    pub link_path: PathBuf,
    /// Baud rate for tty endpoints.
    pub baud: u32,
    /// Period of the timer-driven timesync topic.
    pub timesync_period: Duration,
    /// Bound on every link read, so shutdown is observed between frames.
    pub read_timeout: Duration,
    /// Treat the link as down when no valid frame arrives for this long.
    /// `None` disables the health check.
    pub link_timeout: Option<Duration>,
    /// Delay before reopening a lost link.
    pub reconnect_backoff: Duration,
    /// Serialize transport reads and writes behind one guard.
    pub half_duplex: bool,
    /// Maximum frame payload accepted or produced.
    pub max_payload: usize,
}

impl BridgeConfig {
    pub fn new(link_path: impl Into<PathBuf>) -> Self {
        Self {
            link_path: link_path.into(),
            baud: DEFAULT_BAUD,
            timesync_period: Duration::from_secs(1),
            read_timeout: Duration::from_millis(100),
            link_timeout: Some(Duration::from_secs(5)),
            reconnect_backoff: Duration::from_secs(1),
            half_duplex: false,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// The bridge process core: owns the dispatch table, the bus endpoint,
/// and the session loop over the serial link.
pub struct Bridge<B> {
    dispatch: DispatchTable,
    timesync: Option<Topic>,
    bus: B,
    config: BridgeConfig,
    stats: Arc<BridgeStats>,
}

impl<B: Bus> Bridge<B> {
    /// Build the bridge and register its bus subscriptions.
    ///
    /// The registry has already been validated by construction; this adds
    /// no per-message checks later.
    pub fn new(registry: Arc<TopicRegistry>, bus: B, config: BridgeConfig) -> Result<Self> {
        let dispatch = DispatchTable::new(registry);
        for topic in dispatch.subscriptions() {
            bus.subscribe(topic.channel)?;
            debug!(channel = topic.channel, id = topic.id, "bridge subscription");
        }
        let timesync = dispatch.timesync();

        Ok(Self {
            dispatch,
            timesync,
            bus,
            config,
            stats: Arc::new(BridgeStats::default()),
        })
    }

    /// Shared handle to the bridge counters.
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Run until shutdown is requested.
    ///
    /// A lost link suspends both flows, drops all session state (no
    /// queued backlog, at-most-once), and reconnects after the configured
    /// backoff.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<()> {
        let mut sessions = 0usize;

        while !shutdown.load(Ordering::SeqCst) {
            match SerialLink::open(&self.config.link_path, self.config.baud) {
                Ok(link) => {
                    if sessions > 0 {
                        self.stats.record_reconnect();
                        info!(path = ?self.config.link_path, "link reconnected");
                    }
                    sessions += 1;
                    self.run_session(link, shutdown)?;
                }
                Err(err) => {
                    warn!(%err, "link open failed, retrying");
                }
            }

            sleep_observing(self.config.reconnect_backoff, shutdown);
        }

        Ok(())
    }

    /// Drive one link session until shutdown or transport loss.
    pub fn run_session(&self, link: LinkStream, shutdown: &AtomicBool) -> Result<()> {
        link.set_read_timeout(Some(self.config.read_timeout))?;
        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload,
        };
        let mut reader = FrameReader::with_config(link.try_clone()?, frame_config.clone());
        let mut writer = FrameWriter::with_config(link, frame_config);

        let session = SessionState::new(self.config.half_duplex);
        info!(path = ?self.config.link_path, "link session started");

        std::thread::scope(|scope| {
            scope.spawn(|| self.inbound_loop(&mut reader, &session, shutdown));
            self.outbound_loop(&mut writer, &session, shutdown);
        });

        info!(path = ?self.config.link_path, "link session ended");
        Ok(())
    }

    /// Inbound flow: read frames off the link, decode, publish.
    ///
    /// Every failure path — bad framing, unknown topic, schema mismatch —
    /// drops the one offending frame and returns the loop to scanning for
    /// the next marker. Only a transport failure ends the session.
    fn inbound_loop(
        &self,
        reader: &mut FrameReader<LinkStream>,
        session: &SessionState,
        shutdown: &AtomicBool,
    ) {
        while !shutdown.load(Ordering::SeqCst) && !session.is_down() {
            let polled = {
                let _io = session.io_guard();
                reader.poll_frame()
            };
            match polled {
                Ok(Some(frame)) => {
                    session.mark_frame_seen();
                    self.stats.record_frame_in(frame.wire_size());
                    self.handle_inbound(frame);
                }
                Ok(None) => {} // quiet tick
                Err(err) if err.is_framing() => {
                    self.stats.record_framing_error();
                    warn!(%err, "resynchronizing");
                }
                Err(err) => {
                    warn!(%err, "link read failed");
                    session.mark_down();
                }
            }
        }
    }

    fn handle_inbound(&self, frame: Frame) {
        let topic = match self.dispatch.route_inbound(frame.topic) {
            Ok(topic) => topic,
            Err(err) => {
                self.stats.record_unknown_topic();
                warn!(%err, "dropping frame");
                return;
            }
        };

        let message = match Message::decode(topic.kind, &frame.payload) {
            Ok(message) => message,
            Err(err) => {
                self.stats.record_schema_mismatch();
                warn!(channel = topic.channel, %err, "dropping frame");
                return;
            }
        };

        // The payload just validated byte-exact against the schema, so
        // republishing the original bytes equals re-encoding the record.
        match self.bus.publish(topic.channel, &frame.payload) {
            Ok(()) => {
                self.stats.record_published();
                trace!(
                    channel = topic.channel,
                    utime = message.utime(),
                    "republished"
                );
            }
            Err(err) => {
                self.stats.record_bus_error();
                warn!(channel = topic.channel, %err, "bus publish failed");
            }
        }
    }

    /// Outbound flow: subscribed bus messages → validate → frame → link,
    /// plus the timer-driven timesync topic and the link-health check.
    fn outbound_loop(
        &self,
        writer: &mut FrameWriter<LinkStream>,
        session: &SessionState,
        shutdown: &AtomicBool,
    ) {
        // First emission at session start establishes the shared time base.
        let mut next_timesync = Instant::now();

        while !shutdown.load(Ordering::SeqCst) && !session.is_down() {
            if self.timesync.is_some() && Instant::now() >= next_timesync {
                self.send_timesync(writer, session);
                next_timesync = Instant::now() + self.config.timesync_period;
            }

            if let Some(link_timeout) = self.config.link_timeout {
                if session.since_last_frame() > link_timeout {
                    warn!(?link_timeout, "no valid frame within link timeout");
                    session.mark_down();
                    break;
                }
            }

            let wait = if self.timesync.is_some() {
                next_timesync
                    .saturating_duration_since(Instant::now())
                    .min(OUTBOUND_TICK)
            } else {
                OUTBOUND_TICK
            };
            match self.bus.recv_timeout(wait) {
                Ok(Some(bus_message)) => self.handle_outbound(writer, session, bus_message),
                Ok(None) => {} // quiet tick
                Err(err) => {
                    self.stats.record_bus_error();
                    warn!(%err, "bus receive failed");
                }
            }
        }
    }

    fn handle_outbound(
        &self,
        writer: &mut FrameWriter<LinkStream>,
        session: &SessionState,
        bus_message: BusMessage,
    ) {
        let topic = match self.dispatch.route_outbound(&bus_message.channel) {
            Ok(topic) => topic,
            Err(err) => {
                self.stats.record_unknown_channel();
                warn!(%err, "dropping message");
                return;
            }
        };

        if let Err(err) = Message::decode(topic.kind, &bus_message.payload) {
            self.stats.record_schema_mismatch();
            warn!(channel = topic.channel, %err, "dropping message");
            return;
        }

        let written = {
            let _io = session.io_guard();
            writer.send(topic.id, &bus_message.payload)
        };
        match written {
            Ok(()) => {
                self.stats
                    .record_frame_out(botlink_frame::FRAME_OVERHEAD + bus_message.payload.len());
                trace!(channel = topic.channel, id = topic.id, "framed to link");
            }
            Err(err) => {
                warn!(channel = topic.channel, %err, "link write failed");
                session.mark_down();
            }
        }
    }

    fn send_timesync(&self, writer: &mut FrameWriter<LinkStream>, session: &SessionState) {
        let Some(topic) = self.timesync else {
            return;
        };

        let message = Message::Timesync(Timesync {
            utime: host_clock_micros(),
        });
        let payload = message.encode();

        let written = {
            let _io = session.io_guard();
            writer.send(topic.id, &payload)
        };
        match written {
            Ok(()) => {
                self.stats.record_timesync();
                self.stats
                    .record_frame_out(botlink_frame::FRAME_OVERHEAD + payload.len());
                trace!(utime = message.utime(), "timesync sent");
            }
            Err(err) => {
                warn!(%err, "timesync write failed");
                session.mark_down();
            }
        }
    }
}

/// Shared per-session state: the down flag both loops poll, the last
/// valid-frame instant for the health check, and the optional half-duplex
/// I/O guard.
struct SessionState {
    down: AtomicBool,
    last_frame: Mutex<Instant>,
    io_guard: Option<Mutex<()>>,
}

impl SessionState {
    fn new(half_duplex: bool) -> Self {
        Self {
            down: AtomicBool::new(false),
            last_frame: Mutex::new(Instant::now()),
            io_guard: half_duplex.then(|| Mutex::new(())),
        }
    }

    fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    fn mark_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    fn mark_frame_seen(&self) {
        *lock(&self.last_frame) = Instant::now();
    }

    fn since_last_frame(&self) -> Duration {
        lock(&self.last_frame).elapsed()
    }

    /// Held around each transport syscall region on half-duplex links,
    /// never around message processing.
    fn io_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.io_guard.as_ref().map(lock)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn host_clock_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as i64)
        .unwrap_or_default()
}

fn sleep_observing(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(Duration::from_millis(50)));
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use botlink_bus::{LoopbackBus, LoopbackHub};
    use botlink_frame::encode_frame;
    use botlink_msg::{channel, topic_id, MessageKind, Pose2D, Twist2D};
    use bytes::BytesMut;

    use super::*;

    struct Harness {
        dir: PathBuf,
        listener: UnixListener,
        hub: Arc<LoopbackHub>,
        bridge: Arc<Bridge<LoopbackBus>>,
        shutdown: Arc<AtomicBool>,
        runner: Option<std::thread::JoinHandle<()>>,
    }

    impl Harness {
        fn start() -> Self {
            let dir = std::env::temp_dir().join(format!(
                "botlink-bridge-{}-{}",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .expect("time should be after epoch")
                    .as_nanos()
            ));
            std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
            let sock_path = dir.join("link.sock");
            let listener = UnixListener::bind(&sock_path).expect("listener should bind");

            let mut config = BridgeConfig::new(&sock_path);
            config.read_timeout = Duration::from_millis(20);
            config.reconnect_backoff = Duration::from_millis(50);
            // Keep the timers out of the way unless a test wants them.
            config.timesync_period = Duration::from_secs(3600);
            config.link_timeout = None;

            let hub = LoopbackHub::new();
            let registry = Arc::new(TopicRegistry::mbot().expect("registry should validate"));
            let bridge =
                Arc::new(Bridge::new(registry, hub.endpoint(), config).expect("bridge should build"));

            let shutdown = Arc::new(AtomicBool::new(false));
            let runner = {
                let bridge = Arc::clone(&bridge);
                let shutdown = Arc::clone(&shutdown);
                std::thread::spawn(move || {
                    bridge.run(&shutdown).expect("bridge run should not error");
                })
            };

            Self {
                dir,
                listener,
                hub,
                bridge,
                shutdown,
                runner: Some(runner),
            }
        }

        fn accept_device(&self) -> UnixStream {
            let (stream, _addr) = self.listener.accept().expect("bridge should connect");
            stream
        }
    }

    /// Read device-bound frames until one matches `topic`, skipping the
    /// session-start timesync.
    fn read_frame_on(reader: &mut FrameReader<UnixStream>, topic: u16) -> Frame {
        loop {
            let frame = reader.read_frame().expect("device should receive a frame");
            if frame.topic == topic {
                return frame;
            }
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::SeqCst);
            if let Some(runner) = self.runner.take() {
                let _ = runner.join();
            }
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn odometry_payload() -> (Pose2D, BytesMut) {
        let pose = Pose2D {
            utime: 1_000_017,
            x: 0.25,
            y: -1.5,
            theta: 0.7,
        };
        let mut wire = BytesMut::new();
        encode_frame(
            topic_id::ODOMETRY,
            &Message::Pose2D(pose).encode(),
            &mut wire,
        )
        .expect("frame should encode");
        (pose, wire)
    }

    #[test]
    fn inbound_frame_is_published_once_with_decoded_fields() {
        let harness = Harness::start();
        let observer = harness.hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");

        let mut device = harness.accept_device();
        let (pose, wire) = odometry_payload();
        std::io::Write::write_all(&mut device, &wire).expect("inject frame");

        let published = observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .expect("exactly one publication");
        assert_eq!(published.channel, channel::ODOMETRY);
        let decoded = Message::decode(MessageKind::Pose2D, &published.payload).expect("decode");
        assert_eq!(decoded, Message::Pose2D(pose));

        // Exactly one: nothing else arrives.
        assert!(observer
            .recv_timeout(Duration::from_millis(100))
            .expect("bus receive")
            .is_none());
        assert_eq!(harness.bridge.stats().snapshot().published, 1);
    }

    #[test]
    fn unknown_topic_is_dropped_and_processing_continues() {
        let harness = Harness::start();
        let observer = harness.hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");

        let mut device = harness.accept_device();

        let mut wire = BytesMut::new();
        encode_frame(99, b"mystery", &mut wire).expect("frame should encode");
        let (pose, valid) = odometry_payload();
        wire.extend_from_slice(&valid);
        std::io::Write::write_all(&mut device, &wire).expect("inject frames");

        let published = observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .expect("valid frame should still publish");
        let decoded = Message::decode(MessageKind::Pose2D, &published.payload).expect("decode");
        assert_eq!(decoded, Message::Pose2D(pose));

        let stats = harness.bridge.stats().snapshot();
        assert_eq!(stats.unknown_topics, 1);
        assert_eq!(stats.published, 1);
    }

    #[test]
    fn corrupt_frame_publishes_nothing_and_stream_recovers() {
        let harness = Harness::start();
        let observer = harness.hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");

        let mut device = harness.accept_device();

        let (pose, mut corrupt) = odometry_payload();
        let flip_at = corrupt.len() - 4; // payload byte, breaks the checksum
        corrupt[flip_at] ^= 0xFF;
        let (_, valid) = odometry_payload();
        corrupt.extend_from_slice(&valid);
        std::io::Write::write_all(&mut device, &corrupt).expect("inject frames");

        let published = observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .expect("stream should resynchronize");
        let decoded = Message::decode(MessageKind::Pose2D, &published.payload).expect("decode");
        assert_eq!(decoded, Message::Pose2D(pose));

        let stats = harness.bridge.stats().snapshot();
        assert!(stats.framing_errors >= 1);
        assert_eq!(stats.published, 1);
    }

    #[test]
    fn schema_mismatch_is_dropped_and_counted() {
        let harness = Harness::start();
        let observer = harness.hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");

        let mut device = harness.accept_device();

        // Valid frame, wrong payload length for the odometry schema.
        let mut wire = BytesMut::new();
        encode_frame(topic_id::ODOMETRY, &[0u8; 8], &mut wire).expect("frame should encode");
        std::io::Write::write_all(&mut device, &wire).expect("inject frame");

        assert!(observer
            .recv_timeout(Duration::from_millis(300))
            .expect("bus receive")
            .is_none());
        assert_eq!(harness.bridge.stats().snapshot().schema_mismatches, 1);
    }

    #[test]
    fn bus_command_is_framed_to_the_device() {
        let harness = Harness::start();
        let commander = harness.hub.endpoint();

        let device = harness.accept_device();
        let mut reader = FrameReader::new(device.try_clone().expect("clone device stream"));

        let cmd = Twist2D {
            utime: 55,
            vx: 0.4,
            vy: 0.0,
            wz: -0.9,
        };
        commander
            .publish(channel::VEL_CMD, &Message::Twist2D(cmd).encode())
            .expect("publish command");

        let frame = read_frame_on(&mut reader, topic_id::VEL_CMD);
        let decoded = Message::decode(MessageKind::Twist2D, &frame.payload).expect("decode");
        assert_eq!(decoded, Message::Twist2D(cmd));
    }

    #[test]
    fn unknown_bus_channel_is_dropped_and_counted() {
        // A bus endpoint with coarser filtering (regex subscriptions,
        // spy-mode wildcards) can hand the bridge channels outside the
        // registry; pre-subscribing the bridge's endpoint simulates that.
        let dir = std::env::temp_dir().join(format!(
            "botlink-unknown-channel-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("link.sock");
        let listener = UnixListener::bind(&sock_path).expect("listener should bind");

        let mut config = BridgeConfig::new(&sock_path);
        config.read_timeout = Duration::from_millis(20);
        config.timesync_period = Duration::from_secs(3600);
        config.link_timeout = None;

        let hub = LoopbackHub::new();
        let endpoint = hub.endpoint();
        endpoint.subscribe("MBOT_BOGUS").expect("subscribe");
        let registry = Arc::new(TopicRegistry::mbot().expect("registry should validate"));
        let bridge =
            Arc::new(Bridge::new(registry, endpoint, config).expect("bridge should build"));
        let shutdown = Arc::new(AtomicBool::new(false));

        let runner = {
            let bridge = Arc::clone(&bridge);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || bridge.run(&shutdown).expect("run"))
        };
        let (_device, _addr) = listener.accept().expect("bridge should connect");

        let commander = hub.endpoint();
        commander
            .publish("MBOT_BOGUS", b"noise")
            .expect("publish noise");

        wait_for(Duration::from_secs(2), || {
            bridge.stats().snapshot().unknown_channels == 1
        });

        shutdown.store(true, Ordering::SeqCst);
        runner.join().expect("runner");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn timesync_is_timer_driven() {
        let dir = std::env::temp_dir().join(format!(
            "botlink-timesync-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("link.sock");
        let listener = UnixListener::bind(&sock_path).expect("listener should bind");

        let mut config = BridgeConfig::new(&sock_path);
        config.read_timeout = Duration::from_millis(20);
        config.timesync_period = Duration::from_millis(50);
        config.link_timeout = None;

        let hub = LoopbackHub::new();
        let registry = Arc::new(TopicRegistry::mbot().expect("registry should validate"));
        let bridge =
            Arc::new(Bridge::new(registry, hub.endpoint(), config).expect("bridge should build"));
        let shutdown = Arc::new(AtomicBool::new(false));

        let runner = {
            let bridge = Arc::clone(&bridge);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || bridge.run(&shutdown).expect("run"))
        };

        let (device, _addr) = listener.accept().expect("bridge should connect");
        let mut reader = FrameReader::new(device);

        for _ in 0..3 {
            let frame = reader.read_frame().expect("timesync frame");
            assert_eq!(frame.topic, topic_id::TIMESYNC);
            let decoded =
                Message::decode(MessageKind::Timesync, &frame.payload).expect("decode timesync");
            assert!(decoded.utime() > 0);
        }
        assert!(bridge.stats().snapshot().timesyncs_sent >= 3);

        shutdown.store(true, Ordering::SeqCst);
        runner.join().expect("runner");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn disconnect_then_reconnect_resumes_without_replay() {
        let harness = Harness::start();
        let observer = harness.hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");

        let mut device = harness.accept_device();
        let (_, wire) = odometry_payload();
        std::io::Write::write_all(&mut device, &wire).expect("inject frame");
        assert!(observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .is_some());

        // Half a frame, then the link dies.
        std::io::Write::write_all(&mut device, &wire[..wire.len() / 2]).expect("partial frame");
        drop(device);

        let mut device = harness.accept_device();
        // No replay of pre-disconnect traffic.
        assert!(observer
            .recv_timeout(Duration::from_millis(200))
            .expect("bus receive")
            .is_none());

        let (pose, wire) = odometry_payload();
        std::io::Write::write_all(&mut device, &wire).expect("inject post-reconnect frame");
        let published = observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .expect("processing should resume");
        let decoded = Message::decode(MessageKind::Pose2D, &published.payload).expect("decode");
        assert_eq!(decoded, Message::Pose2D(pose));

        let stats = harness.bridge.stats().snapshot();
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.published, 2);
    }

    #[test]
    fn half_duplex_session_still_bridges_both_ways() {
        let dir = std::env::temp_dir().join(format!(
            "botlink-halfduplex-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("link.sock");
        let listener = UnixListener::bind(&sock_path).expect("listener should bind");

        let mut config = BridgeConfig::new(&sock_path);
        config.read_timeout = Duration::from_millis(20);
        config.timesync_period = Duration::from_secs(3600);
        config.link_timeout = None;
        config.half_duplex = true;

        let hub = LoopbackHub::new();
        let registry = Arc::new(TopicRegistry::mbot().expect("registry should validate"));
        let bridge =
            Arc::new(Bridge::new(registry, hub.endpoint(), config).expect("bridge should build"));
        let shutdown = Arc::new(AtomicBool::new(false));
        let observer = hub.endpoint();
        observer.subscribe(channel::ODOMETRY).expect("subscribe");
        let commander = hub.endpoint();

        let runner = {
            let bridge = Arc::clone(&bridge);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || bridge.run(&shutdown).expect("run"))
        };

        let (mut device, _addr) = listener.accept().expect("bridge should connect");
        let mut reader = FrameReader::new(device.try_clone().expect("clone device stream"));

        let (pose, wire) = odometry_payload();
        std::io::Write::write_all(&mut device, &wire).expect("inject frame");
        let published = observer
            .recv_timeout(Duration::from_secs(2))
            .expect("bus receive")
            .expect("publication");
        assert_eq!(
            Message::decode(MessageKind::Pose2D, &published.payload).expect("decode"),
            Message::Pose2D(pose)
        );

        let cmd = Twist2D {
            utime: 1,
            vx: 0.1,
            vy: 0.0,
            wz: 0.0,
        };
        commander
            .publish(channel::VEL_CMD, &Message::Twist2D(cmd).encode())
            .expect("publish command");
        let frame = loop {
            let frame = reader.read_frame().expect("device frame");
            if frame.topic == topic_id::VEL_CMD {
                break frame;
            }
        };
        assert_eq!(
            Message::decode(MessageKind::Twist2D, &frame.payload).expect("decode"),
            Message::Twist2D(cmd)
        );

        shutdown.store(true, Ordering::SeqCst);
        runner.join().expect("runner");
        let _ = std::fs::remove_dir_all(&dir);
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not met within {timeout:?}");
    }
}
