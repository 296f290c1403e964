use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;

use crate::endpoint::{Bus, BusMessage, SubscriptionSet};
use crate::error::Result;

/// In-process pub/sub hub with the same delivery shape as the multicast
/// bus: a publish reaches every endpoint whose subscription matches,
/// including the publisher's own. Used by bridge tests and demos.
#[derive(Default)]
pub struct LoopbackHub {
    endpoints: Mutex<Vec<Weak<EndpointShared>>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a new endpoint attached to this hub.
    pub fn endpoint(self: &Arc<Self>) -> LoopbackBus {
        let shared = Arc::new(EndpointShared::default());
        let mut endpoints = lock(&self.endpoints);
        endpoints.retain(|weak| weak.strong_count() > 0);
        endpoints.push(Arc::downgrade(&shared));
        LoopbackBus {
            hub: Arc::clone(self),
            shared,
        }
    }

    fn deliver(&self, message: &BusMessage) {
        let endpoints = lock(&self.endpoints);
        for endpoint in endpoints.iter().filter_map(Weak::upgrade) {
            let subscribed = lock(&endpoint.subscriptions).matches(&message.channel);
            if !subscribed {
                continue;
            }
            lock(&endpoint.queue).push_back(message.clone());
            endpoint.wakeup.notify_one();
        }
    }
}

#[derive(Default)]
struct EndpointShared {
    subscriptions: Mutex<SubscriptionSet>,
    queue: Mutex<VecDeque<BusMessage>>,
    wakeup: Condvar,
}

/// One endpoint on a [`LoopbackHub`].
pub struct LoopbackBus {
    hub: Arc<LoopbackHub>,
    shared: Arc<EndpointShared>,
}

impl Bus for LoopbackBus {
    fn subscribe(&self, channel: &str) -> Result<()> {
        lock(&self.shared.subscriptions).insert(channel);
        Ok(())
    }

    fn subscribe_all(&self) -> Result<()> {
        lock(&self.shared.subscriptions).insert_all();
        Ok(())
    }

    fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        self.hub.deliver(&BusMessage {
            channel: channel.to_string(),
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<BusMessage>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut queue = lock(&self.shared.queue);
        loop {
            if let Some(message) = queue.pop_front() {
                return Ok(Some(message));
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let (guard, _timed_out) = self
                .shared
                .wakeup
                .wait_timeout(queue, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_matching_subscribers_only() {
        let hub = LoopbackHub::new();
        let publisher = hub.endpoint();
        let odometry = hub.endpoint();
        let everything = hub.endpoint();

        odometry.subscribe("MBOT_ODOMETRY").unwrap();
        everything.subscribe_all().unwrap();

        publisher.publish("MBOT_ODOMETRY", b"pose").unwrap();
        publisher.publish("MBOT_IMU", b"imu").unwrap();

        let got = odometry
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(got.channel, "MBOT_ODOMETRY");
        assert!(odometry
            .recv_timeout(Duration::from_millis(20))
            .unwrap()
            .is_none());

        let first = everything
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        let second = everything
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(first.channel, "MBOT_ODOMETRY");
        assert_eq!(second.channel, "MBOT_IMU");
    }

    #[test]
    fn publisher_receives_its_own_traffic_when_subscribed() {
        let hub = LoopbackHub::new();
        let endpoint = hub.endpoint();
        endpoint.subscribe("MBOT_VEL_CMD").unwrap();

        endpoint.publish("MBOT_VEL_CMD", b"cmd").unwrap();
        let got = endpoint
            .recv_timeout(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(got.payload.as_ref(), b"cmd");
    }

    #[test]
    fn recv_timeout_elapses() {
        let hub = LoopbackHub::new();
        let endpoint = hub.endpoint();
        endpoint.subscribe_all().unwrap();

        let got = endpoint.recv_timeout(Duration::from_millis(20)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn wakes_a_blocked_receiver() {
        let hub = LoopbackHub::new();
        let receiver = hub.endpoint();
        receiver.subscribe("MBOT_ODOMETRY").unwrap();
        let sender = hub.endpoint();

        let handle = std::thread::spawn(move || {
            receiver.recv_timeout(Duration::from_secs(5)).unwrap()
        });

        std::thread::sleep(Duration::from_millis(30));
        sender.publish("MBOT_ODOMETRY", b"wake").unwrap();

        let got = handle.join().unwrap().unwrap();
        assert_eq!(got.payload.as_ref(), b"wake");
    }

    #[test]
    fn dropped_endpoints_are_pruned() {
        let hub = LoopbackHub::new();
        let short_lived = hub.endpoint();
        short_lived.subscribe_all().unwrap();
        drop(short_lived);

        let sender = hub.endpoint();
        sender.publish("MBOT_IMU", b"x").unwrap();
    }
}
