use cross_matcher::ports::FillNotifier;
use cross_matcher::types::Order;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

// Wire shape of a fill notification datagram
#[derive(Debug, Serialize)]
struct ClosedTrades<'a> {
    notification: &'static str,
    trades: [ClosedTrade<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosedTrade<'a> {
    order_id: u64,
    #[serde(rename = "type")]
    side: &'a str,
    order_type: &'a str,
    size: u64,
    price: u64,
    timestamp: u64,
}

impl<'a> ClosedTrades<'a> {
    fn for_order(order: &'a Order) -> Self {
        ClosedTrades {
            notification: "closedTrades",
            trades: [ClosedTrade {
                order_id: order.id,
                side: order.side.as_str(),
                order_type: order.kind.as_str(),
                size: order.size,
                price: order.price,
                timestamp: order.timestamp,
            }],
        }
    }
}

#[derive(Debug)]
pub struct Datagram {
    pub target: SocketAddr,
    pub payload: Vec<u8>,
}

/// Fire-and-forget UDP fill notifications.
///
/// `notify_fill` runs inside the matching critical section, so it only
/// enqueues; a background task does the sending. When the queue is full the
/// notification is dropped.
pub struct UdpNotifier {
    addresses: Mutex<HashMap<String, SocketAddr>>,
    queue: mpsc::Sender<Datagram>,
}

impl UdpNotifier {
    /// Notifier plus the receiving end of its queue, for callers that drive
    /// delivery themselves
    pub fn with_queue(capacity: usize) -> (Self, mpsc::Receiver<Datagram>) {
        let (queue, rx) = mpsc::channel(capacity);
        let notifier = UdpNotifier {
            addresses: Mutex::new(HashMap::new()),
            queue,
        };
        (notifier, rx)
    }

    /// Notifier with a spawned sender task. Must run inside a tokio runtime.
    pub fn spawn(capacity: usize) -> Arc<Self> {
        let (notifier, rx) = Self::with_queue(capacity);
        tokio::spawn(run_sender(rx));
        Arc::new(notifier)
    }

    fn addresses(&self) -> std::sync::MutexGuard<'_, HashMap<String, SocketAddr>> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, user_id: &str, address: SocketAddr) {
        tracing::debug!(user = user_id, %address, "UDP notifications registered");
        self.addresses().insert(user_id.to_string(), address);
    }

    pub fn unregister(&self, user_id: &str) {
        self.addresses().remove(user_id);
    }

    pub fn address_of(&self, user_id: &str) -> Option<SocketAddr> {
        self.addresses().get(user_id).copied()
    }
}

impl FillNotifier for UdpNotifier {
    fn notify_fill(&self, user_id: &str, order: &Order) {
        let Some(target) = self.address_of(user_id) else {
            return;
        };

        let payload = match serde_json::to_vec(&ClosedTrades::for_order(order)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode fill notification for {}: {}", user_id, e);
                return;
            }
        };

        if let Err(e) = self.queue.try_send(Datagram { target, payload }) {
            tracing::warn!("Dropping fill notification for {}: {}", user_id, e);
        }
    }
}

async fn run_sender(mut rx: mpsc::Receiver<Datagram>) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!("Failed to bind UDP notification socket: {}", e);
            return;
        }
    };

    while let Some(datagram) = rx.recv().await {
        if let Err(e) = socket.send_to(&datagram.payload, datagram.target).await {
            tracing::warn!("Error sending notification to {}: {}", datagram.target, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cross_matcher::types::OrderSide;

    fn executed_order() -> Order {
        let mut order = Order::limit(7, OrderSide::Ask, 3, 100, "alice");
        order.timestamp = 1_700_000_000_000;
        order
    }

    #[test]
    fn test_notification_payload() {
        let (notifier, mut rx) = UdpNotifier::with_queue(4);
        let address: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        notifier.register("alice", address);

        notifier.notify_fill("alice", &executed_order());

        let datagram = rx.try_recv().unwrap();
        assert_eq!(datagram.target, address);
        let json: serde_json::Value = serde_json::from_slice(&datagram.payload).unwrap();
        assert_eq!(json["notification"], "closedTrades");
        let trade = &json["trades"][0];
        assert_eq!(trade["orderId"], 7);
        assert_eq!(trade["type"], "ask");
        assert_eq!(trade["orderType"], "limit");
        assert_eq!(trade["size"], 3);
        assert_eq!(trade["price"], 100);
        assert_eq!(trade["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_unregistered_user_is_skipped() {
        let (notifier, mut rx) = UdpNotifier::with_queue(4);
        notifier.notify_fill("alice", &executed_order());
        assert!(rx.try_recv().is_err());

        notifier.register("alice", "127.0.0.1:5000".parse().unwrap());
        notifier.unregister("alice");
        notifier.notify_fill("alice", &executed_order());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (notifier, mut rx) = UdpNotifier::with_queue(1);
        notifier.register("alice", "127.0.0.1:5000".parse().unwrap());

        notifier.notify_fill("alice", &executed_order());
        notifier.notify_fill("alice", &executed_order());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
