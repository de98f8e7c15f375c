//! A channel-backed `Transport` for local simulation and integration tests,
//! standing in for a real RPC stack the way the original implementation's
//! `netio/mock/sender.py` and `netio/mock/receiver.py` stand in for the
//! production message bus.

use tokio::sync::{mpsc, Mutex};

use crate::{Endpoint, Error, InboundMessage, OutboundMessage, Transport};

/// The core-facing half of a mock transport pair: implements [`Transport`]
/// by reading from an inbound queue a [`MockDriver`] feeds, and writing to
/// an outbound queue the same driver drains.
pub struct MockTransport {
    inbound_rx: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<(Endpoint, OutboundMessage)>,
}

/// The driver-facing half of a mock transport pair: pushes inbound messages
/// as if they arrived from the measurer, simulator, or dashboard, and
/// observes whatever the core sent outbound.
pub struct MockDriver {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    outbound_rx: Mutex<mpsc::UnboundedReceiver<(Endpoint, OutboundMessage)>>,
}

/// Builds a connected `(MockTransport, MockDriver)` pair.
pub fn channel() -> (MockTransport, MockDriver) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
        },
        MockDriver {
            inbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        },
    )
}

impl MockDriver {
    /// Enqueues an inbound message as if it had just arrived from the bus.
    pub fn push_inbound(&self, message: InboundMessage) {
        // The receiving half only ever drops if the MockTransport itself was
        // dropped, which only happens when the pipeline under test has
        // already shut down; there is nothing a driver can usefully do
        // about that beyond ignoring the send.
        let _ = self.inbound_tx.send(message);
    }

    /// Waits for the next message the core sent outbound.
    pub async fn next_outbound(&self) -> Option<(Endpoint, OutboundMessage)> {
        self.outbound_rx.lock().await.recv().await
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, endpoint: Endpoint, message: OutboundMessage) -> Result<(), Error> {
        self.outbound_tx.send((endpoint, message)).map_err(|_| Error::Unreachable {
            endpoint,
            reason: "mock driver dropped".to_string(),
        })
    }

    async fn recv(&self) -> Result<InboundMessage, Error> {
        self.inbound_rx.lock().await.recv().await.ok_or(Error::Closed)
    }
}

#[cfg(test)]
mod test {
    use protocol::Command;

    use super::channel;
    use crate::{Endpoint, InboundMessage, OutboundMessage, Transport};

    #[tokio::test]
    async fn round_trips_inbound_and_outbound_messages() {
        let (transport, driver) = channel();

        driver.push_inbound(InboundMessage::AbnormalDetectorCmd(Command::Reset));
        let received = transport.recv().await.expect("message delivered");
        assert!(matches!(received, InboundMessage::AbnormalDetectorCmd(Command::Reset)));

        transport.send(Endpoint::Measurer, OutboundMessage::GetDcnInfo).await.expect("send succeeds");
        let (endpoint, message) = driver.next_outbound().await.expect("message observed");
        assert_eq!(endpoint, Endpoint::Measurer);
        assert!(matches!(message, OutboundMessage::GetDcnInfo));
    }

    #[tokio::test]
    async fn send_fails_once_driver_is_dropped() {
        let (transport, driver) = channel();
        drop(driver);

        let result = transport.send(Endpoint::Regulator, OutboundMessage::GetDcnInfo).await;
        assert!(result.is_err());
    }
}
