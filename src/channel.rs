//! The `Channel` trait: the bearer's view of the underlying reliable framed transport (normally
//! an L2CAP fixed channel) and of the Security Manager's current link state.
//!
//! This mirrors the teacher's `l2cap::ConnectionChannel` (test double in `att::server` /
//! `att::client`), a `send`/`receive` pair polled against a waker, but expressed with `async fn`
//! since this crate builds on `tokio` rather than hand-rolled futures. `?Send` because the bearer
//! is single-threaded and its state (`Rc`/`RefCell`) is not `Send` either.

use async_trait::async_trait;

use crate::security::{LinkSecurity, SecurityLevel};

/// The bearer is generic over this trait so the L2CAP channel, Security Manager, and controller
/// layers never need to be linked into this crate to exercise the protocol logic.
#[async_trait(?Send)]
pub trait Channel {
    /// Write one PDU-sized frame. Returns `false` if the frame could not be queued (e.g. the
    /// transport's outbound buffer is exhausted); the bearer treats this the same as the
    /// transaction-level `OutOfMemory` host error.
    async fn send(&mut self, pdu: &[u8]) -> bool;

    /// Yields the next inbound frame, or `None` once the transport has closed.
    async fn receive(&mut self) -> Option<Vec<u8>>;

    /// The transport's minimum supported MTU (23 for LE, 48 for BR/EDR).
    fn min_mtu(&self) -> u16;

    /// A snapshot of the link's current security level and encryption key size.
    fn current_security(&self) -> LinkSecurity;

    /// Ask the Security Manager to raise the link to at least `level`. Resolves to whether the
    /// link reached (or already was at) that level.
    async fn request_security_upgrade(&mut self, level: SecurityLevel) -> bool;

    /// Called once, by `ShutDown`, to tell the transport the bearer is done with it.
    fn signal_link_error(&mut self);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tokio::sync::mpsc;

    /// An in-memory `Channel` for tests. Frames sent by the bearer land in an mpsc the test can
    /// drain (`outbound_rx`); frames pushed through `inbound_tx` are delivered to the bearer's
    /// next `receive().await`. Security state is shared with the test via `Rc<RefCell<..>>` so
    /// the test can both read and force it, modeling out-of-band Security Manager completion.
    pub struct FakeChannel {
        inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
        min_mtu: u16,
        security: Rc<RefCell<LinkSecurity>>,
        deny_upgrades: Rc<Cell<bool>>,
        closed: Rc<Cell<bool>>,
    }

    pub struct FakeChannelHandle {
        pub inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
        pub outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        pub security: Rc<RefCell<LinkSecurity>>,
        pub deny_upgrades: Rc<Cell<bool>>,
        pub closed: Rc<Cell<bool>>,
    }

    pub fn fake_channel(min_mtu: u16) -> (FakeChannel, FakeChannelHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let security = Rc::new(RefCell::new(LinkSecurity::unencrypted()));
        let deny_upgrades = Rc::new(Cell::new(false));
        let closed = Rc::new(Cell::new(false));

        let channel = FakeChannel {
            inbound_rx,
            outbound_tx,
            min_mtu,
            security: security.clone(),
            deny_upgrades: deny_upgrades.clone(),
            closed: closed.clone(),
        };
        let handle = FakeChannelHandle { inbound_tx, outbound_rx, security, deny_upgrades, closed };
        (channel, handle)
    }

    #[async_trait(?Send)]
    impl Channel for FakeChannel {
        async fn send(&mut self, pdu: &[u8]) -> bool {
            if self.closed.get() {
                return false;
            }
            self.outbound_tx.send(pdu.to_vec()).is_ok()
        }

        async fn receive(&mut self) -> Option<Vec<u8>> {
            self.inbound_rx.recv().await
        }

        fn min_mtu(&self) -> u16 {
            self.min_mtu
        }

        fn current_security(&self) -> LinkSecurity {
            *self.security.borrow()
        }

        async fn request_security_upgrade(&mut self, level: SecurityLevel) -> bool {
            if self.deny_upgrades.get() {
                return false;
            }
            let mut security = self.security.borrow_mut();
            if security.level < level {
                security.level = level;
                security.enc_key_size = 16;
            }
            true
        }

        fn signal_link_error(&mut self) {
            self.closed.set(true);
        }
    }
}
