//! C6: the bearer — the ATT client and server roles tied together over one [`Channel`].
//!
//! Sending is split into a queue per opcode category (`request_queue` for Requests, which can
//! fail with an Error Response; `indication_queue` for Indications, which complete with a
//! Confirmation) so that one never blocks the other, mirroring how the teacher's `att::client`
//! and `att::server` each track their own list of "reserved" handles/transactions but feeding a
//! single shared channel. The inbound side is a `tokio::select!` loop over the channel and both
//! queues' timers, the same shape as the `Connection::run` loop in the gatt-crate ATT server
//! reference: no spawning, one future polled to completion per inbound event.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::channel::Channel;
use crate::error::{AttError, ErrorCode, HostError};
use crate::opcode::{OpCode, PduKind};
use crate::pdu;
use crate::security::SecurityLevel;
use crate::transaction::{PendingTransaction, TransactionQueue};
use crate::{Handle, INVALID_HANDLE, TRANSACTION_TIMEOUT};

/// Identifies one inbound request or indication while its handler is composing a reply. `0` is
/// reserved to mean "not a tracked transaction" (the value passed to handlers for commands and
/// notifications).
pub type TransactionId = u32;
pub const INVALID_TRANSACTION_ID: TransactionId = 0;

/// Identifies a registered inbound handler, returned by [`Bearer::register_handler`]. `0` means
/// registration failed (an opcode already has a handler).
pub type HandlerId = u32;
pub const INVALID_HANDLER_ID: HandlerId = 0;

/// Completes an outbound `StartTransaction` with the peer's raw response frame, or the reason one
/// never arrived.
pub type Completion = oneshot::Sender<Result<Bytes, AttError>>;

/// Handles one inbound PDU. `tid` is `0` for commands and notifications (nothing to reply to);
/// otherwise it identifies the transaction for a later `reply`/`reply_with_error` call. `frame` is
/// the whole inbound frame, opcode byte included, so the handler can re-parse it with
/// [`pdu::read`] if it needs the typed view.
pub type Handler = Box<dyn FnMut(TransactionId, Bytes)>;

struct RemoteTransaction {
    id: TransactionId,
    opcode: OpCode,
}

/// Given an error code the peer returned and the link's current security level, decide whether a
/// security upgrade could plausibly turn the error into a success, and if so to what level.
/// Implements the upgrade ladder from §4.6.
///
/// `InsufficientEncryption` is treated as "unencrypted, authentication insufficient" regardless of
/// the link's reported level, so its target is always `Encrypted` — never escalated straight to
/// `Authenticated` the way a second `InsufficientAuthentication` on an already-encrypted link would
/// be.
fn retry_target_level(code: ErrorCode, current: SecurityLevel) -> Option<SecurityLevel> {
    match code {
        ErrorCode::InsufficientEncryption => Some(SecurityLevel::Encrypted),
        ErrorCode::InsufficientAuthentication | ErrorCode::InsufficientAuthorization => match current {
            SecurityLevel::Authenticated => None,
            SecurityLevel::Encrypted => Some(SecurityLevel::Authenticated),
            SecurityLevel::NoSecurity => Some(SecurityLevel::Encrypted),
        },
        _ => None,
    }
}

fn parse_error_response(frame: &Bytes) -> Option<(OpCode, Handle, ErrorCode)> {
    match pdu::read(frame) {
        Ok((_, pdu::PduView::ErrorResponse { request_opcode, handle, error_code })) => {
            Some((request_opcode, handle, error_code))
        }
        _ => None,
    }
}

/// Ties together the PDU codec, the transaction queues, and a [`Channel`] into the full ATT
/// bearer. Single-threaded and cooperative: every method takes `&mut self`, and the whole type is
/// driven from one executor via [`Bearer::drive`] (or by calling the smaller steps directly from a
/// caller's own loop).
pub struct Bearer<C: Channel> {
    channel: Option<C>,
    request_queue: TransactionQueue,
    indication_queue: TransactionQueue,
    remote_request: Option<RemoteTransaction>,
    remote_indication: Option<RemoteTransaction>,
    handlers: HashMap<OpCode, (HandlerId, Handler)>,
    handler_opcodes: HashMap<HandlerId, OpCode>,
    next_handler_id: HandlerId,
    next_remote_transaction_id: TransactionId,
    mtu: u16,
    closed_callback: Option<Box<dyn FnOnce()>>,
}

impl<C: Channel> Bearer<C> {
    /// The distilled contract allows construction to fail if the channel "cannot be activated";
    /// this crate's `Channel` trait has no separate activation step (that belongs to the L2CAP
    /// layer this crate doesn't model), so construction here is infallible.
    pub fn new(channel: C) -> Self {
        let mtu = channel.min_mtu();
        Bearer {
            channel: Some(channel),
            request_queue: TransactionQueue::new(),
            indication_queue: TransactionQueue::new(),
            remote_request: None,
            remote_indication: None,
            handlers: HashMap::new(),
            handler_opcodes: HashMap::new(),
            next_handler_id: 1,
            next_remote_transaction_id: 1,
            mtu,
            closed_callback: None,
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Raise the MTU used for outbound length checks. Never goes below the channel's minimum.
    pub fn set_preferred_mtu(&mut self, preferred: u16) {
        if let Some(channel) = &self.channel {
            self.mtu = preferred.max(channel.min_mtu());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    pub fn set_closed_callback(&mut self, cb: impl FnOnce() + 'static) {
        self.closed_callback = Some(Box::new(cb));
    }

    /// At most one handler per opcode. Returns [`INVALID_HANDLER_ID`] if one is already
    /// registered for `opcode`.
    pub fn register_handler(&mut self, opcode: OpCode, handler: Handler) -> HandlerId {
        if self.handlers.contains_key(&opcode) {
            return INVALID_HANDLER_ID;
        }
        let id = self.allocate_handler_id();
        self.handlers.insert(opcode, (id, handler));
        self.handler_opcodes.insert(id, opcode);
        id
    }

    pub fn unregister_handler(&mut self, id: HandlerId) -> bool {
        match self.handler_opcodes.remove(&id) {
            Some(opcode) => {
                self.handlers.remove(&opcode);
                true
            }
            None => false,
        }
    }

    fn allocate_handler_id(&mut self) -> HandlerId {
        loop {
            let id = self.next_handler_id;
            self.next_handler_id = self.next_handler_id.wrapping_add(1);
            if self.next_handler_id == INVALID_HANDLER_ID {
                self.next_handler_id = 1;
            }
            if !self.handler_opcodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn allocate_remote_transaction_id(&mut self) -> TransactionId {
        let id = self.next_remote_transaction_id;
        self.next_remote_transaction_id = self.next_remote_transaction_id.wrapping_add(1);
        if self.next_remote_transaction_id == INVALID_TRANSACTION_ID {
            self.next_remote_transaction_id = 1;
        }
        id
    }

    fn current_security_level(&self) -> SecurityLevel {
        self.channel.as_ref().map(|c| c.current_security().level).unwrap_or(SecurityLevel::NoSecurity)
    }

    /// Enqueue an outbound request or indication. `completion` is invoked exactly once, either
    /// here (synchronously, with `false` implying it will never be invoked) or later from the
    /// bearer's inbound processing.
    pub fn start_transaction(&mut self, opcode: OpCode, pdu: Bytes, completion: Completion) -> bool {
        if self.is_closed() || pdu.is_empty() || pdu.len() > self.mtu as usize {
            return false;
        }
        let security_retry_level = self.current_security_level();
        let tx = PendingTransaction { opcode, pdu, completion, security_retry_level };
        match opcode.kind() {
            PduKind::Request => {
                self.request_queue.enqueue(tx);
                true
            }
            PduKind::Indication => {
                self.indication_queue.enqueue(tx);
                true
            }
            _ => false,
        }
    }

    /// Send a command or notification, which carries no reply.
    pub async fn send_without_response(&mut self, pdu: Bytes) -> bool {
        if self.is_closed() || pdu.is_empty() || pdu.len() > self.mtu as usize {
            return false;
        }
        match OpCode::from_raw(pdu[0]).kind() {
            PduKind::Command | PduKind::Notification => {}
            _ => return false,
        }
        self.send_raw(&pdu).await
    }

    async fn send_raw(&mut self, pdu: &[u8]) -> bool {
        match self.channel.take() {
            Some(mut channel) => {
                let sent = channel.send(pdu).await;
                self.channel = Some(channel);
                sent
            }
            None => false,
        }
    }

    /// Attempt to send whatever is at the head of each outbound queue. Called automatically at
    /// the start of every [`Bearer::step`]/[`Bearer::drive`] iteration, so a transaction started
    /// with `start_transaction` reaches the wire on the event loop's next turn; exposed publicly
    /// for a caller that wants a just-started transaction flushed without waiting on inbound
    /// traffic.
    pub async fn pump(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            self.request_queue.try_send_next(&mut channel, TRANSACTION_TIMEOUT).await;
            self.indication_queue.try_send_next(&mut channel, TRANSACTION_TIMEOUT).await;
            self.channel = Some(channel);
        }
    }

    /// Complete an inbound request or indication with a well-formed response/indication PDU.
    /// Fails (and sends nothing) when `tid` doesn't name an outstanding transaction, the bearer is
    /// closed, `pdu` is empty or an Error Response, or `pdu`'s opcode does not complete the
    /// transaction `tid` names (per `MatchingTransactionCode`).
    pub async fn reply(&mut self, tid: TransactionId, pdu: Bytes) -> bool {
        if self.is_closed() || tid == INVALID_TRANSACTION_ID || pdu.is_empty() {
            return false;
        }
        let opcode = OpCode::from_raw(pdu[0]);
        if opcode == OpCode::ERROR_RESPONSE {
            return false;
        }

        let matches_request = self.remote_request.as_ref().is_some_and(|rt| rt.id == tid);
        let matches_indication = self.remote_indication.as_ref().is_some_and(|rt| rt.id == tid);

        let originating = if matches_request {
            self.remote_request.as_ref().map(|rt| rt.opcode)
        } else if matches_indication {
            self.remote_indication.as_ref().map(|rt| rt.opcode)
        } else {
            None
        };

        let Some(originating) = originating else { return false };
        if opcode.matching_transaction_code() != Some(originating) {
            return false;
        }

        if matches_request {
            self.remote_request = None;
        } else {
            self.remote_indication = None;
        }

        self.send_raw(&pdu).await
    }

    /// Answer an outstanding inbound *request* (never an indication — those must be confirmed via
    /// [`Bearer::reply`] with a Handle Value Confirmation) with an Error Response.
    pub async fn reply_with_error(&mut self, tid: TransactionId, handle_in_error: Handle, code: ErrorCode) -> bool {
        if self.is_closed() || tid == INVALID_TRANSACTION_ID {
            return false;
        }
        let opcode = match &self.remote_request {
            Some(rt) if rt.id == tid => rt.opcode,
            _ => return false,
        };
        self.remote_request = None;
        let frame = pdu::build(|buf| pdu::write_error_response(buf, opcode, handle_in_error, code));
        self.send_raw(&frame).await
    }

    async fn send_error_response(&mut self, request_opcode: OpCode, handle: Handle, code: ErrorCode) {
        let frame = pdu::build(|buf| pdu::write_error_response(buf, request_opcode, handle, code));
        self.send_raw(&frame).await;
    }

    fn dispatch(&mut self, opcode: OpCode, tid: TransactionId, frame: Bytes) {
        if let Some((_, handler)) = self.handlers.get_mut(&opcode) {
            handler(tid, frame);
        }
    }

    async fn handle_begin_request(&mut self, opcode: OpCode, frame: Bytes) {
        if self.remote_request.is_some() {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }
        if !self.handlers.contains_key(&opcode) {
            self.send_error_response(opcode, INVALID_HANDLE, ErrorCode::RequestNotSupported).await;
            return;
        }
        let tid = self.allocate_remote_transaction_id();
        self.remote_request = Some(RemoteTransaction { id: tid, opcode });
        self.dispatch(opcode, tid, frame);
    }

    async fn handle_begin_indication(&mut self, opcode: OpCode, frame: Bytes) {
        if self.remote_indication.is_some() {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }
        if !self.handlers.contains_key(&opcode) {
            self.send_error_response(opcode, INVALID_HANDLE, ErrorCode::RequestNotSupported).await;
            return;
        }
        let tid = self.allocate_remote_transaction_id();
        self.remote_indication = Some(RemoteTransaction { id: tid, opcode });
        self.dispatch(opcode, tid, frame);
    }

    fn dispatch_untracked(&mut self, opcode: OpCode, frame: Bytes) {
        if self.handlers.contains_key(&opcode) {
            self.dispatch(opcode, INVALID_TRANSACTION_ID, frame);
        }
    }

    async fn resolve_or_retry_request(&mut self, tx: PendingTransaction, handle: Handle, code: ErrorCode) {
        let target_level = retry_target_level(code, self.current_security_level())
            .filter(|level| *level > tx.security_retry_level);

        if let Some(level) = target_level {
            if let Some(mut channel) = self.channel.take() {
                let upgraded = channel.request_security_upgrade(level).await;
                self.channel = Some(channel);
                if upgraded {
                    let mut retried = tx;
                    retried.security_retry_level = level;
                    self.request_queue.requeue_at_head(retried);
                    return;
                }
            }
        }

        let _ = tx.completion.send(Err(AttError::protocol(code, handle)));
    }

    async fn handle_end_request(&mut self, opcode: OpCode, frame: Bytes) {
        if !self.request_queue.has_current() {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }

        let (target_opcode, error) = if opcode == OpCode::ERROR_RESPONSE {
            match parse_error_response(&frame) {
                Some((request_opcode, handle, code)) => (request_opcode, Some((handle, code))),
                None => {
                    self.shut_down_internal(HostError::Failed).await;
                    return;
                }
            }
        } else {
            match opcode.matching_transaction_code() {
                Some(op) => (op, None),
                None => {
                    self.shut_down_internal(HostError::Failed).await;
                    return;
                }
            }
        };

        if self.request_queue.current_opcode() != Some(target_opcode) {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }

        let tx = self.request_queue.clear_current().expect("has_current checked above");

        match error {
            None => {
                let _ = tx.completion.send(Ok(frame));
            }
            Some((handle, code)) => self.resolve_or_retry_request(tx, handle, code).await,
        }

        self.pump().await;
    }

    async fn handle_end_indication(&mut self, opcode: OpCode, frame: Bytes) {
        if !self.indication_queue.has_current() {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }

        let target_opcode = match opcode.matching_transaction_code() {
            Some(op) => op,
            None => {
                self.shut_down_internal(HostError::Failed).await;
                return;
            }
        };

        if self.indication_queue.current_opcode() != Some(target_opcode) {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }

        let tx = self.indication_queue.clear_current().expect("has_current checked above");
        let _ = tx.completion.send(Ok(frame));

        self.pump().await;
    }

    async fn handle_inbound(&mut self, frame: Bytes) {
        if frame.is_empty() || frame.len() > self.mtu as usize {
            self.shut_down_internal(HostError::Failed).await;
            return;
        }

        let opcode = OpCode::from_raw(frame[0]);
        match opcode.kind() {
            PduKind::Response => self.handle_end_request(opcode, frame).await,
            PduKind::Confirmation => self.handle_end_indication(opcode, frame).await,
            PduKind::Request => self.handle_begin_request(opcode, frame).await,
            PduKind::Indication => self.handle_begin_indication(opcode, frame).await,
            PduKind::Command | PduKind::Notification => self.dispatch_untracked(opcode, frame),
            PduKind::Invalid => self.send_error_response(opcode, INVALID_HANDLE, ErrorCode::RequestNotSupported).await,
        }
    }

    /// Process exactly one inbound event (a frame, or a transaction timeout), or report that the
    /// bearer is already closed. Lower-level than [`Bearer::drive`]; useful for callers that want
    /// to interleave bearer progress with other work in their own `select!`.
    pub async fn step(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.pump().await;

        let Some(mut channel) = self.channel.take() else { return false };

        enum Event {
            Frame(Option<Vec<u8>>),
            RequestTimeout,
            IndicationTimeout,
        }

        let event = tokio::select! {
            frame = channel.receive() => Event::Frame(frame),
            _ = self.request_queue.wait_for_timeout() => Event::RequestTimeout,
            _ = self.indication_queue.wait_for_timeout() => Event::IndicationTimeout,
        };
        self.channel = Some(channel);

        match event {
            Event::Frame(Some(frame)) => {
                self.handle_inbound(Bytes::from(frame)).await;
                true
            }
            Event::Frame(None) => {
                self.shut_down_internal(HostError::Failed).await;
                false
            }
            Event::RequestTimeout | Event::IndicationTimeout => {
                self.shut_down_internal(HostError::TimedOut).await;
                false
            }
        }
    }

    /// Run the bearer until it shuts down (transport close, timeout, or an explicit
    /// [`Bearer::shut_down`] from a callback). Mirrors the teacher's `Connection::run` loop.
    pub async fn drive(&mut self) {
        while self.step().await {}
    }

    /// Tear down the bearer: signal the channel, drop it, fire the closed callback, then fail
    /// every pending outbound transaction.
    pub async fn shut_down(&mut self) {
        self.shut_down_internal(HostError::Failed).await;
    }

    async fn shut_down_internal(&mut self, reason: HostError) {
        if self.is_closed() {
            return;
        }
        if let Some(mut channel) = self.channel.take() {
            channel.signal_link_error();
        }
        if let Some(cb) = self.closed_callback.take() {
            cb();
        }

        // Moved out before invoking callbacks: survives a closed-callback that somehow re-enters
        // bearer state through a caller-held `Rc<RefCell<Bearer>>`.
        let mut request_queue = std::mem::take(&mut self.request_queue);
        let mut indication_queue = std::mem::take(&mut self.indication_queue);
        request_queue.invoke_error_all(reason);
        indication_queue.invoke_error_all(reason);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::test_support::fake_channel;
    use crate::security::LinkSecurity;

    fn read_request(handle: Handle) -> Bytes {
        pdu::build(|b| pdu::write_read_request(b, handle))
    }

    #[tokio::test]
    async fn start_transaction_rejects_oversized_pdu() {
        let (channel, _handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, _rx) = oneshot::channel();
        let oversized = Bytes::from(vec![0u8; 64]);
        assert!(!bearer.start_transaction(OpCode::READ_REQUEST, oversized, tx));
    }

    #[tokio::test]
    async fn start_transaction_rejects_non_request_non_indication_opcodes() {
        let (channel, _handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, _rx) = oneshot::channel();
        assert!(!bearer.start_transaction(OpCode::READ_RESPONSE, read_request(1), tx));
    }

    #[tokio::test]
    async fn a_request_response_round_trip_completes_the_transaction() {
        let (channel, mut handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        assert!(bearer.start_transaction(OpCode::READ_REQUEST, read_request(1), tx));
        bearer.pump().await;

        assert_eq!(handle.outbound_rx.try_recv().unwrap(), read_request(1).to_vec());

        let response = pdu::build(|b| pdu::write_read_response(b, b"hi").unwrap());
        handle.inbound_tx.send(response.to_vec()).unwrap();
        assert!(bearer.step().await);

        let got = rx.await.unwrap().unwrap();
        assert_eq!(&got[..], &response[..]);
    }

    #[tokio::test]
    async fn error_response_with_unrecoverable_code_resolves_with_protocol_error() {
        let (channel, mut handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        bearer.start_transaction(OpCode::READ_REQUEST, read_request(7), tx);
        bearer.pump().await;
        handle.outbound_rx.try_recv().unwrap();

        let error = pdu::build(|b| pdu::write_error_response(b, OpCode::READ_REQUEST, 7, ErrorCode::InvalidHandle));
        handle.inbound_tx.send(error.to_vec()).unwrap();
        assert!(bearer.step().await);

        match rx.await.unwrap() {
            Err(AttError::Protocol { code, handle: h }) => {
                assert_eq!(code, ErrorCode::InvalidHandle);
                assert_eq!(h, 7);
            }
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn insufficient_authentication_triggers_a_retry_on_an_unencrypted_link() {
        let (channel, mut handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        bearer.start_transaction(OpCode::READ_REQUEST, read_request(1), tx);
        bearer.pump().await;
        handle.outbound_rx.try_recv().unwrap();

        let error =
            pdu::build(|b| pdu::write_error_response(b, OpCode::READ_REQUEST, 1, ErrorCode::InsufficientAuthentication));
        handle.inbound_tx.send(error.to_vec()).unwrap();
        assert!(bearer.step().await);

        // link security was raised by the fake channel's upgrade handler, and the same PDU was
        // resent rather than the completion firing.
        assert_eq!(handle.security.borrow().level, SecurityLevel::Encrypted);
        let resent = handle.outbound_rx.try_recv().unwrap();
        assert_eq!(resent, read_request(1).to_vec());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn already_authenticated_link_does_not_retry() {
        let (channel, mut handle) = fake_channel(23);
        *handle.security.borrow_mut() = LinkSecurity { level: SecurityLevel::Authenticated, enc_key_size: 16 };
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        bearer.start_transaction(OpCode::READ_REQUEST, read_request(1), tx);
        bearer.pump().await;
        handle.outbound_rx.try_recv().unwrap();

        let error =
            pdu::build(|b| pdu::write_error_response(b, OpCode::READ_REQUEST, 1, ErrorCode::InsufficientAuthentication));
        handle.inbound_tx.send(error.to_vec()).unwrap();
        assert!(bearer.step().await);

        assert!(handle.outbound_rx.try_recv().is_err());
        match rx.await.unwrap() {
            Err(AttError::Protocol { code, .. }) => assert_eq!(code, ErrorCode::InsufficientAuthentication),
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inbound_request_without_a_registered_handler_gets_request_not_supported() {
        let (channel, mut handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        handle.inbound_tx.send(read_request(1).to_vec()).unwrap();
        assert!(bearer.step().await);

        let sent = handle.outbound_rx.try_recv().unwrap();
        let (_, view) = pdu::read(&sent).unwrap();
        match view {
            pdu::PduView::ErrorResponse { request_opcode, handle: h, error_code } => {
                assert_eq!(request_opcode, OpCode::READ_REQUEST);
                assert_eq!(h, INVALID_HANDLE);
                assert_eq!(error_code, ErrorCode::RequestNotSupported);
            }
            _ => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn registered_handler_can_reply_through_the_bearer() {
        let (channel, mut handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);

        let tid_slot = std::rc::Rc::new(std::cell::Cell::new(INVALID_TRANSACTION_ID));
        let tid_slot_captured = tid_slot.clone();
        bearer.register_handler(
            OpCode::READ_REQUEST,
            Box::new(move |tid, _frame| tid_slot_captured.set(tid)),
        );

        handle.inbound_tx.send(read_request(5).to_vec()).unwrap();
        assert!(bearer.step().await);

        let tid = tid_slot.get();
        assert_ne!(tid, INVALID_TRANSACTION_ID);

        let response = pdu::build(|b| pdu::write_read_response(b, b"ok").unwrap());
        assert!(bearer.reply(tid, response.clone()).await);
        assert_eq!(handle.outbound_rx.try_recv().unwrap(), response.to_vec());
    }

    #[tokio::test]
    async fn duplicate_handler_registration_is_rejected() {
        let (channel, _handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let first = bearer.register_handler(OpCode::READ_REQUEST, Box::new(|_, _| {}));
        let second = bearer.register_handler(OpCode::READ_REQUEST, Box::new(|_, _| {}));
        assert_ne!(first, INVALID_HANDLER_ID);
        assert_eq!(second, INVALID_HANDLER_ID);
    }

    #[tokio::test]
    async fn transport_close_shuts_down_and_fails_pending_transactions() {
        let (channel, handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        bearer.start_transaction(OpCode::READ_REQUEST, read_request(1), tx);
        bearer.pump().await;

        drop(handle.inbound_tx); // transport closed: receive() now resolves to None
        assert!(!bearer.step().await);
        assert!(bearer.is_closed());
        assert_eq!(rx.await.unwrap(), Err(AttError::Host(HostError::Failed)));
    }

    #[tokio::test(start_paused = true)]
    async fn transaction_timeout_shuts_down_the_bearer() {
        let (channel, _handle) = fake_channel(23);
        let mut bearer = Bearer::new(channel);
        let (tx, rx) = oneshot::channel();
        bearer.start_transaction(OpCode::READ_REQUEST, read_request(1), tx);
        bearer.pump().await;

        tokio::time::advance(TRANSACTION_TIMEOUT + std::time::Duration::from_secs(1)).await;
        assert!(!bearer.step().await);
        assert_eq!(rx.await.unwrap(), Err(AttError::Host(HostError::TimedOut)));
    }
}
