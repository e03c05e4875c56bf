//! Integration tests for the S1-S5 bearer scenarios from the specification's testable
//! properties, driven against a small in-memory `Channel` built only on the public API (the
//! richer `FakeChannel` in `channel::test_support` is `pub(crate)`, for the unit tests colocated
//! with `transaction`/`bearer`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use bo_tie_att::bearer::Bearer;
use bo_tie_att::channel::Channel;
use bo_tie_att::error::{AttError, ErrorCode, HostError};
use bo_tie_att::opcode::OpCode;
use bo_tie_att::security::{LinkSecurity, SecurityLevel};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

struct ScenarioChannel {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    security: Rc<RefCell<LinkSecurity>>,
    closed: Rc<Cell<bool>>,
}

struct ScenarioHandle {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    security: Rc<RefCell<LinkSecurity>>,
    closed: Rc<Cell<bool>>,
}

fn scenario_channel() -> (ScenarioChannel, ScenarioHandle) {
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound_tx, outbound) = mpsc::unbounded_channel();
    let security = Rc::new(RefCell::new(LinkSecurity::unencrypted()));
    let closed = Rc::new(Cell::new(false));
    (
        ScenarioChannel { inbound, outbound: outbound_tx, security: security.clone(), closed: closed.clone() },
        ScenarioHandle { inbound_tx, outbound, security, closed },
    )
}

#[async_trait(?Send)]
impl Channel for ScenarioChannel {
    async fn send(&mut self, pdu: &[u8]) -> bool {
        !self.closed.get() && self.outbound.send(pdu.to_vec()).is_ok()
    }

    async fn receive(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    fn min_mtu(&self) -> u16 {
        23
    }

    fn current_security(&self) -> LinkSecurity {
        *self.security.borrow()
    }

    async fn request_security_upgrade(&mut self, level: SecurityLevel) -> bool {
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

fn start(bearer: &mut Bearer<ScenarioChannel>, opcode: OpCode, pdu: &[u8]) -> oneshot::Receiver<Result<bytes::Bytes, AttError>> {
    let (tx, rx) = oneshot::channel();
    assert!(bearer.start_transaction(opcode, bytes::Bytes::copy_from_slice(pdu), tx));
    rx
}

// S1: a matched request/response completes with the exact response bytes and leaves the bearer
// open.
#[tokio::test]
async fn s1_matched_request_response() {
    let (channel, mut handle) = scenario_channel();
    let mut bearer = Bearer::new(channel);

    let rx = start(&mut bearer, OpCode::from_raw(0x04), &[0x04, 0x01, 0x00, 0x05, 0x00]);
    bearer.pump().await;
    assert_eq!(handle.outbound.try_recv().unwrap(), vec![0x04, 0x01, 0x00, 0x05, 0x00]);

    let response = vec![0x05, 0x01, 0x03, 0x00, 0x00, 0x28];
    handle.inbound_tx.send(response.clone()).unwrap();
    assert!(bearer.step().await);

    let got = rx.await.unwrap().unwrap();
    assert_eq!(&got[..], &response[..]);
    assert!(!bearer.is_closed());
}

// S2: a response with an opcode that doesn't match the outstanding request shuts the bearer down,
// fails the transaction with `Failed`, and signals a link error.
#[tokio::test]
async fn s2_wrong_response_closes_the_bearer() {
    let (channel, mut handle) = scenario_channel();
    let mut bearer = Bearer::new(channel);

    let rx = start(&mut bearer, OpCode::from_raw(0x04), &[0x04]);
    bearer.pump().await;
    handle.outbound.try_recv().unwrap();

    handle.inbound_tx.send(vec![0x03]).unwrap();
    assert!(!bearer.step().await);

    assert!(bearer.is_closed());
    assert!(handle.closed.get());
    assert_eq!(rx.await.unwrap(), Err(AttError::Host(HostError::Failed)));
}

// S3: an Error Response with a handle completes the transaction with `Err(code, handle)` and
// keeps the bearer open.
#[tokio::test]
async fn s3_error_response_with_handle() {
    let (channel, mut handle) = scenario_channel();
    let mut bearer = Bearer::new(channel);

    let rx = start(&mut bearer, OpCode::from_raw(0x04), &[0x04, 0x01, 0x00, 0x05, 0x00]);
    bearer.pump().await;
    handle.outbound.try_recv().unwrap();

    handle.inbound_tx.send(vec![0x01, 0x04, 0x01, 0x00, 0x06]).unwrap();
    assert!(bearer.step().await);

    match rx.await.unwrap() {
        Err(AttError::Protocol { code, handle: h }) => {
            assert_eq!(code, ErrorCode::RequestNotSupported);
            assert_eq!(h, 0x0001);
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
    assert!(!bearer.is_closed());
}

// S4: InsufficientAuthentication requests an upgrade to Encrypted first, retries the same PDU,
// and only escalates to Authenticated if the retry fails the same way again.
#[tokio::test]
async fn s4_security_ladder_escalates_one_level_at_a_time() {
    let (channel, mut handle) = scenario_channel();
    let mut bearer = Bearer::new(channel);

    let write_req = [0x12, 0x01, 0x00, b'a', b'b'];
    let rx = start(&mut bearer, OpCode::from_raw(0x12), &write_req);
    bearer.pump().await;
    handle.outbound.try_recv().unwrap();

    handle.inbound_tx.send(vec![0x01, 0x12, 0x01, 0x00, 0x05]).unwrap();
    assert!(bearer.step().await);

    assert_eq!(handle.security.borrow().level, SecurityLevel::Encrypted);
    assert_eq!(handle.outbound.try_recv().unwrap(), write_req.to_vec());
    assert!(rx.try_recv().is_err());

    handle.inbound_tx.send(vec![0x13]).unwrap();
    assert!(bearer.step().await);
    let got = rx.await.unwrap().unwrap();
    assert_eq!(&got[..], &[0x13]);
}

// S5: two requests started back-to-back only put one on the wire; if nothing answers before the
// deadline, the bearer shuts down and both completions fire with `TimedOut`.
#[tokio::test(start_paused = true)]
async fn s5_timeout_shuts_down_and_fails_every_pending_transaction() {
    let (channel, mut handle) = scenario_channel();
    let mut bearer = Bearer::new(channel);

    let rx1 = start(&mut bearer, OpCode::from_raw(0x04), &[0x04, 0xAA]);
    let rx2 = start(&mut bearer, OpCode::from_raw(0x02), &[0x02, 0xBB]);
    bearer.pump().await;

    assert_eq!(handle.outbound.try_recv().unwrap(), vec![0x04, 0xAA]);
    assert!(handle.outbound.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!bearer.step().await);

    assert!(bearer.is_closed());
    assert!(handle.closed.get());
    assert_eq!(rx1.await.unwrap(), Err(AttError::Host(HostError::TimedOut)));
    assert_eq!(rx2.await.unwrap(), Err(AttError::Host(HostError::TimedOut)));
}
