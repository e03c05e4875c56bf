//! C5: the per-category outbound transaction queue — at most one outstanding request (or
//! indication) at a time, FIFO ordering, and a per-transaction timeout.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;

use crate::channel::Channel;
use crate::error::{AttError, HostError};
use crate::opcode::OpCode;
use crate::security::SecurityLevel;

/// Resolves a [`StartTransaction`](crate::bearer::Bearer::start_transaction) call: either the
/// peer's response payload, or the reason it never arrived.
pub type Completion = tokio::sync::oneshot::Sender<Result<Bytes, AttError>>;

/// One outbound transaction (a request or an indication) waiting to be sent or currently
/// outstanding.
pub struct PendingTransaction {
    pub opcode: OpCode,
    pub pdu: Bytes,
    pub completion: Completion,
    /// The security level already attempted for this transaction. Used so a security-triggered
    /// retry can tell whether it has already tried the level it's about to ask for again.
    pub security_retry_level: SecurityLevel,
}

impl PendingTransaction {
    fn resolve(self, result: Result<Bytes, AttError>) {
        let _ = self.completion.send(result);
    }
}

/// FIFO of pending outbound transactions for one opcode category, with at most one outstanding
/// (`current`) at a time and a timer armed exactly when `current.is_some()`.
#[derive(Default)]
pub struct TransactionQueue {
    fifo: VecDeque<PendingTransaction>,
    current: Option<PendingTransaction>,
    timer: Option<std::pin::Pin<Box<tokio::time::Sleep>>>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, tx: PendingTransaction) {
        self.fifo.push_back(tx);
    }

    pub fn current_opcode(&self) -> Option<OpCode> {
        self.current.as_ref().map(|tx| tx.opcode)
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.fifo.is_empty()
    }

    /// If nothing is currently outstanding, pop entries from the FIFO and attempt to send each
    /// over `channel` until one succeeds (becoming `current`, with the timer armed) or the FIFO
    /// is drained. Entries that fail to send are resolved with `OutOfMemory` and skipped — this
    /// models allocation failure on the channel's outbound path, not a protocol error.
    pub async fn try_send_next<C: Channel>(&mut self, channel: &mut C, timeout: Duration) {
        if self.current.is_some() {
            return;
        }
        while let Some(tx) = self.fifo.pop_front() {
            if channel.send(&tx.pdu).await {
                self.timer = Some(Box::pin(tokio::time::sleep(timeout)));
                self.current = Some(tx);
                return;
            }
            tx.resolve(Err(AttError::Host(HostError::OutOfMemory)));
        }
    }

    /// Take ownership of `current`, disarming its timer. Precondition (debug-asserted): a
    /// transaction is actually outstanding.
    pub fn clear_current(&mut self) -> Option<PendingTransaction> {
        self.timer = None;
        self.current.take()
    }

    /// Re-enqueue a transaction at the head of the FIFO, for the security-retry path, without
    /// re-arming any timer (the caller will call `try_send_next` immediately afterward).
    pub fn requeue_at_head(&mut self, tx: PendingTransaction) {
        self.fifo.push_front(tx);
    }

    pub fn reset(&mut self) {
        self.timer = None;
        self.current = None;
        self.fifo.clear();
    }

    /// Resolve `current` (if any) and every queued transaction with a host-local error, FIFO
    /// order, then clear the queue. Used by bearer shutdown.
    pub fn invoke_error_all(&mut self, status: HostError) {
        self.timer = None;
        if let Some(tx) = self.current.take() {
            tx.resolve(Err(AttError::Host(status)));
        }
        while let Some(tx) = self.fifo.pop_front() {
            tx.resolve(Err(AttError::Host(status)));
        }
    }

    /// Waits for the current transaction's deadline. Pends forever if nothing is outstanding, so
    /// this can be used unconditionally as a `tokio::select!` branch.
    pub async fn wait_for_timeout(&mut self) {
        match &mut self.timer {
            Some(timer) => timer.as_mut().await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::test_support::fake_channel;
    use crate::opcode::OpCode;
    use tokio::sync::oneshot;

    fn tx(opcode: OpCode, pdu: &'static [u8]) -> (PendingTransaction, oneshot::Receiver<Result<Bytes, AttError>>) {
        let (completion, rx) = oneshot::channel();
        (
            PendingTransaction { opcode, pdu: Bytes::from_static(pdu), completion, security_retry_level: SecurityLevel::NoSecurity },
            rx,
        )
    }

    #[tokio::test]
    async fn try_send_next_only_sends_one_at_a_time() {
        let (mut channel, mut handle) = fake_channel(23);
        let mut q = TransactionQueue::new();
        let (t1, _rx1) = tx(OpCode::READ_REQUEST, b"read1");
        let (t2, _rx2) = tx(OpCode::READ_REQUEST, b"read2");
        q.enqueue(t1);
        q.enqueue(t2);

        q.try_send_next(&mut channel, Duration::from_secs(30)).await;
        assert_eq!(handle.outbound_rx.try_recv().unwrap(), b"read1".to_vec());
        assert!(q.has_current());

        // second call is a no-op while current is outstanding
        q.try_send_next(&mut channel, Duration::from_secs(30)).await;
        assert!(handle.outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_send_resolves_with_out_of_memory_and_advances() {
        let (mut channel, handle) = fake_channel(23);
        handle.closed.set(true);
        let mut q = TransactionQueue::new();
        let (t1, rx1) = tx(OpCode::READ_REQUEST, b"read1");
        q.enqueue(t1);

        q.try_send_next(&mut channel, Duration::from_secs(30)).await;
        assert!(!q.has_current());
        assert_eq!(rx1.try_recv().unwrap(), Err(AttError::Host(HostError::OutOfMemory)));
    }

    #[tokio::test]
    async fn clear_current_returns_and_disarms() {
        let (mut channel, _handle) = fake_channel(23);
        let mut q = TransactionQueue::new();
        let (t1, _rx1) = tx(OpCode::READ_REQUEST, b"read1");
        q.enqueue(t1);
        q.try_send_next(&mut channel, Duration::from_secs(30)).await;
        assert!(q.has_current());

        let cleared = q.clear_current();
        assert!(cleared.is_some());
        assert!(!q.has_current());
    }

    #[tokio::test]
    async fn invoke_error_all_resolves_current_and_fifo() {
        let (mut channel, _handle) = fake_channel(23);
        let mut q = TransactionQueue::new();
        let (t1, rx1) = tx(OpCode::READ_REQUEST, b"read1");
        let (t2, rx2) = tx(OpCode::READ_REQUEST, b"read2");
        q.enqueue(t1);
        q.try_send_next(&mut channel, Duration::from_secs(30)).await;
        q.enqueue(t2);

        q.invoke_error_all(HostError::Failed);
        assert_eq!(rx1.try_recv().unwrap(), Err(AttError::Host(HostError::Failed)));
        assert_eq!(rx2.try_recv().unwrap(), Err(AttError::Host(HostError::Failed)));
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_after_the_deadline() {
        let (mut channel, _handle) = fake_channel(23);
        let mut q = TransactionQueue::new();
        let (t1, mut rx1) = tx(OpCode::READ_REQUEST, b"read1");
        q.enqueue(t1);
        q.try_send_next(&mut channel, Duration::from_secs(30)).await;

        tokio::select! {
            _ = q.wait_for_timeout() => {}
            _ = &mut rx1 => panic!("completed before the deadline"),
        }
    }

    #[tokio::test]
    async fn wait_for_timeout_pends_forever_with_nothing_outstanding() {
        let mut q = TransactionQueue::new();
        tokio::select! {
            _ = q.wait_for_timeout() => panic!("should not resolve"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }
}
