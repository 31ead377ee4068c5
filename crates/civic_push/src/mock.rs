//! In-memory push provider for tests.

use civic_common::{
    BoxFuture, CivicError, PushErrorCode, PushMessage, PushProvider, PushTicket, ReceiptStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every batch it is handed and answers from scripted outcomes.
///
/// Tokens without a scripted rejection are accepted with a fresh receipt id.
/// Receipts answer `Ok` unless scripted otherwise; unknown ids are reported
/// as not ready.
#[derive(Debug, Default)]
pub struct MockPushProvider {
    batch_size: Option<usize>,
    receipt_batch_size: Option<usize>,
    rejections: Mutex<HashMap<String, PushErrorCode>>,
    receipt_errors: Mutex<HashMap<String, PushErrorCode>>,
    unready_receipts: Mutex<Vec<String>>,
    fail_sends: AtomicUsize,
    fail_receipt_checks: AtomicUsize,
    issued: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<Vec<PushMessage>>>,
    receipt_lookups: Mutex<Vec<Vec<String>>>,
    counter: AtomicUsize,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_receipt_batch_size(mut self, batch_size: usize) -> Self {
        self.receipt_batch_size = Some(batch_size);
        self
    }

    /// Reject every message to `token` with `code`
    pub fn reject_token(&self, token: &str, code: PushErrorCode) {
        lock(&self.rejections).insert(token.to_string(), code);
    }

    /// Report `code` in the receipt of `receipt_id`
    pub fn fail_receipt(&self, receipt_id: &str, code: PushErrorCode) {
        lock(&self.receipt_errors).insert(receipt_id.to_string(), code);
    }

    /// Leave `receipt_id` out of receipt responses
    pub fn withhold_receipt(&self, receipt_id: &str) {
        lock(&self.unready_receipts).push(receipt_id.to_string());
    }

    /// Fail the next `n` send calls as a whole
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` receipt lookups as a whole
    pub fn fail_next_receipt_checks(&self, n: usize) {
        self.fail_receipt_checks.store(n, Ordering::SeqCst);
    }

    /// Every batch handed to `send`, including failed ones
    pub fn batches(&self) -> Vec<Vec<PushMessage>> {
        lock(&self.sent).clone()
    }

    /// Every message handed to `send`, flattened
    pub fn sent_messages(&self) -> Vec<PushMessage> {
        lock(&self.sent).iter().flatten().cloned().collect()
    }

    pub fn sent_to(&self, token: &str) -> usize {
        lock(&self.sent)
            .iter()
            .flatten()
            .filter(|m| m.to == token)
            .count()
    }

    pub fn receipt_lookups(&self) -> Vec<Vec<String>> {
        lock(&self.receipt_lookups).clone()
    }

    /// The receipt id issued for the last accepted message to `token`
    pub fn receipt_for(&self, token: &str) -> Option<String> {
        lock(&self.issued)
            .iter()
            .filter(|(_, t)| t.as_str() == token)
            .map(|(id, _)| id.clone())
            .max()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PushProvider for MockPushProvider {
    fn max_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(100)
    }

    fn max_receipt_batch_size(&self) -> usize {
        self.receipt_batch_size.unwrap_or(300)
    }

    fn is_valid_token(&self, token: &str) -> bool {
        crate::client::is_expo_push_token(token)
    }

    fn send<'a>(&'a self, messages: &'a [PushMessage]) -> BoxFuture<'a, Vec<PushTicket>, CivicError> {
        Box::pin(async move {
            lock(&self.sent).push(messages.to_vec());

            if Self::take_failure(&self.fail_sends) {
                return Err(CivicError::TimeoutError("mock send timed out".to_string()));
            }

            let rejections = lock(&self.rejections).clone();
            let mut issued = lock(&self.issued);
            Ok(messages
                .iter()
                .map(|message| match rejections.get(&message.to) {
                    Some(code) => PushTicket::Rejected {
                        code: code.clone(),
                        message: Some(format!("{} rejected", message.to)),
                    },
                    None => {
                        let n = self.counter.fetch_add(1, Ordering::SeqCst);
                        let receipt_id = format!("receipt-{:06}", n);
                        issued.insert(receipt_id.clone(), message.to.clone());
                        PushTicket::Accepted { receipt_id }
                    }
                })
                .collect())
        })
    }

    fn check_receipts<'a>(
        &'a self,
        receipt_ids: &'a [String],
    ) -> BoxFuture<'a, HashMap<String, ReceiptStatus>, CivicError> {
        Box::pin(async move {
            lock(&self.receipt_lookups).push(receipt_ids.to_vec());

            if Self::take_failure(&self.fail_receipt_checks) {
                return Err(CivicError::ExternalServiceError {
                    service_name: "push".to_string(),
                    message: "mock receipt lookup failed".to_string(),
                });
            }

            let errors = lock(&self.receipt_errors).clone();
            let unready = lock(&self.unready_receipts).clone();
            Ok(receipt_ids
                .iter()
                .filter(|id| !unready.contains(id))
                .map(|id| {
                    let status = match errors.get(id) {
                        Some(code) => ReceiptStatus::Error {
                            code: code.clone(),
                            message: None,
                        },
                        None => ReceiptStatus::Ok,
                    };
                    (id.clone(), status)
                })
                .collect())
        })
    }
}
