//! Fan-out of one notification to an identity's push tokens

use crate::tokens::TokenLifecycleManager;
use chrono::Utc;
use civic_common::{
    Identity, PushErrorCode, PushMessage, PushPayload, PushProvider, PushTarget, PushTicket,
};
use civic_db::{ReceiptRepository, SqlReceiptRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SOUND: &str = "default";
const PRIORITY: &str = "high";

/// Outcome for one token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenOutcome {
    pub token: String,
    pub ticket: PushTicket,
}

/// Per-token outcomes of one dispatch, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub outcomes: Vec<TokenOutcome>,
}

impl DispatchReport {
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.ticket, PushTicket::Accepted { .. }))
            .count()
    }

    /// Rejections that killed the token
    pub fn permanent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.ticket, PushTicket::Rejected { code, .. } if code.is_permanent()))
            .count()
    }

    /// Everything else that was not accepted, transient failures included
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.accepted() - self.permanent()
    }

    pub fn any_accepted(&self) -> bool {
        self.accepted() > 0
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            targets: self.outcomes.len(),
            accepted: self.accepted(),
            permanent: self.permanent(),
            failed: self.failed(),
        }
    }
}

/// Counts of a [`DispatchReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub targets: usize,
    pub accepted: usize,
    pub permanent: usize,
    pub failed: usize,
}

/// Sends a payload to a list of tokens through the provider.
///
/// Large fan-outs are chunked to the provider's batch size; a failing chunk
/// does not stop the remaining ones. Permanently invalid tokens are
/// deactivated on the spot and every accepted message leaves a pending
/// receipt behind.
#[derive(Clone)]
pub struct PushDispatcher {
    provider: Arc<dyn PushProvider>,
    tokens: TokenLifecycleManager,
    receipts: SqlReceiptRepository,
}

impl PushDispatcher {
    pub fn new(
        provider: Arc<dyn PushProvider>,
        tokens: TokenLifecycleManager,
        receipts: SqlReceiptRepository,
    ) -> Self {
        Self {
            provider,
            tokens,
            receipts,
        }
    }

    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    fn message(target: &PushTarget, payload: &PushPayload) -> PushMessage {
        PushMessage {
            to: target.token.clone(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            data: payload.data.clone(),
            sound: SOUND,
            priority: PRIORITY,
        }
    }

    /// Dispatch `payload` to `targets` on behalf of `identity`.
    ///
    /// Never fails: provider and persistence errors are folded into the
    /// per-token outcomes and the log.
    pub async fn dispatch(
        &self,
        identity: &Identity,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> DispatchReport {
        let mut tickets: Vec<Option<PushTicket>> = vec![None; targets.len()];
        let mut pending: Vec<(usize, PushMessage)> = Vec::with_capacity(targets.len());

        for (index, target) in targets.iter().enumerate() {
            if self.provider.is_valid_token(&target.token) {
                pending.push((index, Self::message(target, payload)));
            } else {
                tickets[index] = Some(PushTicket::Rejected {
                    code: PushErrorCode::InvalidToken,
                    message: Some("malformed push token".to_string()),
                });
            }
        }

        for chunk in pending.chunks(self.provider.max_batch_size().max(1)) {
            let messages: Vec<PushMessage> = chunk.iter().map(|(_, m)| m.clone()).collect();

            match self.provider.send(&messages).await {
                Ok(results) => {
                    if results.len() != chunk.len() {
                        warn!(
                            %identity,
                            expected = chunk.len(),
                            got = results.len(),
                            "Provider returned a mismatched number of tickets"
                        );
                    }
                    let mut results = results.into_iter();
                    for (index, _) in chunk {
                        tickets[*index] = Some(results.next().unwrap_or(PushTicket::Rejected {
                            code: PushErrorCode::Transient,
                            message: Some("no ticket returned".to_string()),
                        }));
                    }
                }
                Err(e) => {
                    warn!(%identity, size = chunk.len(), "Push chunk failed: {}", e);
                    for (index, _) in chunk {
                        tickets[*index] = Some(PushTicket::Rejected {
                            code: PushErrorCode::Transient,
                            message: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        let sent_at = Utc::now();
        let mut outcomes = Vec::with_capacity(targets.len());
        for (target, ticket) in targets.iter().zip(tickets) {
            let ticket = ticket.unwrap_or(PushTicket::Rejected {
                code: PushErrorCode::Transient,
                message: None,
            });
            self.settle(identity, &target.token, &ticket, sent_at).await;
            outcomes.push(TokenOutcome {
                token: target.token.clone(),
                ticket,
            });
        }

        let report = DispatchReport { outcomes };
        let summary = report.summary();
        info!(
            %identity,
            targets = summary.targets,
            accepted = summary.accepted,
            permanent = summary.permanent,
            failed = summary.failed,
            "Dispatch finished"
        );
        report
    }

    /// Record the side effects of one ticket
    async fn settle(
        &self,
        identity: &Identity,
        token: &str,
        ticket: &PushTicket,
        sent_at: chrono::DateTime<Utc>,
    ) {
        match ticket {
            PushTicket::Accepted { receipt_id } => {
                if let Err(e) = self
                    .receipts
                    .insert_pending(receipt_id, identity, token, sent_at)
                    .await
                {
                    error!(%identity, %receipt_id, "Failed to store pending receipt: {}", e);
                }
            }
            PushTicket::Rejected { code, message } if code.is_permanent() => {
                warn!(%identity, code = code.as_str(), ?message, "Token permanently rejected");
                if let Err(e) = self.tokens.deactivate(token).await {
                    error!(%identity, "Failed to deactivate token: {}", e);
                }
            }
            PushTicket::Rejected { code, message } => {
                debug!(%identity, code = code.as_str(), ?message, "Token rejected, left active");
            }
        }
    }
}
