//! One matching cycle for one alert type
//!
//! Fetch candidate events, load everyone subscribed to the type and, for
//! every (recipient, event) pair that matches, deliver at most once:
//!
//! 1. skip if the ledger already has the key
//! 2. resolve the recipient's active tokens; none means skip without claiming
//! 3. claim the key in the ledger; losing the claim means another run owns it
//! 4. dispatch, and give the claim back if no token accepted the message
//!
//! Correctness rests on the ledger's insert-if-absent claim, not on any
//! in-process locking, so overlapping cycles are safe.

use crate::matcher::matches;
use crate::recipients::{load_recipients, Recipient};
use civic_common::{AlertType, CandidateEvent, CivicError, EventSource};
use civic_db::{DedupLedger, SqlDedupLedger, SqlSubscriptionRepository};
use civic_push::PushDispatcher;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Default number of recipients processed at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub alert_type: AlertType,
    pub events: usize,
    pub recipients: usize,
    /// (recipient, event) pairs that matched
    pub matched: usize,
    pub already_notified: usize,
    pub dispatched: usize,
    pub no_targets: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(alert_type: AlertType) -> Self {
        Self {
            alert_type,
            events: 0,
            recipients: 0,
            matched: 0,
            already_notified: 0,
            dispatched: 0,
            no_targets: 0,
            failed: 0,
        }
    }

    fn absorb(&mut self, tally: Tally) {
        self.matched += tally.matched;
        self.already_notified += tally.already_notified;
        self.dispatched += tally.dispatched;
        self.no_targets += tally.no_targets;
        self.failed += tally.failed;
    }
}

#[derive(Debug, Default)]
struct Tally {
    matched: usize,
    already_notified: usize,
    dispatched: usize,
    no_targets: usize,
    failed: usize,
}

enum Delivery {
    AlreadyNotified,
    NoTargets,
    Dispatched,
    NotAccepted,
}

#[derive(Clone)]
pub struct MatchingCycle {
    subscriptions: SqlSubscriptionRepository,
    ledger: SqlDedupLedger,
    dispatcher: PushDispatcher,
    concurrency: usize,
}

impl MatchingCycle {
    pub fn new(
        subscriptions: SqlSubscriptionRepository,
        ledger: SqlDedupLedger,
        dispatcher: PushDispatcher,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            dispatcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch from `source` and run the cycle for its alert type.
    ///
    /// A failed fetch fails the cycle; the next scheduled run tries again.
    pub async fn run(&self, source: &dyn EventSource) -> Result<CycleReport, CivicError> {
        let alert_type = source.alert_type();
        let events = source.fetch().await.map_err(|e| {
            warn!(%alert_type, "Failed to fetch candidate events: {}", e);
            e
        })?;
        self.run_events(alert_type, &events).await
    }

    /// Run the cycle for `alert_type` over already fetched events.
    ///
    /// Only loading the recipients can fail the cycle; per-recipient
    /// failures are counted and logged.
    pub async fn run_events(
        &self,
        alert_type: AlertType,
        events: &[CandidateEvent],
    ) -> Result<CycleReport, CivicError> {
        let mut report = CycleReport::new(alert_type);

        let events: Vec<&CandidateEvent> = events
            .iter()
            .filter(|e| e.alert_type() == alert_type)
            .collect();
        report.events = events.len();
        if events.is_empty() {
            debug!(%alert_type, "No candidate events");
            return Ok(report);
        }

        let recipients = load_recipients(&self.subscriptions, alert_type).await?;
        report.recipients = recipients.len();

        let work: Vec<_> = recipients
            .iter()
            .map(|recipient| self.process_recipient(recipient, &events))
            .collect();
        let tallies: Vec<Tally> = stream::iter(work)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for tally in tallies {
            report.absorb(tally);
        }

        info!(
            %alert_type,
            events = report.events,
            recipients = report.recipients,
            matched = report.matched,
            already_notified = report.already_notified,
            dispatched = report.dispatched,
            no_targets = report.no_targets,
            failed = report.failed,
            "Matching cycle finished"
        );
        Ok(report)
    }

    async fn process_recipient(&self, recipient: &Recipient, events: &[&CandidateEvent]) -> Tally {
        let mut tally = Tally::default();

        for event in events {
            if !matches(&recipient.config, event) {
                continue;
            }
            tally.matched += 1;

            match self.deliver(recipient, event).await {
                Ok(Delivery::AlreadyNotified) => tally.already_notified += 1,
                Ok(Delivery::NoTargets) => tally.no_targets += 1,
                Ok(Delivery::Dispatched) => tally.dispatched += 1,
                Ok(Delivery::NotAccepted) => tally.failed += 1,
                Err(e) => {
                    warn!(
                        identity = %recipient.identity,
                        source_id = %event.source_id,
                        "Skipping recipient this cycle: {}",
                        e
                    );
                    tally.failed += 1;
                }
            }
        }
        tally
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        event: &CandidateEvent,
    ) -> Result<Delivery, CivicError> {
        let identity = &recipient.identity;
        let alert_type = event.alert_type();
        let source_id = event.source_id.as_str();

        if self
            .ledger
            .has_triggered(identity, alert_type, source_id)
            .await?
        {
            return Ok(Delivery::AlreadyNotified);
        }

        let targets = self.dispatcher.tokens().active_targets(identity).await?;
        if targets.is_empty() {
            debug!(%identity, "No active push tokens");
            return Ok(Delivery::NoTargets);
        }

        if !self
            .ledger
            .record_triggered(identity, alert_type, source_id, &event.snapshot())
            .await?
        {
            debug!(%identity, %source_id, "Claim lost to a concurrent run");
            return Ok(Delivery::AlreadyNotified);
        }

        let report = self
            .dispatcher
            .dispatch(identity, &targets, &event.payload())
            .await;
        if report.any_accepted() {
            return Ok(Delivery::Dispatched);
        }

        // Nobody got it; let a later cycle try again.
        if let Err(e) = self.ledger.release(identity, alert_type, source_id).await {
            error!(%identity, %source_id, "Failed to release ledger claim: {}", e);
        }
        Ok(Delivery::NotAccepted)
    }
}
