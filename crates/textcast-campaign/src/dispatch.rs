//! Campaign dispatch loop.
//!
//! Strictly sequential: each recipient's send and checkpoint complete before
//! the next send starts, with a pacing pause in between.
//!
//! ```text
//! quote → confirm ("Y"?) → baseline checkpoint → for each pending recipient:
//!     render → gateway.send → accepted? mark_sent : log failure → pace
//! ```

use std::path::PathBuf;
use textcast_core::error::Result;
use textcast_core::traits::Gateway;
use textcast_core::types::{Recipient, RecipientSet};

use crate::pacing::Pacer;
use crate::recovery::RecoveryTracker;
use crate::template::MessageTemplate;

/// What the operator is asked to approve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CampaignQuote {
    pub recipients: usize,
    pub estimated_cost: f64,
}

impl CampaignQuote {
    pub fn new(recipients: usize, cost_per_message: f64) -> Self {
        Self {
            recipients,
            estimated_cost: cost_per_message * recipients as f64,
        }
    }
}

impl std::fmt::Display for CampaignQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Start sending {} SMS for ${:.4} (Y/[N])? ",
            self.recipients, self.estimated_cost
        )
    }
}

/// Operator confirmation boundary. Any closure taking the quote and
/// returning the operator's answer works.
pub trait Confirm {
    fn confirm(&mut self, quote: &CampaignQuote) -> String;
}

impl<F> Confirm for F
where
    F: FnMut(&CampaignQuote) -> String,
{
    fn confirm(&mut self, quote: &CampaignQuote) -> String {
        self(quote)
    }
}

/// Only a case-insensitive "Y" proceeds.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Per-run parameters.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Sender address handed to the gateway.
    pub sender: String,
    pub cost_per_message: f64,
    /// Value substituted for `{link}`.
    pub link: String,
    /// Checkpoint file; `None` disables recovery.
    pub checkpoint: Option<PathBuf>,
}

/// Outcome of one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// The operator approved the run.
    pub confirmed: bool,
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    /// Recipients still pending at the end of the run.
    pub remaining: usize,
}

/// Drives one campaign through a gateway.
pub struct Dispatcher<'a> {
    gateway: &'a dyn Gateway,
    pacer: Box<dyn Pacer + 'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gateway: &'a dyn Gateway, pacer: impl Pacer + 'a) -> Self {
        Self {
            gateway,
            pacer: Box::new(pacer),
        }
    }

    /// Run the campaign over `pending`.
    ///
    /// A declined confirmation returns a report with `confirmed == false`
    /// without calling the gateway or touching the checkpoint. Per-message
    /// failures are counted and the recipient stays pending. A gateway `Err`
    /// aborts the loop and is returned as-is; the checkpoint then holds exactly
    /// the recipients not yet confirmed.
    pub async fn run<C: Confirm>(
        &mut self,
        pending: &RecipientSet,
        template: &MessageTemplate,
        options: &DispatchOptions,
        mut confirm: C,
    ) -> Result<DispatchReport> {
        let quote = CampaignQuote::new(pending.len(), options.cost_per_message);
        let answer = confirm.confirm(&quote);
        if !is_affirmative(&answer) {
            tracing::info!("Dispatch cancelled by operator");
            return Ok(DispatchReport {
                remaining: pending.len(),
                ..DispatchReport::default()
            });
        }

        let mut tracker = RecoveryTracker::initialize(pending, options.checkpoint.as_deref())?;
        let template = template.with_link(&options.link);
        let total = pending.len();
        let mut report = DispatchReport {
            confirmed: true,
            ..DispatchReport::default()
        };

        for (i, recipient) in pending.iter().enumerate() {
            if i > 0 {
                self.pacer.pace().await;
            }
            report.attempted += 1;

            if self.deliver(recipient, &template, &options.sender).await? {
                tracker.mark_sent(recipient)?;
                report.sent += 1;
                tracing::info!("{}/{} SMS sent", report.sent, total);
            } else {
                report.failed += 1;
            }
        }

        report.remaining = tracker.pending().len();
        tracing::info!(
            "Sending SMS is done: {} sent, {} failed, {} remaining",
            report.sent,
            report.failed,
            report.remaining
        );
        Ok(report)
    }

    /// Send one message outside of any campaign bookkeeping.
    pub async fn send_one(
        &self,
        recipient: &Recipient,
        template: &MessageTemplate,
        options: &DispatchOptions,
    ) -> Result<bool> {
        let template = template.with_link(&options.link);
        self.deliver(recipient, &template, &options.sender).await
    }

    /// Returns whether the gateway accepted the message.
    async fn deliver(
        &self,
        recipient: &Recipient,
        template: &MessageTemplate,
        sender: &str,
    ) -> Result<bool> {
        tracing::info!(
            "Sending SMS to {} {} at {}",
            recipient.first_name(),
            recipient.last_name(),
            recipient.phone_number()
        );
        let body = template.render(recipient);
        let receipt = self
            .gateway
            .send(recipient.phone_number(), sender, &body)
            .await?;

        match receipt {
            Some(receipt) if receipt.is_accepted() => {
                tracing::debug!(
                    "Sent SMS to {} via {} (status={}, id={})",
                    recipient.phone_number(),
                    self.gateway.name(),
                    receipt.status,
                    receipt.id.as_deref().unwrap_or("-")
                );
                Ok(true)
            }
            Some(receipt) => {
                tracing::error!(
                    "Failed to send SMS to {} (status={})",
                    recipient.phone_number(),
                    receipt.status
                );
                Ok(false)
            }
            None => {
                tracing::error!(
                    "Failed to send SMS to {} (no result)",
                    recipient.phone_number()
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::Unpaced;
    use crate::{merge, store};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use textcast_core::error::CampaignError;
    use textcast_core::traits::SendReceipt;

    #[derive(Clone)]
    enum Reply {
        Status(&'static str),
        NoResult,
        Fatal,
    }

    /// Records every call; replies per destination, defaulting to `sent`.
    /// `fail_after` turns every call past the given count into a fatal error.
    #[derive(Default)]
    struct FakeGateway {
        replies: HashMap<String, Reply>,
        fail_after: Option<usize>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeGateway {
        fn reply(mut self, to: &str, reply: Reply) -> Self {
            self.replies.insert(to.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, to: &str, from: &str, body: &str) -> Result<Option<SendReceipt>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((to.to_string(), from.to_string(), body.to_string()));
            if let Some(limit) = self.fail_after {
                if calls.len() > limit {
                    return Err(CampaignError::Gateway("connection reset".into()));
                }
            }
            match self.replies.get(to).cloned().unwrap_or(Reply::Status("sent")) {
                Reply::Status(status) => Ok(Some(SendReceipt::new(status, Some("SM1".into())))),
                Reply::NoResult => Ok(None),
                Reply::Fatal => Err(CampaignError::AuthFailed("bad token".into())),
            }
        }
    }

    fn recipients(n: usize) -> RecipientSet {
        (1..=n)
            .map(|i| {
                Recipient::new(
                    format!("First{i}"),
                    format!("Last{i}"),
                    format!("r{i}@x.com"),
                    i.to_string(),
                    format!("+1555000{i:04}"),
                )
            })
            .collect()
    }

    fn options(checkpoint: Option<PathBuf>) -> DispatchOptions {
        DispatchOptions {
            sender: "+15559990000".into(),
            cost_per_message: 0.0075,
            link: "https://example.test".into(),
            checkpoint,
        }
    }

    fn yes(_: &CampaignQuote) -> String {
        "Y\n".into()
    }

    #[test]
    fn test_quote_and_answers() {
        let quote = CampaignQuote::new(4, 0.0075);
        assert!((quote.estimated_cost - 0.03).abs() < 1e-12);
        assert!(quote.to_string().contains("4 SMS"));
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" Y\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative("n"));
    }

    #[tokio::test]
    async fn test_declined_confirmation_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("recovery.csv");
        let pending = recipients(3);
        let before = pending.clone();
        let gateway = FakeGateway::default();
        let template = MessageTemplate::new("hi {firstname}");

        for answer in ["n", "", "yes", "N", "maybe"] {
            let mut dispatcher = Dispatcher::new(&gateway, Unpaced);
            let mut seen = None;
            let report = dispatcher
                .run(&pending, &template, &options(Some(checkpoint.clone())), |q: &CampaignQuote| {
                    seen = Some(*q);
                    answer.to_string()
                })
                .await
                .unwrap();
            assert!(!report.confirmed);
            assert_eq!(report.attempted, 0);
            assert_eq!(report.remaining, 3);
            assert_eq!(seen.unwrap().recipients, 3);
        }

        assert!(gateway.calls().is_empty());
        assert!(!checkpoint.exists());
        assert_eq!(pending, before);
    }

    #[tokio::test]
    async fn test_partial_failures_stay_pending() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("recovery.csv");
        let pending = recipients(4);
        let gateway = FakeGateway::default()
            .reply("+15550000002", Reply::Status("failed"))
            .reply("+15550000003", Reply::NoResult)
            .reply("+15550000004", Reply::Status("queued"));
        let template = MessageTemplate::new("{firstname}");

        let report = Dispatcher::new(&gateway, Unpaced)
            .run(&pending, &template, &options(Some(checkpoint.clone())), yes)
            .await
            .unwrap();

        assert_eq!(report.attempted, 4);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.remaining, 2);

        let left = store::load(&checkpoint).unwrap();
        let phones: Vec<&str> = left.iter().map(|r| r.phone_number()).collect();
        assert_eq!(left.len(), 2);
        assert!(phones.contains(&"+15550000002"));
        assert!(phones.contains(&"+15550000003"));
        assert!(left.is_subset(&pending));
    }

    #[tokio::test]
    async fn test_fatal_error_leaves_resumable_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("recovery.csv");
        let pending = recipients(5);
        let gateway = FakeGateway {
            fail_after: Some(2),
            ..FakeGateway::default()
        };
        let template = MessageTemplate::new("{uid}");

        let err = Dispatcher::new(&gateway, Unpaced)
            .run(&pending, &template, &options(Some(checkpoint.clone())), yes)
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::Gateway(_)));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 3);
        let confirmed: Vec<&str> = calls[..2].iter().map(|c| c.0.as_str()).collect();

        let left = store::load(&checkpoint).unwrap();
        assert_eq!(left.len(), 5 - 2);
        assert!(left.iter().all(|r| !confirmed.contains(&r.phone_number())));
        assert!(left.iter().any(|r| r.phone_number() == calls[2].0));

        // Resuming only retries what was never confirmed.
        let resumed = RecoveryTracker::resume(&checkpoint).unwrap();
        let gateway = FakeGateway::default();
        let report = Dispatcher::new(&gateway, Unpaced)
            .run(resumed.pending(), &template, &options(Some(checkpoint.clone())), yes)
            .await
            .unwrap();
        assert_eq!(report.sent, 3);
        assert!(gateway.calls().iter().all(|c| !confirmed.contains(&c.0.as_str())));
        assert!(store::load(&checkpoint).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_immediately() {
        let pending = recipients(1);
        let gateway = FakeGateway::default().reply("+15550000001", Reply::Fatal);
        let err = Dispatcher::new(&gateway, Unpaced)
            .run(&pending, &MessageTemplate::new("x"), &options(None), yes)
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_recovery_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let report = Dispatcher::new(&gateway, Unpaced)
            .run(&recipients(2), &MessageTemplate::new("x"), &options(None), yes)
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.remaining, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_pacer_runs_between_sends() {
        struct Counting<'c>(&'c Mutex<usize>);

        #[async_trait]
        impl Pacer for Counting<'_> {
            async fn pace(&mut self) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let paced = Mutex::new(0);
        let gateway = FakeGateway::default().reply("+15550000002", Reply::Status("failed"));
        Dispatcher::new(&gateway, Counting(&paced))
            .run(&recipients(3), &MessageTemplate::new("x"), &options(None), yes)
            .await
            .unwrap();
        assert_eq!(*paced.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_single_recipient_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("recovery.csv");
        let ids = "Email,First Name,Last Name,UID\na@x.com,John,Doe,1\n";
        let contacts = "Email,First Name,Last Name,Phone Number\na@x.com,,,+15551234567\n";
        let merged = merge::merge_readers(ids.as_bytes(), contacts.as_bytes()).unwrap();

        let john = Recipient::new("John", "Doe", "a@x.com", "1", "+15551234567");
        assert_eq!(merged.len(), 1);
        assert!(merged.contains(&john));

        let gateway = FakeGateway::default();
        let template =
            MessageTemplate::new("{firstname} {lastname} {email} {uid} {phonenumber} {link}");
        let mut quoted = None;
        let report = Dispatcher::new(&gateway, Unpaced)
            .run(
                &merged,
                &template,
                &options(Some(checkpoint.clone())),
                |q: &CampaignQuote| {
                    quoted = Some(*q);
                    "y".to_string()
                },
            )
            .await
            .unwrap();

        assert!((quoted.unwrap().estimated_cost - 0.0075).abs() < 1e-12);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 0);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            (
                "+15551234567".to_string(),
                "+15559990000".to_string(),
                "John Doe a@x.com 1 +15551234567 https://example.test".to_string()
            )
        );
        assert!(store::load(&checkpoint).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_one_uses_same_render_path() {
        let gateway = FakeGateway::default();
        let dispatcher = Dispatcher::new(&gateway, Unpaced);
        let probe = Recipient::new("Test", "User", "t@x.com", "0", "+15550001111");
        let accepted = dispatcher
            .send_one(&probe, &MessageTemplate::new("{firstname} {link}"), &options(None))
            .await
            .unwrap();
        assert!(accepted);
        assert_eq!(gateway.calls()[0].2, "Test https://example.test");
    }
}
