//! Event intake - Turns inbound user events into replies and side effects.
//!
//! Every event holds its sender's session lock from start to finish, so two events
//! from the same user behave as if they arrived one after the other. Messages for
//! other users (admin alerts, payer notices, broadcasts) are only collected while the
//! lock is held; [`Dispatcher::handle`] sends them from a separate task once it is
//! released.

use crate::{
    config::AppConfig,
    core::{
        admin::Admin,
        codes,
        commands::{self, AdminCommand, Command, UserCommand},
        conversation::{self, Action, ConversationState, Event, FlowRules, PaymentDraft, Prompt},
        ledger,
        notify::{self, Notification, Notifier},
        payments::{self, ReviewOutcome},
        replies::{self, Reply, labels},
        sessions::SessionTable,
    },
    entities::{PaymentModel, UserId},
    errors::{Error, Result},
    lookup::RecordLookup,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::instrument;

/// One inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Free text or a button label
    Text {
        /// Sender
        user_id: UserId,
        /// Message body
        text: String,
    },
    /// An uploaded image
    Photo {
        /// Sender
        user_id: UserId,
        /// Transport reference of the image
        image_ref: String,
    },
    /// A slash command
    Command {
        /// Sender
        user_id: UserId,
        /// Command name without the slash
        name: String,
        /// Raw argument string
        args: String,
    },
}

impl InboundEvent {
    /// Sender of the event
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::Text { user_id, .. }
            | Self::Photo { user_id, .. }
            | Self::Command { user_id, .. } => *user_id,
        }
    }
}

/// Replies for the sender and notifications for everyone else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Sent back to the sender, in order
    pub replies: Vec<Reply>,
    /// Delivered after the sender's lock is released
    pub notifications: Vec<Notification>,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            notifications: Vec::new(),
        }
    }

    fn notify(mut self, notifications: impl IntoIterator<Item = Notification>) -> Self {
        self.notifications.extend(notifications);
        self
    }
}

/// Routes events to the conversation, the ledger and the admin surface.
pub struct Dispatcher {
    db: DatabaseConnection,
    config: Arc<AppConfig>,
    sessions: SessionTable,
    lookup: Arc<dyn RecordLookup>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty session table.
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        lookup: Arc<dyn RecordLookup>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            sessions: SessionTable::new(),
            lookup,
            notifier,
        }
    }

    /// Application settings
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Database handle
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Per-user conversation states
    #[must_use]
    pub const fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Processes `event` and hands its notifications to a background task.
    #[instrument(skip(self), fields(user_id = event.user_id()))]
    pub async fn handle(&self, event: InboundEvent) -> Result<Vec<Reply>> {
        let Outcome {
            replies,
            notifications,
        } = self.process(event).await?;

        if !notifications.is_empty() {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                notify::deliver(notifier.as_ref(), notifications).await;
            });
        }
        Ok(replies)
    }

    /// Processes `event` under the sender's lock without delivering notifications.
    ///
    /// Domain errors come back as replies. Persistence failures reset the sender's
    /// conversation and are returned as errors.
    pub async fn process(&self, event: InboundEvent) -> Result<Outcome> {
        let user_id = event.user_id();
        let mut state = self.sessions.lock(user_id).await;
        let admin = self.config.is_admin(user_id);

        let result = match ledger::ensure_user(&self.db, user_id).await {
            Ok(user) if user.blocked => {
                tracing::debug!(user_id, "Ignoring event from blocked user");
                return Ok(Outcome::reply(replies::blocked()));
            }
            Ok(_) => match event {
                InboundEvent::Command { name, args, .. } => {
                    self.command(user_id, admin, &mut state, &name, &args)
                        .await
                }
                InboundEvent::Text { text, .. } => {
                    self.converse(user_id, admin, &mut state, Event::from_text(&text))
                        .await
                }
                InboundEvent::Photo { image_ref, .. } => {
                    self.converse(user_id, admin, &mut state, Event::Photo(image_ref))
                        .await
                }
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_user_facing() => {
                tracing::debug!(user_id, "Event rejected: {e}");
                Ok(Outcome::reply(replies::error(&e, admin)))
            }
            Err(e) => {
                *state = ConversationState::default();
                tracing::error!(user_id, "Event failed: {e}");
                Err(e)
            }
        }
    }

    async fn converse(
        &self,
        user_id: UserId,
        admin: bool,
        state: &mut ConversationState,
        event: Event,
    ) -> Result<Outcome> {
        let rules = FlowRules {
            min_reference_len: self.config.payments.min_reference_len,
        };
        let step = conversation::transition(state, &event, &rules);

        match step.action {
            Action::Prompt(prompt) => {
                *state = step.next;
                Ok(Outcome::reply(replies::prompt(&prompt, admin)))
            }
            Action::BeginLookup => {
                let balance = ledger::balance(&self.db, user_id).await?;
                if balance < self.config.lookup.cost {
                    return Ok(Outcome::reply(replies::not_enough_credits(
                        &self.config,
                        balance,
                        admin,
                    )));
                }
                *state = step.next;
                Ok(Outcome::reply(replies::prompt(&Prompt::AskQuery, admin)))
            }
            Action::Lookup { query } => {
                *state = step.next;
                self.run_lookup(user_id, admin, &query).await
            }
            Action::Submit(draft) => {
                // A failed submit leaves the draft in place so Confirm can be pressed again
                let outcome = self.submit_payment(user_id, admin, draft).await?;
                *state = step.next;
                Ok(outcome)
            }
            Action::Unhandled => self.menu(user_id, admin, &event).await,
        }
    }

    /// Debits the lookup cost only after the fetch succeeds.
    #[instrument(skip(self, admin))]
    async fn run_lookup(&self, user_id: UserId, admin: bool, query: &str) -> Result<Outcome> {
        let cost = self.config.lookup.cost;
        let balance = ledger::balance(&self.db, user_id).await?;
        if balance < cost {
            return Ok(Outcome::reply(replies::not_enough_credits(
                &self.config,
                balance,
                admin,
            )));
        }

        let fetched = tokio::time::timeout(self.config.lookup.timeout(), self.lookup.fetch(query))
            .await
            .unwrap_or_else(|_| {
                Err(Error::Lookup {
                    reason: "Request timed out".to_string(),
                })
            });
        let record = match fetched {
            Ok(record) => record,
            Err(e) => {
                let reason = match e {
                    Error::Lookup { reason } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(user_id, query, "Lookup failed: {reason}");
                return Ok(Outcome::reply(replies::lookup_failed(&reason, admin)));
            }
        };

        let user = ledger::charge_lookup(&self.db, user_id, cost).await?;
        tracing::info!(user_id, query, balance = user.credits, "Lookup charged");
        Ok(Outcome::reply(replies::lookup_result(
            record.render_card(),
            user.credits,
            admin,
        )))
    }

    async fn submit_payment(
        &self,
        user_id: UserId,
        admin: bool,
        draft: PaymentDraft,
    ) -> Result<Outcome> {
        let payment =
            payments::submit(&self.db, user_id, draft.amount, draft.reference, draft.screenshot)
                .await?;
        Ok(Outcome::reply(replies::payment_submitted(&payment, admin))
            .notify(self.payment_alerts(&payment)))
    }

    fn payment_alerts(&self, payment: &PaymentModel) -> Vec<Notification> {
        let caption = replies::payment_caption(payment);
        let actions = replies::payment_actions(payment);
        self.config
            .admin_ids
            .iter()
            .flat_map(|&to| {
                let first = if payment.screenshot_ref.is_empty() {
                    Notification::text(to, caption.clone())
                } else {
                    Notification::Photo {
                        to,
                        image_ref: payment.screenshot_ref.clone(),
                        caption: caption.clone(),
                    }
                };
                [first, Notification::text(to, actions.clone())]
            })
            .collect()
    }

    fn admin_notices(&self, text: &str) -> Vec<Notification> {
        self.config
            .admin_ids
            .iter()
            .map(|&to| Notification::text(to, text))
            .collect()
    }

    async fn menu(&self, user_id: UserId, admin: bool, event: &Event) -> Result<Outcome> {
        let Event::Text(text) = event else {
            return Ok(Outcome::reply(replies::invalid_input(admin)));
        };

        let reply = match text.as_str() {
            labels::BUY_CREDITS => replies::buy_info(&self.config),
            labels::BALANCE => replies::balance(ledger::balance(&self.db, user_id).await?, admin),
            labels::PROFILE => {
                replies::profile(&ledger::ensure_user(&self.db, user_id).await?, admin)
            }
            labels::HELP => replies::help(&self.config, admin),
            labels::ADMIN_PANEL
            | labels::PENDING_PAYMENTS
            | labels::STATS
            | labels::GENERATE_CODES
            | labels::VIEW_CODES => {
                let handle = Admin::authorize(&self.config, user_id)?;
                self.admin_panel(&handle, text).await?
            }
            _ => replies::invalid_input(admin),
        };
        Ok(Outcome::reply(reply))
    }

    async fn admin_panel(&self, admin: &Admin, label: &str) -> Result<Reply> {
        let reply = match label {
            labels::PENDING_PAYMENTS => replies::pending_payments(
                &admin
                    .pending(&self.db, self.config.payments.pending_list_limit)
                    .await?,
            ),
            labels::STATS => replies::stats(&admin.stats(&self.db).await?),
            labels::GENERATE_CODES => replies::generate_codes_help(self.config.codes.max_batch),
            labels::VIEW_CODES => replies::code_overview(&admin.codes(&self.db).await?),
            _ => replies::admin_panel(),
        };
        Ok(reply)
    }

    async fn command(
        &self,
        user_id: UserId,
        admin: bool,
        state: &mut ConversationState,
        name: &str,
        args: &str,
    ) -> Result<Outcome> {
        // Authorize before looking at arguments
        let handle = if commands::is_admin_command(name) {
            Some(Admin::authorize(&self.config, user_id)?)
        } else {
            None
        };

        match (Command::parse(name, args)?, handle) {
            (Command::User(command), _) => self.user_command(user_id, admin, state, command).await,
            (Command::Admin(command), Some(handle)) => self.admin_command(&handle, command).await,
            (Command::Admin(_), None) => Err(Error::Unauthorized { user_id }),
        }
    }

    async fn user_command(
        &self,
        user_id: UserId,
        admin: bool,
        state: &mut ConversationState,
        command: UserCommand,
    ) -> Result<Outcome> {
        let reply = match command {
            UserCommand::Start => {
                *state = ConversationState::default();
                replies::welcome(admin)
            }
            UserCommand::Help => replies::help(&self.config, admin),
            UserCommand::Balance => {
                replies::balance(ledger::balance(&self.db, user_id).await?, admin)
            }
            UserCommand::Redeem { code } => {
                let redemption = codes::redeem(&self.db, &code, user_id).await?;
                let notice = replies::redemption_notice(&redemption.code, user_id);
                return Ok(Outcome::reply(replies::redeemed(
                    redemption.code.credits,
                    redemption.balance,
                ))
                .notify(self.admin_notices(&notice)));
            }
        };
        Ok(Outcome::reply(reply))
    }

    async fn admin_command(&self, admin: &Admin, command: AdminCommand) -> Result<Outcome> {
        let db = &self.db;
        let outcome = match command {
            AdminCommand::Approve {
                payment_id,
                credits,
            } => {
                let review = admin.approve(db, &payment_id, credits).await?;
                let notice = match &review {
                    ReviewOutcome::Approved { payment, balance } => Some(Notification::text(
                        payment.user_id,
                        replies::payment_approved_notice(&payment.id, credits, *balance),
                    )),
                    _ => None,
                };
                Outcome::reply(replies::review_outcome(&review)).notify(notice)
            }
            AdminCommand::Reject { payment_id } => {
                let review = admin.reject(db, &payment_id).await?;
                let notice = match &review {
                    ReviewOutcome::Rejected { payment } => Some(Notification::text(
                        payment.user_id,
                        replies::payment_rejected_notice(&payment.id),
                    )),
                    _ => None,
                };
                Outcome::reply(replies::review_outcome(&review)).notify(notice)
            }
            AdminCommand::Add { user_id, credits } => {
                let balance = admin.add_credits(db, user_id, credits).await?;
                Outcome::reply(replies::credits_added(user_id, credits, balance))
            }
            AdminCommand::Block { user_id } => {
                Outcome::reply(replies::block_changed(&admin.set_blocked(db, user_id, true).await?))
            }
            AdminCommand::Unblock { user_id } => Outcome::reply(replies::block_changed(
                &admin.set_blocked(db, user_id, false).await?,
            )),
            AdminCommand::Users => Outcome::reply(replies::user_summary(&admin.stats(db).await?)),
            AdminCommand::Gen { count, credits } => {
                let generated = admin
                    .generate_batch(db, count, credits, self.config.codes.max_batch)
                    .await?;
                Outcome::reply(replies::generated_codes(&generated, credits))
            }
            AdminCommand::Pending => Outcome::reply(replies::pending_payments(
                &admin
                    .pending(db, self.config.payments.pending_list_limit)
                    .await?,
            )),
            AdminCommand::Stats => Outcome::reply(replies::stats(&admin.stats(db).await?)),
            AdminCommand::Codes => Outcome::reply(replies::code_overview(&admin.codes(db).await?)),
            AdminCommand::Broadcast { message } => {
                let batch = admin.broadcast(db, &message).await?;
                Outcome::reply(replies::broadcast_queued(batch.len())).notify(batch)
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::conversation::Step,
        entities::PaymentStatus,
        test_utils::{StubLookup, TEST_ADMIN, TestHarness, test_config},
    };
    use std::time::Duration;

    fn text(user_id: UserId, text: &str) -> InboundEvent {
        InboundEvent::Text {
            user_id,
            text: text.to_string(),
        }
    }

    fn photo(user_id: UserId, image_ref: &str) -> InboundEvent {
        InboundEvent::Photo {
            user_id,
            image_ref: image_ref.to_string(),
        }
    }

    fn command(user_id: UserId, name: &str, args: &str) -> InboundEvent {
        InboundEvent::Command {
            user_id,
            name: name.to_string(),
            args: args.to_string(),
        }
    }

    async fn run(h: &TestHarness, events: Vec<InboundEvent>) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(h.dispatcher.process(event).await?);
        }
        Ok(outcomes)
    }

    fn last_text(outcomes: &[Outcome]) -> &str {
        &outcomes.last().unwrap().replies.last().unwrap().text
    }

    fn purchase(user_id: UserId, amount: &str, reference: &str) -> Vec<InboundEvent> {
        vec![
            text(user_id, labels::BUY_CREDITS),
            text(user_id, labels::PAYMENT_DONE),
            text(user_id, amount),
            text(user_id, labels::CONFIRM_AMOUNT),
            photo(user_id, "screenshot-1"),
            text(user_id, labels::CONFIRM_SCREENSHOT),
            text(user_id, reference),
            text(user_id, labels::CONFIRM_REFERENCE),
        ]
    }

    #[tokio::test]
    async fn test_lookup_without_credits_is_refused() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;

        let outcomes = run(&h, vec![text(5, labels::LOOKUP)]).await?;
        assert!(last_text(&outcomes).contains("Not enough credits"));
        assert!(h.dispatcher.sessions().snapshot(5).await.is_idle());
        assert_eq!(ledger::balance(h.dispatcher.db(), 5).await?, 0);
        assert_eq!(h.lookup.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_then_single_approval() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();

        let outcomes = run(&h, purchase(7, "10", "ABC123")).await?;
        assert!(last_text(&outcomes).contains("Payment details submitted"));
        assert!(h.dispatcher.sessions().snapshot(7).await.is_idle());

        let pending = payments::list_pending(db, 10).await?;
        assert_eq!(pending.len(), 1);
        let payment = &pending[0];
        assert_eq!(payment.user_id, 7);
        assert_eq!(payment.amount, 10.0);
        assert_eq!(payment.reference, "ABC123");
        assert_eq!(payment.screenshot_ref, "screenshot-1");

        let alerts = &outcomes.last().unwrap().notifications;
        assert_eq!(alerts.len(), 2);
        assert!(matches!(
            &alerts[0],
            Notification::Photo { to: TEST_ADMIN, image_ref, .. } if image_ref == "screenshot-1"
        ));

        let approval = h
            .dispatcher
            .process(command(TEST_ADMIN, "approve", &format!("{} 100", payment.id)))
            .await?;
        assert!(approval.replies[0].text.starts_with("✅ Approved"));
        assert_eq!(approval.notifications.len(), 1);
        assert_eq!(approval.notifications[0].recipient(), 7);
        assert_eq!(ledger::balance(db, 7).await?, 100);

        let again = h
            .dispatcher
            .process(command(TEST_ADMIN, "approve", &format!("{} 50", payment.id)))
            .await?;
        assert!(again.replies[0].text.contains("already processed"));
        assert!(again.notifications.is_empty());
        assert_eq!(ledger::balance(db, 7).await?, 100);
        let stored = payments::get_payment(db, &payment.id).await?.unwrap();
        assert_eq!(stored.status, PaymentStatus::Approved);
        assert_eq!(stored.approved_credits, Some(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_generated_code_redeems_once() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();

        let generated = h.dispatcher.process(command(TEST_ADMIN, "gen", "5 50")).await?;
        assert!(generated.replies[0].text.contains("Generated 5 codes"));
        let overview = codes::overview(db).await?;
        assert_eq!(overview.active.len(), 5);
        let token = overview.active[0].token.clone();

        let (first, second) = tokio::join!(
            h.dispatcher.process(command(9, "redeem", &token)),
            h.dispatcher.process(command(9, "redeem", &token.to_lowercase()))
        );
        let texts = [first?, second?].map(|o| o.replies[0].text.clone());
        assert_eq!(
            texts.iter().filter(|t| t.contains("redeemed successfully")).count(),
            1
        );
        assert_eq!(
            texts.iter().filter(|t| t.contains("already been redeemed")).count(),
            1
        );
        assert_eq!(ledger::balance(db, 9).await?, 50);
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_debits_only_on_success() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();
        ledger::credit(db, 4, 10).await?;

        let outcomes = run(&h, vec![text(4, labels::LOOKUP), text(4, "br29 ab7794")]).await?;
        assert!(last_text(&outcomes).contains("Vehicle Details for BR29AB7794"));
        let user = ledger::get_user(db, 4).await?.unwrap();
        assert_eq!(user.credits, 0);
        assert_eq!(user.lookups, 1);

        let outcomes = run(&h, vec![text(4, labels::LOOKUP)]).await?;
        assert!(last_text(&outcomes).contains("Not enough credits"));
        assert_eq!(h.lookup.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_balance() -> Result<()> {
        let h = TestHarness::new(StubLookup::failing("upstream down")).await?;
        let db = h.dispatcher.db();
        ledger::credit(db, 4, 25).await?;

        let outcomes = run(&h, vec![text(4, labels::LOOKUP), text(4, "KA01AB1234")]).await?;
        assert!(last_text(&outcomes).contains("upstream down"));
        let user = ledger::get_user(db, 4).await?.unwrap();
        assert_eq!(user.credits, 25);
        assert_eq!(user.lookups, 0);
        assert!(h.dispatcher.sessions().snapshot(4).await.is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out_without_debit() -> Result<()> {
        let mut config = test_config();
        config.lookup.timeout_secs = 1;
        let h = TestHarness::with_config(config, StubLookup::slow(Duration::from_secs(10))).await?;
        let db = h.dispatcher.db();
        ledger::credit(db, 4, 10).await?;

        let outcomes = run(&h, vec![text(4, labels::LOOKUP), text(4, "KA01AB1234")]).await?;
        assert!(last_text(&outcomes).contains("timed out"));
        assert_eq!(ledger::balance(db, 4).await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_queries_charge_once() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();
        ledger::credit(db, 4, 10).await?;
        run(&h, vec![text(4, labels::LOOKUP)]).await?;

        let (a, b) = tokio::join!(
            h.dispatcher.process(text(4, "KA01AB1234")),
            h.dispatcher.process(text(4, "KA01AB1234"))
        );
        a?;
        b?;
        assert_eq!(h.lookup.calls(), 1);
        assert_eq!(ledger::balance(db, 4).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_back_mid_purchase_leaves_no_record() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let mut events = purchase(3, "10", "ABC123");
        events.pop();
        events.push(text(3, labels::BACK));

        let outcomes = run(&h, events).await?;
        assert_eq!(
            outcomes.last().unwrap().replies[0].keyboard,
            Some(replies::Keyboard::Main { admin: false })
        );
        assert_eq!(h.dispatcher.sessions().snapshot(3).await, ConversationState::default());
        assert_eq!(payments::count_pending(h.dispatcher.db()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts_in_place() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;

        let outcomes = run(
            &h,
            vec![
                text(3, labels::PAYMENT_DONE),
                text(3, "ten rupees"),
                text(3, "10"),
                text(3, labels::CONFIRM_AMOUNT),
                text(3, "no photo here"),
            ],
        )
        .await?;
        assert!(outcomes[1].replies[0].text.contains("positive amount"));
        assert!(last_text(&outcomes).contains("as a photo"));
        assert_eq!(h.dispatcher.sessions().snapshot(3).await.step, Step::ScreenshotWait);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_admin_commands_have_no_effect() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();

        for (name, args) in [("add", "5 100"), ("approve", "garbage"), ("gen", "5 10"), ("block", "5")] {
            let outcome = h.dispatcher.process(command(5, name, args)).await?;
            assert_eq!(outcome.replies[0].text, "⛔ Unauthorized.", "{name}");
            assert!(outcome.notifications.is_empty());
        }
        let outcome = h.dispatcher.process(text(5, labels::STATS)).await?;
        assert_eq!(outcome.replies[0].text, "⛔ Unauthorized.");

        let user = ledger::get_user(db, 5).await?.unwrap();
        assert_eq!(user.credits, 0);
        assert!(!user.blocked);
        assert_eq!(codes::counts(db).await?, (0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_usage_errors() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let outcome = h.dispatcher.process(command(TEST_ADMIN, "approve", "P1")).await?;
        assert_eq!(
            outcome.replies[0].text,
            "Usage: /approve <payment_id> <credits>"
        );
        let outcome = h.dispatcher.process(command(TEST_ADMIN, "approve", "P1 10")).await?;
        assert!(outcome.replies[0].text.contains("Payment ID not found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_credit_keeps_user_usable() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        let db = h.dispatcher.db();

        run(&h, vec![command(TEST_ADMIN, "add", "5 10")]).await?;
        let outcome = h
            .dispatcher
            .process(command(TEST_ADMIN, "add", &format!("5 {}", i64::MAX)))
            .await?;
        assert_eq!(outcome.replies[0].text, "Usage: /add <user_id> <credits>");

        // Within the argument cap but past the ledger ceiling
        ledger::credit(db, 5, ledger::MAX_BALANCE - 20).await?;
        let outcome = h.dispatcher.process(command(TEST_ADMIN, "add", "5 100")).await?;
        assert!(outcome.replies[0].text.contains("Balance limit reached"));
        assert_eq!(
            ledger::balance(db, 5).await?,
            ledger::MAX_BALANCE - 10
        );

        let outcomes = run(&h, vec![text(5, labels::BALANCE)]).await?;
        assert!(last_text(&outcomes).contains(&(ledger::MAX_BALANCE - 10).to_string()));
        h.dispatcher.process(command(TEST_ADMIN, "stats", "")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_blocked_user_is_turned_away() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        h.dispatcher.process(command(TEST_ADMIN, "block", "6")).await?;

        for event in [text(6, labels::BALANCE), command(6, "redeem", "AAA-AAA-AAA")] {
            let outcome = h.dispatcher.process(event).await?;
            assert_eq!(outcome.replies, vec![replies::blocked()]);
        }

        h.dispatcher.process(command(TEST_ADMIN, "unblock", "6")).await?;
        let outcome = h.dispatcher.process(text(6, labels::BALANCE)).await?;
        assert!(outcome.replies[0].text.contains("Credits: 0"));
        Ok(())
    }

    #[tokio::test]
    async fn test_menu_entries() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        ledger::credit(h.dispatcher.db(), 2, 30).await?;

        let profile = h.dispatcher.process(text(2, labels::PROFILE)).await?;
        assert!(profile.replies[0].text.contains("Credits: 30"));
        let buy = h.dispatcher.process(text(2, labels::BUY_CREDITS)).await?;
        assert_eq!(buy.replies[0].keyboard, Some(replies::Keyboard::BuyMain));
        let unknown = h.dispatcher.process(text(2, "hello?")).await?;
        assert!(unknown.replies[0].text.contains("Invalid input"));

        let panel = h.dispatcher.process(text(TEST_ADMIN, labels::ADMIN_PANEL)).await?;
        assert_eq!(panel.replies[0].keyboard, Some(replies::Keyboard::Admin));
        let stats = h.dispatcher.process(text(TEST_ADMIN, labels::STATS)).await?;
        assert!(stats.replies[0].text.contains("Total Credits: 30"));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_clears_conversation() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        run(&h, vec![text(8, labels::PAYMENT_DONE), text(8, "10")]).await?;
        assert_eq!(h.dispatcher.sessions().snapshot(8).await.step, Step::AmountConfirm);

        let outcome = h.dispatcher.process(command(8, "start", "")).await?;
        assert!(outcome.replies[0].text.contains("Welcome"));
        assert!(h.dispatcher.sessions().snapshot(8).await.is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn test_handle_delivers_broadcast_in_background() -> Result<()> {
        let h = TestHarness::new(StubLookup::found()).await?;
        for id in [2, 3] {
            ledger::ensure_user(h.dispatcher.db(), id).await?;
        }
        h.notifier.fail_for(2);

        let replies = h
            .dispatcher
            .handle(command(TEST_ADMIN, "broadcast", "maintenance tonight"))
            .await?;
        // The admin is registered too
        assert!(replies[0].text.contains("3 users"));

        for _ in 0..100 {
            if h.notifier.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let recipients: Vec<_> = h.notifier.sent().iter().map(Notification::recipient).collect();
        assert_eq!(recipients, vec![TEST_ADMIN, 3]);
        Ok(())
    }
}
