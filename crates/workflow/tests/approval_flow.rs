//! End-to-end approval scenarios against the in-memory repository.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orders::{
    ActorId, AffiliateId, ApprovalAction, ApprovalStatus, Clock, EmailAddress, InfoField,
    InfoSubmission, LinkMeDetails, Money, Notification, NotificationKind, Notifier, NotifyError,
    OrderError, OrderFilter, OrderReference, Quantity, Rate, SelectionId, Timestamp,
};
use rust_decimal::Decimal;
use store::MemoryOrderRepository;
use workflow::{
    ApprovalService, NewOrder, NewOrderLine, QuoteLine, QuoteRequest, WorkflowError,
    WorkflowSettings,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    fn last(&self) -> Notification {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "unavailable".into(),
                retry_after: None,
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct FixedClock(Mutex<Timestamp>);

impl FixedClock {
    fn new() -> Self {
        Self(Mutex::new(Timestamp::now()))
    }

    fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now = now.plus(by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.0.lock().unwrap()
    }
}

struct Harness {
    service: ApprovalService,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<FixedClock>,
}

fn harness_with(notifier: RecordingNotifier) -> Harness {
    let notifier = Arc::new(notifier);
    let clock = Arc::new(FixedClock::new());
    let settings = WorkflowSettings {
        public_base_url: "https://verone.example/".into(),
        staff_email: EmailAddress::parse("ops@verone.example"),
        default_commission_rate: rate("0.05"),
        ..WorkflowSettings::default()
    };
    let service = ApprovalService::new(
        Arc::new(MemoryOrderRepository::new()),
        notifier.clone(),
        clock.clone(),
        settings,
    );
    Harness {
        service,
        notifier,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::default())
}

fn money(s: &str) -> Money {
    Money::new(s.parse::<Decimal>().unwrap()).unwrap()
}

fn rate(s: &str) -> Rate {
    Rate::new(s.parse::<Decimal>().unwrap()).unwrap()
}

fn ops() -> ActorId {
    ActorId::new("ops@verone").unwrap()
}

fn new_order(reference: &str) -> NewOrder {
    NewOrder {
        reference: OrderReference::new(reference).unwrap(),
        organisation_id: None,
        created_by_affiliate_id: Some(AffiliateId::new_random()),
        linkme_selection_id: None,
        lines: vec![NewOrderLine {
            product_id: None,
            product_name: "Fauteuil Milo".into(),
            quantity: Quantity::new(3).unwrap(),
            base_price: money("100"),
            margin_rate: rate("0.15"),
            commission_rate: None,
            unit_price: None,
        }],
        shipping_cost_ht: Some(money("25")),
        vat_rate: None,
        details: LinkMeDetails {
            requester_name: Some("Camille Martin".into()),
            requester_email: EmailAddress::parse("camille@example.com"),
            ..Default::default()
        },
    }
}

fn token_of(link: &str) -> &str {
    link.rsplit('/').next().unwrap()
}

// ---------------------------------------------------------------------------
// Creation and viewing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_order_is_priced_and_pending() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();

    assert_eq!(order.status, ApprovalStatus::PendingAdminValidation);
    assert_eq!(order.lines[0].unit_price, money("123.53"));
    assert_eq!(order.lines[0].commission_rate, rate("0.05"));
    assert_eq!(order.vat_rate, rate("0.20"));

    let view = h.service.get_order(order.id).await.unwrap();
    let totals = view.totals.unwrap();
    assert_eq!(totals.products_ht, money("370.59"));
    assert_eq!(totals.total_ht, money("395.59"));
    assert_eq!(view.channel_label.as_deref(), Some("Affiliate order"));
    assert!(view.price_drifts.is_empty());
    assert!(view.anomalies.is_empty());
    assert_eq!(
        view.allowed_actions,
        vec![
            ApprovalAction::Approve,
            ApprovalAction::Reject,
            ApprovalAction::RequestInfo
        ]
    );
}

#[tokio::test]
async fn order_without_lines_is_refused() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.lines.clear();
    let err = h.service.create_order(new).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::EmptyOrder)));
}

#[tokio::test]
async fn both_channel_keys_are_refused() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.linkme_selection_id = Some(SelectionId::new_random());
    let err = h.service.create_order(new).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::ChannelConflict)));
}

#[tokio::test]
async fn oversized_quantity_is_refused_before_storage() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.lines[0].quantity = Quantity::new(u32::MAX).unwrap();
    new.lines[0].base_price = money("1");
    let err = h.service.create_order(new).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Rule(OrderError::QuantityTooLarge { quantity: u32::MAX, .. })
    ));
    assert!(h.service.list_orders(&OrderFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn overflowing_amounts_are_refused_before_storage() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.lines[0].base_price = money("79228162514264337593543950335");
    let err = h.service.create_order(new).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::AmountOutOfRange)));

    // Each line fits, the order total does not.
    let mut new = new_order("LM-2");
    new.lines[0].quantity = Quantity::new(2_000_000_000).unwrap();
    new.lines[0].base_price = money("35000000000000000000");
    new.lines[0].margin_rate = Rate::ZERO;
    new.lines[0].commission_rate = Some(Rate::ZERO);
    let err = h.service.create_order(new).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::AmountOutOfRange)));
    assert!(h.service.list_orders(&OrderFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn stored_price_drift_is_reported() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.lines[0].unit_price = Some(money("120"));
    let order = h.service.create_order(new).await.unwrap();

    let view = h.service.get_order(order.id).await.unwrap();
    assert_eq!(view.price_drifts.len(), 1);
    assert_eq!(view.price_drifts[0].expected, money("123.53"));
}

#[tokio::test]
async fn list_filters_by_status() {
    let h = harness();
    let a = h.service.create_order(new_order("LM-1")).await.unwrap();
    h.service.create_order(new_order("LM-2")).await.unwrap();
    h.service.approve(a.id, ops()).await.unwrap();

    let approved = h
        .service
        .list_orders(&OrderFilter {
            status: Some(ApprovalStatus::Approved),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, a.id);
}

// ---------------------------------------------------------------------------
// Staff decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approve_records_history_and_notifies_requester() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();

    let approved = h.service.approve(order.id, ops()).await.unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);

    let history = h.service.history(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, ApprovalStatus::PendingAdminValidation);
    assert_eq!(history[0].to, ApprovalStatus::Approved);
    assert_eq!(history[0].actor, Some(ops()));

    assert_eq!(h.notifier.kinds(), vec![NotificationKind::OrderApproved]);
    assert_eq!(h.notifier.last().to.as_str(), "camille@example.com");
}

#[tokio::test]
async fn terminal_orders_cannot_be_decided_again() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();
    h.service.approve(order.id, ops()).await.unwrap();

    let err = h.service.reject(order.id, ops(), "trop tard").await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Rule(OrderError::InvalidTransition {
            from: ApprovalStatus::Approved,
            action: ApprovalAction::Reject,
        })
    ));
    let err = h.service.approve(order.id, ops()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::InvalidTransition { .. })));
}

#[tokio::test]
async fn reject_requires_a_reason() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();

    let err = h.service.reject(order.id, ops(), "   ").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::MissingRejectionReason)));

    let rejected = h
        .service
        .reject(order.id, ops(), " Stock épuisé ")
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Stock épuisé"));
    assert!(h.notifier.last().text.contains("Stock épuisé"));
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let h = harness();
    let id = orders::OrderId::new_random();
    let err = h.service.approve(id, ops()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(found) if found == id));
}

#[tokio::test]
async fn notification_failure_does_not_undo_the_transition() {
    let h = harness_with(RecordingNotifier::failing());
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();

    let approved = h.service.approve(order.id, ops()).await.unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);
    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored.order.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn missing_requester_email_skips_notification() {
    let h = harness();
    let mut new = new_order("LM-1");
    new.details.requester_email = None;
    let order = h.service.create_order(new).await.unwrap();

    let issued = h
        .service
        .request_info(order.id, ops(), vec![InfoField::RequesterEmail], None)
        .await
        .unwrap();
    assert!(!issued.notified);
    assert!(h.notifier.kinds().is_empty());
}

// ---------------------------------------------------------------------------
// Info requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn info_request_round_trip_returns_order_to_queue() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();

    let issued = h
        .service
        .request_info(
            order.id,
            ops(),
            vec![InfoField::DeliveryCity, InfoField::DesiredDeliveryDate],
            Some("Merci de préciser la livraison".into()),
        )
        .await
        .unwrap();
    assert!(issued.notified);
    assert!(issued.link.starts_with("https://verone.example/linkme/complete/"));
    assert!(h.notifier.last().text.contains(&issued.link));

    let view = h.service.get_order(order.id).await.unwrap();
    assert_eq!(view.order.status, ApprovalStatus::InfoRequested);
    assert_eq!(view.allowed_actions, vec![ApprovalAction::Reject]);

    let token = token_of(&issued.link);
    let form = h.service.public_info_request(token).await.unwrap();
    assert_eq!(form.order_reference.as_str(), "LM-1");
    assert_eq!(form.fields.len(), 2);
    assert_eq!(form.message.as_deref(), Some("Merci de préciser la livraison"));

    let submission: InfoSubmission = [
        (InfoField::DeliveryCity, "Lyon".to_string()),
        (InfoField::DesiredDeliveryDate, "2026-11-02".to_string()),
    ]
    .into_iter()
    .collect();
    let updated = h.service.submit_info(token, &submission).await.unwrap();
    assert_eq!(updated.status, ApprovalStatus::PendingAdminValidation);
    assert_eq!(updated.details.delivery_city.as_deref(), Some("Lyon"));
    assert!(updated.info_request.is_none());
    assert_eq!(h.notifier.last().kind, NotificationKind::InfoSubmitted);
    assert_eq!(h.notifier.last().to.as_str(), "ops@verone.example");

    // The link is single use.
    let err = h.service.public_info_request(token).await.unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownInfoRequest));

    let actions: Vec<_> = h
        .service
        .history(order.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.action)
        .collect();
    assert_eq!(actions, vec![ApprovalAction::RequestInfo, ApprovalAction::SubmitInfo]);

    h.service.approve(order.id, ops()).await.unwrap();
}

#[tokio::test]
async fn incomplete_submission_keeps_request_open() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();
    let issued = h
        .service
        .request_info(
            order.id,
            ops(),
            vec![InfoField::DeliveryCity, InfoField::DeliveryPostalCode],
            None,
        )
        .await
        .unwrap();
    let token = token_of(&issued.link);

    let partial: InfoSubmission = [(InfoField::DeliveryCity, "Lyon".to_string())]
        .into_iter()
        .collect();
    let err = h.service.submit_info(token, &partial).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Rule(OrderError::IncompleteSubmission { ref fields })
            if fields == &vec![InfoField::DeliveryPostalCode]
    ));

    let view = h.service.get_order(order.id).await.unwrap();
    assert_eq!(view.order.status, ApprovalStatus::InfoRequested);
}

#[tokio::test]
async fn expired_link_is_refused() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();
    let issued = h
        .service
        .request_info(order.id, ops(), vec![InfoField::DeliveryCity], None)
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::days(31));

    let token = token_of(&issued.link);
    let err = h.service.public_info_request(token).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::InfoRequestExpired { .. })));

    let submission: InfoSubmission = [(InfoField::DeliveryCity, "Lyon".to_string())]
        .into_iter()
        .collect();
    let err = h.service.submit_info(token, &submission).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::InfoRequestExpired { .. })));
}

#[tokio::test]
async fn info_requested_order_can_be_rejected_but_not_approved() {
    let h = harness();
    let order = h.service.create_order(new_order("LM-1")).await.unwrap();
    let issued = h
        .service
        .request_info(order.id, ops(), vec![InfoField::DeliveryCity], None)
        .await
        .unwrap();

    let err = h.service.approve(order.id, ops()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::InvalidTransition { .. })));
    let err = h
        .service
        .request_info(order.id, ops(), vec![InfoField::RequesterPhone], None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::InvalidTransition { .. })));

    h.service.reject(order.id, ops(), "Sans réponse").await.unwrap();
    let err = h
        .service
        .public_info_request(token_of(&issued.link))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownInfoRequest));
}

#[tokio::test]
async fn malformed_token_is_unknown() {
    let h = harness();
    let err = h.service.public_info_request("not a token").await.unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownInfoRequest));
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

#[test]
fn quote_prices_without_persisting() {
    let h = harness();
    let quote = h
        .service
        .quote(&QuoteRequest {
            lines: vec![QuoteLine {
                quantity: Quantity::new(3).unwrap(),
                base_price: money("100"),
                margin_rate: rate("0.15"),
                commission_rate: None,
            }],
            shipping_cost_ht: Some(money("25")),
            vat_rate: None,
        })
        .unwrap();

    assert_eq!(quote.lines[0].unit_price, money("123.53"));
    assert_eq!(quote.lines[0].retrocession, money("45"));
    assert_eq!(quote.lines[0].platform_commission, money("17.64"));
    assert_eq!(quote.totals.total_ht, money("395.59"));
    assert_eq!(quote.totals.vat, money("79.12"));
    assert_eq!(quote.totals.total_ttc, money("474.71"));
}

#[test]
fn quote_with_full_margin_is_refused() {
    let h = harness();
    let err = h
        .service
        .quote(&QuoteRequest {
            lines: vec![QuoteLine {
                quantity: Quantity::new(1).unwrap(),
                base_price: money("10"),
                margin_rate: rate("1"),
                commission_rate: None,
            }],
            shipping_cost_ht: None,
            vat_rate: None,
        })
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::MarginRateTooHigh { .. })));
}

#[test]
fn quote_with_overflowing_amount_is_refused() {
    let h = harness();
    let err = h
        .service
        .quote(&QuoteRequest {
            lines: vec![QuoteLine {
                quantity: Quantity::new(u32::MAX).unwrap(),
                base_price: money("79228162514264337593543950335"),
                margin_rate: Rate::ZERO,
                commission_rate: None,
            }],
            shipping_cost_ht: None,
            vat_rate: None,
        })
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Rule(OrderError::AmountOutOfRange)));
}
