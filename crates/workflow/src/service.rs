//! The approval service.
//!
//! Each staff decision loads the order, asks the domain for the transition,
//! records it with a compare-and-set on the previous status, then notifies.
//! Notification happens after the write and its outcome never changes the
//! recorded status.

use std::sync::Arc;

use orders::pricing::{self, LinePricing, OrderTotals};
use orders::{
    ActorId, ApprovalAction, ApprovalStatus, Clock, EmailAddress, InfoField, InfoRequest,
    InfoRequestToken, InfoSubmission, Notification, Notifier, Order, OrderError, OrderFilter,
    OrderId, OrderLine, OrderRepository, Quantity, StatusChange,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    FieldPrompt, InfoRequestIssued, NewOrder, OrderView, PublicInfoRequest, Quote, QuoteRequest,
    WorkflowError, WorkflowSettings,
};

const STAFF_ACTIONS: [ApprovalAction; 3] = [
    ApprovalAction::Approve,
    ApprovalAction::Reject,
    ApprovalAction::RequestInfo,
];

/// Drives LinkMe orders through the approval workflow.
#[derive(Clone)]
pub struct ApprovalService {
    repository: Arc<dyn OrderRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
}

impl ApprovalService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            repository,
            notifier,
            clock,
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Creates an order waiting for validation.
    ///
    /// Lines without a unit price are priced with the pricing rule; lines
    /// without a commission rate use the configured default.
    #[instrument(skip_all, fields(reference = %new.reference))]
    pub async fn create_order(&self, new: NewOrder) -> Result<Order, WorkflowError> {
        if new.lines.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }
        let channel = orders::OrderChannel::derive(new.created_by_affiliate_id, new.linkme_selection_id)?;

        let mut lines = Vec::with_capacity(new.lines.len());
        for line in new.lines {
            if line.quantity.as_u32() > Quantity::MAX_PER_LINE {
                return Err(OrderError::QuantityTooLarge {
                    quantity: line.quantity.as_u32(),
                    max: Quantity::MAX_PER_LINE,
                }
                .into());
            }
            let commission_rate = line
                .commission_rate
                .unwrap_or(self.settings.default_commission_rate);
            let expected = pricing::selling_price(line.base_price, line.margin_rate, commission_rate)?;
            let unit_price = line.unit_price.unwrap_or(expected);
            if unit_price != expected {
                debug!(
                    product = %line.product_name,
                    %unit_price,
                    %expected,
                    "unit price differs from pricing rule"
                );
            }
            lines.push(OrderLine {
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price,
                base_price: line.base_price,
                margin_rate: line.margin_rate,
                commission_rate,
            });
        }

        let now = self.clock.now();
        let order = Order {
            id: OrderId::new_random(),
            reference: new.reference,
            organisation_id: new.organisation_id,
            created_by_affiliate_id: new.created_by_affiliate_id,
            linkme_selection_id: new.linkme_selection_id,
            status: ApprovalStatus::PendingAdminValidation,
            lines,
            shipping_cost_ht: new.shipping_cost_ht.unwrap_or(orders::Money::ZERO),
            vat_rate: new.vat_rate.unwrap_or(self.settings.default_vat_rate),
            details: new.details,
            info_request: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        order.totals()?;
        self.repository.insert(&order).await?;
        info!(order_id = %order.id, channel = %channel.kind(), "order created");
        Ok(order)
    }

    /// Loads an order with everything the admin screen shows.
    #[instrument(skip_all, fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderView, WorkflowError> {
        let order = self.load(id).await?;
        Ok(self.view(order))
    }

    /// Lists orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, WorkflowError> {
        Ok(self.repository.list(filter).await?)
    }

    /// The order's transitions, oldest first.
    #[instrument(skip_all, fields(order_id = %id))]
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, WorkflowError> {
        self.load(id).await?;
        Ok(self.repository.history(id).await?)
    }

    // -----------------------------------------------------------------------
    // Staff decisions
    // -----------------------------------------------------------------------

    /// Approves a pending order.
    ///
    /// Orders without lines or with conflicting channel keys cannot be
    /// approved.
    #[instrument(skip_all, fields(order_id = %id, actor = %actor))]
    pub async fn approve(&self, id: OrderId, actor: ActorId) -> Result<Order, WorkflowError> {
        let order = self.load(id).await?;
        if order.lines.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }
        order.channel()?;

        let now = self.clock.now();
        let change = StatusChange::new(id, order.status, ApprovalAction::Approve, Some(actor), None, now)?;
        let mut updated = order;
        updated.status = change.to;
        updated.info_request = None;
        updated.updated_at = now;
        self.repository.record_transition(&change, &updated).await?;
        info!(status = %updated.status, "order approved");

        if let Some(to) = self.requester_email(&updated) {
            self.deliver(Notification::order_approved(&updated, to)).await;
        }
        Ok(updated)
    }

    /// Rejects a pending or info-requested order.
    #[instrument(skip_all, fields(order_id = %id, actor = %actor))]
    pub async fn reject(
        &self,
        id: OrderId,
        actor: ActorId,
        reason: &str,
    ) -> Result<Order, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderError::MissingRejectionReason.into());
        }
        let order = self.load(id).await?;

        let now = self.clock.now();
        let change = StatusChange::new(
            id,
            order.status,
            ApprovalAction::Reject,
            Some(actor),
            Some(reason.to_string()),
            now,
        )?;
        let mut updated = order;
        updated.status = change.to;
        updated.rejection_reason = Some(reason.to_string());
        updated.info_request = None;
        updated.updated_at = now;
        self.repository.record_transition(&change, &updated).await?;
        info!(status = %updated.status, "order rejected");

        if let Some(to) = self.requester_email(&updated) {
            self.deliver(Notification::order_rejected(&updated, to, reason))
                .await;
        }
        Ok(updated)
    }

    /// Asks the requester to complete `fields` through a tokenized link.
    #[instrument(skip_all, fields(order_id = %id, actor = %actor))]
    pub async fn request_info(
        &self,
        id: OrderId,
        actor: ActorId,
        fields: Vec<InfoField>,
        message: Option<String>,
    ) -> Result<InfoRequestIssued, WorkflowError> {
        let order = self.load(id).await?;
        if !order.status.allows(ApprovalAction::RequestInfo) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                action: ApprovalAction::RequestInfo,
            }
            .into());
        }

        let now = self.clock.now();
        let (token, request) = InfoRequest::issue(
            fields,
            message,
            actor.clone(),
            now,
            self.settings.info_request_ttl,
        )?;
        let change = StatusChange::new(
            id,
            order.status,
            ApprovalAction::RequestInfo,
            Some(actor),
            request.message.clone(),
            now,
        )?;

        let link = self.settings.info_link(&token);
        let mut updated = order;
        updated.status = change.to;
        updated.info_request = Some(request.clone());
        updated.updated_at = now;
        self.repository.record_transition(&change, &updated).await?;
        info!(field_count = request.fields.len(), expires_at = %request.expires_at, "info requested");

        let notified = match self.requester_email(&updated) {
            Some(to) => {
                self.deliver(Notification::info_requested(&updated, to, &link, &request))
                    .await
            }
            None => false,
        };

        Ok(InfoRequestIssued {
            link,
            fields: request.fields.iter().copied().collect(),
            expires_at: request.expires_at,
            notified,
        })
    }

    // -----------------------------------------------------------------------
    // Public link
    // -----------------------------------------------------------------------

    /// What the requester must fill, for the public form.
    #[instrument(skip_all)]
    pub async fn public_info_request(&self, token: &str) -> Result<PublicInfoRequest, WorkflowError> {
        let (order, request) = self.open_request(token).await?;
        if request.is_expired(self.clock.now()) {
            return Err(OrderError::InfoRequestExpired {
                expired_at: request.expires_at,
            }
            .into());
        }
        Ok(PublicInfoRequest {
            order_reference: order.reference,
            fields: request
                .fields
                .iter()
                .map(|f| FieldPrompt {
                    field: *f,
                    label: f.label().to_string(),
                })
                .collect(),
            message: request.message,
            expires_at: request.expires_at,
        })
    }

    /// Applies the requester's answers and puts the order back in the
    /// validation queue.
    #[instrument(skip_all)]
    pub async fn submit_info(
        &self,
        token: &str,
        submission: &InfoSubmission,
    ) -> Result<Order, WorkflowError> {
        let (order, request) = self.open_request(token).await?;
        let now = self.clock.now();
        let details = request.apply(&order.details, submission, now)?;

        let change = StatusChange::new(order.id, order.status, ApprovalAction::SubmitInfo, None, None, now)?;
        let mut updated = order;
        updated.status = change.to;
        updated.details = details;
        updated.info_request = None;
        updated.updated_at = now;
        self.repository.record_transition(&change, &updated).await?;
        info!(order_id = %updated.id, "info submitted by requester");

        if let Some(to) = self.settings.staff_email.clone() {
            self.deliver(Notification::info_submitted(&updated, to)).await;
        }
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Pricing
    // -----------------------------------------------------------------------

    /// Prices lines without creating an order.
    pub fn quote(&self, request: &QuoteRequest) -> Result<Quote, WorkflowError> {
        let lines = request
            .lines
            .iter()
            .map(|l| {
                LinePricing::compute(
                    l.quantity,
                    l.base_price,
                    l.margin_rate,
                    l.commission_rate
                        .unwrap_or(self.settings.default_commission_rate),
                    None,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let totals = OrderTotals::aggregate(
            &lines,
            request.shipping_cost_ht.unwrap_or(orders::Money::ZERO),
            request.vat_rate.unwrap_or(self.settings.default_vat_rate),
        )?;
        Ok(Quote { lines, totals })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load(&self, id: OrderId) -> Result<Order, WorkflowError> {
        self.repository
            .get(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    async fn open_request(&self, token: &str) -> Result<(Order, InfoRequest), WorkflowError> {
        let token = InfoRequestToken::parse(token).ok_or(WorkflowError::UnknownInfoRequest)?;
        let order = self
            .repository
            .find_by_info_token(&token.hash())
            .await?
            .ok_or(WorkflowError::UnknownInfoRequest)?;
        if order.status != ApprovalStatus::InfoRequested {
            return Err(WorkflowError::UnknownInfoRequest);
        }
        let request = order
            .info_request
            .clone()
            .ok_or(WorkflowError::UnknownInfoRequest)?;
        Ok((order, request))
    }

    fn requester_email(&self, order: &Order) -> Option<EmailAddress> {
        let email = order.details.notification_email().cloned();
        if email.is_none() {
            warn!(order_id = %order.id, "no requester e-mail on order; notification skipped");
        }
        email
    }

    /// Sends a notification; failures are logged, never propagated.
    async fn deliver(&self, notification: Notification) -> bool {
        match self.notifier.send(&notification).await {
            Ok(()) => {
                debug!(kind = notification.kind.as_str(), to = %notification.to, "notification sent");
                true
            }
            Err(err) => {
                warn!(
                    kind = notification.kind.as_str(),
                    retry = ?err.retry_policy(),
                    error = %err,
                    "notification failed"
                );
                false
            }
        }
    }

    fn view(&self, order: Order) -> OrderView {
        let mut anomalies = Vec::new();

        let channel = match order.channel() {
            Ok(c) => Some(c),
            Err(err) => {
                anomalies.push(err.to_string());
                None
            }
        };
        let totals = match order.totals() {
            Ok(t) => Some(t),
            Err(err) => {
                anomalies.push(err.to_string());
                None
            }
        };
        let price_drifts = order.price_drifts().unwrap_or_default();
        if order.lines.is_empty() {
            anomalies.push(OrderError::EmptyOrder.to_string());
        }

        OrderView {
            channel,
            channel_label: channel.map(|c| c.kind().label().to_string()),
            totals,
            price_drifts,
            missing_fields: order.details.missing_fields(),
            allowed_actions: STAFF_ACTIONS
                .into_iter()
                .filter(|a| order.status.allows(*a))
                .collect(),
            anomalies,
            order,
        }
    }
}
