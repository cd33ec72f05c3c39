//! [`PgOrderRepository`]: orders in Postgres through a `deadpool-postgres`
//! pool. Every call checks a connection out of the pool, so a dropped
//! connection is replaced on the next call instead of failing the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orders::{
    ActorId, AffiliateId, ApprovalAction, ApprovalStatus, ChannelKind, InfoRequest, LinkMeDetails,
    Money, Order, OrderFilter, OrderId, OrderLine, OrderReference, OrderRepository,
    OrganisationId, ProductId, Quantity, Rate, RepositoryError, SelectionId, StatusChange,
    Timestamp, TokenHash,
};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::StoreError;

const ORDER_COLUMNS: &str = "id, reference, organisation_id, created_by_affiliate_id, \
     linkme_selection_id, status, shipping_cost_ht, vat_rate, details, info_request, \
     rejection_reason, created_at, updated_at";

const LINE_COLUMNS: &str = "order_id, product_id, product_name, quantity, unit_price, \
     base_price, margin_rate, commission_rate";

/// Postgres-backed [`OrderRepository`].
///
/// Connections are verified before reuse; one that died with the server is
/// discarded and replaced.
#[derive(Clone, Debug)]
pub struct PgOrderRepository {
    pool: Pool,
}

impl PgOrderRepository {
    /// Wraps an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool of at most `max_connections` connections to `url` and
    /// checks that the server is reachable.
    pub async fn connect(url: &str, max_connections: usize) -> Result<Self, StoreError> {
        let config: tokio_postgres::Config = url.parse()?;
        let manager = Manager::from_config(
            config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Verified,
            },
        );
        let pool = Pool::builder(manager).max_size(max_connections).build()?;
        drop(pool.get().await?);
        info!(max_connections, "postgres pool ready");
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> Result<Vec<&'static str>, StoreError> {
        let mut client = self.pool.get().await?;
        crate::migrate(&mut client).await
    }

    async fn client(&self) -> Result<Object, RepositoryError> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn load_lines(
        client: &Client,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, OrderLine)>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM linkme_order_lines WHERE order_id = ANY($1) ORDER BY order_id, position"
        );
        let ids = ids.to_vec();
        let rows = client.query(&sql, &[&ids]).await.map_err(backend)?;
        rows.iter()
            .map(|row| -> Result<(Uuid, OrderLine), RepositoryError> {
                Ok((get(row, "order_id")?, line_from_row(row)?))
            })
            .collect()
    }

    async fn hydrate(client: &Client, rows: Vec<Row>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| get::<Uuid>(r, "id"))
            .collect::<Result<_, _>>()?;
        let mut lines = Self::load_lines(client, &ids).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(ids) {
            let own: Vec<OrderLine> = lines
                .iter()
                .filter(|(order_id, _)| *order_id == id)
                .map(|(_, l)| l.clone())
                .collect();
            lines.retain(|(order_id, _)| *order_id != id);
            orders.push(order_from_row(row, own)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    #[instrument(skip_all, fields(order_id = %order.id))]
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(backend)?;

        let token_hash = order.info_request.as_ref().map(|r| r.token_hash.as_str());
        let result = tx
            .execute(
                "INSERT INTO linkme_orders (id, reference, organisation_id, created_by_affiliate_id, \
                 linkme_selection_id, status, shipping_cost_ht, vat_rate, details, info_request, \
                 info_token_hash, rejection_reason, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                &[
                    &order.id.as_uuid(),
                    &order.reference.as_str(),
                    &order.organisation_id.map(OrganisationId::as_uuid),
                    &order.created_by_affiliate_id.map(AffiliateId::as_uuid),
                    &order.linkme_selection_id.map(SelectionId::as_uuid),
                    &order.status.as_str(),
                    &order.shipping_cost_ht.as_decimal(),
                    &order.vat_rate.as_fraction(),
                    &Json(&order.details),
                    &order.info_request.as_ref().map(Json),
                    &token_hash,
                    &order.rejection_reason,
                    &order.created_at.as_datetime(),
                    &order.updated_at.as_datetime(),
                ],
            )
            .await;
        if let Err(err) = result {
            if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                return Err(RepositoryError::Duplicate(order.reference.to_string()));
            }
            return Err(backend(err));
        }

        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::Corrupt("too many order lines".into()))?;
            let quantity = i32::try_from(line.quantity.as_u32()).map_err(|_| {
                RepositoryError::Corrupt(format!("quantity {} does not fit a line", line.quantity.as_u32()))
            })?;
            tx.execute(
                "INSERT INTO linkme_order_lines (order_id, position, product_id, product_name, \
                 quantity, unit_price, base_price, margin_rate, commission_rate) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &order.id.as_uuid(),
                    &position,
                    &line.product_id.map(ProductId::as_uuid),
                    &line.product_name,
                    &quantity,
                    &line.unit_price.as_decimal(),
                    &line.base_price.as_decimal(),
                    &line.margin_rate.as_fraction(),
                    &line.commission_rate.as_fraction(),
                ],
            )
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        debug!(lines = order.lines.len(), "order inserted");
        Ok(())
    }

    #[instrument(skip_all, fields(order_id = %id))]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let client = self.client().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM linkme_orders WHERE id = $1");
        let rows = client
            .query(&sql, &[&id.as_uuid()])
            .await
            .map_err(backend)?;
        Ok(Self::hydrate(&client, rows).await?.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let client = self.client().await?;

        let status = filter.status.map(|s| s.as_str().to_string());
        let limit = i64::from(filter.effective_limit());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM linkme_orders WHERE TRUE");

        if let Some(status) = &status {
            params.push(status);
            sql.push_str(&format!(" AND status = ${}", params.len()));
        }
        if let Some(kind) = filter.channel {
            sql.push_str(channel_clause(kind));
        }
        params.push(&limit);
        sql.push_str(&format!(
            " ORDER BY created_at DESC, id LIMIT ${}",
            params.len()
        ));

        let rows = client.query(&sql, &params).await.map_err(backend)?;
        Self::hydrate(&client, rows).await
    }

    #[instrument(skip_all)]
    async fn find_by_info_token(&self, hash: &TokenHash) -> Result<Option<Order>, RepositoryError> {
        let client = self.client().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM linkme_orders WHERE info_token_hash = $1");
        let rows = client
            .query(&sql, &[&hash.as_str()])
            .await
            .map_err(backend)?;
        Ok(Self::hydrate(&client, rows).await?.into_iter().next())
    }

    #[instrument(skip_all, fields(order_id = %change.order_id, from = %change.from, to = %change.to))]
    async fn record_transition(
        &self,
        change: &StatusChange,
        updated: &Order,
    ) -> Result<(), RepositoryError> {
        let client = self.client().await?;
        let token_hash = updated
            .info_request
            .as_ref()
            .map(|r| r.token_hash.as_str());

        // Update and history insert in one statement: both or neither.
        let inserted = client
            .execute(
                "WITH updated AS ( \
                     UPDATE linkme_orders \
                        SET status = $3, details = $4, info_request = $5, info_token_hash = $6, \
                            rejection_reason = $7, updated_at = $8 \
                      WHERE id = $1 AND status = $2 \
                  RETURNING id \
                 ) \
                 INSERT INTO linkme_order_status_history \
                     (order_id, from_status, to_status, action, actor, note, at) \
                 SELECT id, $2, $3, $9, $10, $11, $8 FROM updated",
                &[
                    &change.order_id.as_uuid(),
                    &change.from.as_str(),
                    &change.to.as_str(),
                    &Json(&updated.details),
                    &updated.info_request.as_ref().map(Json),
                    &token_hash,
                    &updated.rejection_reason,
                    &change.at.as_datetime(),
                    &change.action.as_str(),
                    &change.actor.as_ref().map(ActorId::as_str),
                    &change.note,
                ],
            )
            .await
            .map_err(backend)?;

        if inserted == 1 {
            return Ok(());
        }

        let exists = client
            .query_opt(
                "SELECT 1 FROM linkme_orders WHERE id = $1",
                &[&change.order_id.as_uuid()],
            )
            .await
            .map_err(backend)?;
        match exists {
            None => Err(RepositoryError::NotFound(change.order_id)),
            Some(_) => Err(RepositoryError::Conflict {
                order_id: change.order_id,
                expected: change.from,
            }),
        }
    }

    #[instrument(skip_all, fields(order_id = %id))]
    async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT order_id, from_status, to_status, action, actor, note, at \
                   FROM linkme_order_status_history WHERE order_id = $1 ORDER BY id",
                &[&id.as_uuid()],
            )
            .await
            .map_err(backend)?;
        rows.iter().map(change_from_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn backend(err: tokio_postgres::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

fn pool_error(err: PoolError) -> RepositoryError {
    RepositoryError::Backend(format!("no postgres connection: {err}"))
}

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(
    row: &'a Row,
    column: &str,
) -> Result<T, RepositoryError> {
    row.try_get(column)
        .map_err(|e| RepositoryError::Corrupt(format!("column {column}: {e}")))
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Corrupt(format!("invalid {what}: {value}"))
}

fn money(row: &Row, column: &str) -> Result<Money, RepositoryError> {
    let value: Decimal = get(row, column)?;
    Money::new(value).ok_or_else(|| corrupt(column, value))
}

fn rate(row: &Row, column: &str) -> Result<Rate, RepositoryError> {
    let value: Decimal = get(row, column)?;
    Rate::new(value).ok_or_else(|| corrupt(column, value))
}

fn status(row: &Row, column: &str) -> Result<ApprovalStatus, RepositoryError> {
    let value: String = get(row, column)?;
    value.parse().map_err(|_| corrupt(column, value))
}

fn line_from_row(row: &Row) -> Result<OrderLine, RepositoryError> {
    let quantity: i32 = get(row, "quantity")?;
    Ok(OrderLine {
        product_id: get::<Option<Uuid>>(row, "product_id")?.map(ProductId::from_uuid),
        product_name: get(row, "product_name")?,
        quantity: u32::try_from(quantity)
            .ok()
            .and_then(Quantity::new)
            .ok_or_else(|| corrupt("quantity", quantity))?,
        unit_price: money(row, "unit_price")?,
        base_price: money(row, "base_price")?,
        margin_rate: rate(row, "margin_rate")?,
        commission_rate: rate(row, "commission_rate")?,
    })
}

fn order_from_row(row: &Row, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
    let reference: String = get(row, "reference")?;
    let details: Json<LinkMeDetails> = get(row, "details")?;
    let info_request: Option<Json<InfoRequest>> = get(row, "info_request")?;
    let created_at: DateTime<Utc> = get(row, "created_at")?;
    let updated_at: DateTime<Utc> = get(row, "updated_at")?;

    Ok(Order {
        id: OrderId::from_uuid(get(row, "id")?),
        reference: OrderReference::new(reference.clone()).ok_or_else(|| corrupt("reference", reference))?,
        organisation_id: get::<Option<Uuid>>(row, "organisation_id")?.map(OrganisationId::from_uuid),
        created_by_affiliate_id: get::<Option<Uuid>>(row, "created_by_affiliate_id")?
            .map(AffiliateId::from_uuid),
        linkme_selection_id: get::<Option<Uuid>>(row, "linkme_selection_id")?
            .map(SelectionId::from_uuid),
        status: status(row, "status")?,
        lines,
        shipping_cost_ht: money(row, "shipping_cost_ht")?,
        vat_rate: rate(row, "vat_rate")?,
        details: details.0,
        info_request: info_request.map(|j| j.0),
        rejection_reason: get(row, "rejection_reason")?,
        created_at: Timestamp::from_utc(created_at),
        updated_at: Timestamp::from_utc(updated_at),
    })
}

fn change_from_row(row: &Row) -> Result<StatusChange, RepositoryError> {
    let action: String = get(row, "action")?;
    let at: DateTime<Utc> = get(row, "at")?;
    Ok(StatusChange {
        order_id: OrderId::from_uuid(get(row, "order_id")?),
        from: status(row, "from_status")?,
        to: status(row, "to_status")?,
        action: parse_action(&action).ok_or_else(|| corrupt("action", &action))?,
        actor: get::<Option<String>>(row, "actor")?.and_then(ActorId::new),
        note: get(row, "note")?,
        at: Timestamp::from_utc(at),
    })
}

fn parse_action(value: &str) -> Option<ApprovalAction> {
    [
        ApprovalAction::Approve,
        ApprovalAction::Reject,
        ApprovalAction::RequestInfo,
        ApprovalAction::SubmitInfo,
    ]
    .into_iter()
    .find(|a| a.as_str() == value)
}

fn channel_clause(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Affiliate => {
            " AND created_by_affiliate_id IS NOT NULL AND linkme_selection_id IS NULL"
        }
        ChannelKind::PublicSelection => {
            " AND linkme_selection_id IS NOT NULL AND created_by_affiliate_id IS NULL"
        }
        ChannelKind::Manual => " AND created_by_affiliate_id IS NULL AND linkme_selection_id IS NULL",
    }
}
