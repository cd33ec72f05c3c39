//! [`MemoryOrderRepository`]: orders in process memory, for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use orders::{
    Order, OrderFilter, OrderId, OrderRepository, RepositoryError, StatusChange, TokenHash,
};
use tokio::sync::RwLock;

/// Process-local [`OrderRepository`] for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryOrderRepository {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    history: HashMap<OrderId, Vec<StatusChange>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(RepositoryError::Duplicate(order.id.to_string()));
        }
        if state.orders.values().any(|o| o.reference == order.reference) {
            return Err(RepositoryError::Duplicate(order.reference.to_string()));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        let mut found: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        found.truncate(filter.effective_limit() as usize);
        Ok(found)
    }

    async fn find_by_info_token(&self, hash: &TokenHash) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.info_request.as_ref().is_some_and(|r| &r.token_hash == hash))
            .cloned())
    }

    async fn record_transition(
        &self,
        change: &StatusChange,
        updated: &Order,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&change.order_id)
            .ok_or(RepositoryError::NotFound(change.order_id))?;
        if stored.status != change.from {
            return Err(RepositoryError::Conflict {
                order_id: change.order_id,
                expected: change.from,
            });
        }

        stored.status = change.to;
        stored.details = updated.details.clone();
        stored.info_request = updated.info_request.clone();
        stored.rejection_reason = updated.rejection_reason.clone();
        stored.updated_at = updated.updated_at;

        state
            .history
            .entry(change.order_id)
            .or_default()
            .push(change.clone());
        Ok(())
    }

    async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}
