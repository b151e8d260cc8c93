use common::{DeliveryStatus, UserId};

/// Builder for filtering orders.
///
/// Results are always ordered newest first by placement time.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Filter by delivery status (any of these).
    pub statuses: Option<Vec<DeliveryStatus>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the orders of a single user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Filters by owning user.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Filters by a single delivery status.
    pub fn status(mut self, status: DeliveryStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    /// Filters by several delivery statuses.
    pub fn statuses(mut self, statuses: Vec<DeliveryStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matching orders.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the order passes every filter.
    pub fn matches(&self, order: &common::Order) -> bool {
        if let Some(user_id) = self.user_id
            && order.user_id != user_id
        {
            return false;
        }
        if let Some(ref statuses) = self.statuses
            && !statuses.contains(&order.status)
        {
            return false;
        }
        true
    }
}
