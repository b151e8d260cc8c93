//! User registration and per-user order views.

use std::collections::HashMap;

use common::{Order, Role, User, UserId};
use serde::{Deserialize, Serialize};
use store::{OrderQuery, Store, StoreError, USERS_EMAIL_KEY};

use crate::{DeliveryStatusInfo, DomainError};

/// The already-authenticated identity on whose behalf a call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if the caller is `user_id` or an admin.
    pub fn may_act_for(&self, user_id: UserId) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

/// A user with their orders, newest first.
#[derive(Debug, Clone)]
pub struct UserOrders {
    pub user: User,
    pub orders: Vec<Order>,
}

/// A user with the delivery status of each of their orders, newest first.
#[derive(Debug, Clone)]
pub struct UserDeliveries {
    pub user: User,
    pub deliveries: Vec<DeliveryStatusInfo>,
}

/// Registers users and serves their order history.
pub struct UserDirectory<S: Store> {
    store: S,
    admin_secret: Option<String>,
}

impl<S: Store> UserDirectory<S> {
    /// Creates a directory with admin registration disabled.
    pub fn new(store: S) -> Self {
        Self {
            store,
            admin_secret: None,
        }
    }

    /// Enables admin registration for callers presenting `secret`.
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into());
        self
    }

    /// Registers a user with role `USER`.
    #[tracing::instrument(skip(self, credential_secret))]
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        credential_secret: &str,
    ) -> Result<User, DomainError> {
        self.register(User::new(name, email, credential_secret, Role::User))
            .await
    }

    /// Registers a user with role `ADMIN`.
    ///
    /// Fails with `InvalidAdminSecret` unless `admin_secret` matches the
    /// configured secret; with no secret configured every attempt fails.
    #[tracing::instrument(skip(self, credential_secret, admin_secret))]
    pub async fn register_admin(
        &self,
        name: &str,
        email: &str,
        credential_secret: &str,
        admin_secret: &str,
    ) -> Result<User, DomainError> {
        match self.admin_secret.as_deref() {
            Some(expected) if expected == admin_secret => {}
            _ => return Err(DomainError::InvalidAdminSecret),
        }
        self.register(User::new(name, email, credential_secret, Role::Admin))
            .await
    }

    async fn register(&self, user: User) -> Result<User, DomainError> {
        match self.store.insert_user(&user).await {
            Ok(()) => {
                metrics::counter!("users_registered_total", "role" => user.role.as_str())
                    .increment(1);
                Ok(user)
            }
            Err(StoreError::UniqueViolation {
                constraint: USERS_EMAIL_KEY,
            }) => Err(DomainError::DuplicateEmail(user.email)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<User, DomainError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))
    }

    /// Returns a user's orders. The caller must be that user or an admin.
    #[tracing::instrument(skip(self))]
    pub async fn user_orders(
        &self,
        caller: Caller,
        user_id: UserId,
    ) -> Result<UserOrders, DomainError> {
        if !caller.may_act_for(user_id) {
            return Err(DomainError::Forbidden(
                "only the owner or an admin may view these orders",
            ));
        }

        let user = self.get_user(user_id).await?;
        let orders = self.store.query_orders(OrderQuery::for_user(user_id)).await?;
        Ok(UserOrders { user, orders })
    }

    /// Returns every user's delivery statuses. Admins only.
    #[tracing::instrument(skip(self))]
    pub async fn all_deliveries(&self, caller: Caller) -> Result<Vec<UserDeliveries>, DomainError> {
        if !caller.is_admin() {
            return Err(DomainError::Forbidden("admin role required"));
        }

        let users = self.store.list_users().await?;
        let mut by_user: HashMap<UserId, Vec<DeliveryStatusInfo>> = HashMap::new();
        for order in self.store.query_orders(OrderQuery::new()).await? {
            by_user
                .entry(order.user_id)
                .or_default()
                .push(DeliveryStatusInfo::from(&order));
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let deliveries = by_user.remove(&user.id).unwrap_or_default();
                UserDeliveries { user, deliveries }
            })
            .collect())
    }
}
