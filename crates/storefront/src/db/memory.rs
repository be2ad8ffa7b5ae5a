//! In-memory store.
//!
//! Every operation runs under one async mutex, which gives it the same
//! all-or-nothing behaviour as a database transaction. Used by the service
//! tests; it is not meant for production traffic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use cartwright_core::cart::MergeReport;
use cartwright_core::pricing::ProductSnapshot;
use cartwright_core::{
    CartOwner, Email, GuestToken, OrderId, OrderItemId, OrderStatus, ProductId, UserId,
};

use super::plan::{self, CartChange};
use super::{
    CartStore, CatalogStore, CheckoutSessionStore, OrderStore, RepositoryError, Store, UserStore,
};
use crate::models::{
    CartClear, CartLine, CheckoutSessionRecord, NewOrder, NewProduct, NewUser, Order, OrderItem, PlacedOrder,
    Product, ProductUpdate, StatusUpdate, User,
};

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<CartOwner, BTreeMap<ProductId, u32>>,
    orders: BTreeMap<OrderId, Order>,
    users: BTreeMap<UserId, (User, String)>,
    checkout_sessions: HashMap<String, CheckoutSessionRecord>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn snapshot(&self, id: ProductId) -> Option<ProductSnapshot> {
        self.products.get(&id).map(Product::snapshot)
    }

    fn snapshots(&self) -> HashMap<ProductId, ProductSnapshot> {
        self.products
            .iter()
            .map(|(id, p)| (*id, p.snapshot()))
            .collect()
    }

    fn cart_quantity(&self, owner: &CartOwner, product_id: ProductId) -> u32 {
        self.carts
            .get(owner)
            .and_then(|lines| lines.get(&product_id))
            .copied()
            .unwrap_or(0)
    }

    fn change_cart(
        &mut self,
        owner: &CartOwner,
        product_id: ProductId,
        change: CartChange,
    ) -> Result<u32, RepositoryError> {
        let current = self.cart_quantity(owner, product_id);
        let product = self.snapshot(product_id);
        let quantity = plan::admit_cart_change(product_id, product.as_ref(), current, change)?;
        self.carts
            .entry(owner.clone())
            .or_default()
            .insert(product_id, quantity);
        Ok(quantity)
    }

    fn order_by_reference(&self, reference: &str) -> Option<&Order> {
        self.orders
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
    }

    fn set_stock(&mut self, product_id: ProductId, stock: u32) {
        if let Some(product) = self.products.get_mut(&product_id) {
            product.stock = stock;
            product.updated_at = Utc::now();
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let created = Product {
            id: ProductId::new(state.next_id()),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            active: product.active,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        let Some(lines) = state.carts.get(owner) else {
            return Ok(Vec::new());
        };
        Ok(lines
            .iter()
            .filter_map(|(product_id, &quantity)| {
                let product = state.products.get(product_id)?;
                Some(CartLine {
                    product_id: *product_id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity,
                    stock: product.stock,
                    active: product.active,
                })
            })
            .collect())
    }

    async fn add_to_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        self.state
            .lock()
            .await
            .change_cart(owner, product_id, CartChange::Add(quantity))
    }

    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        self.state
            .lock()
            .await
            .change_cart(owner, product_id, CartChange::Set(quantity))
    }

    async fn remove_from_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .carts
            .get_mut(owner)
            .is_some_and(|lines| lines.remove(&product_id).is_some()))
    }

    async fn clear_cart(&self, owner: &CartOwner) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .carts
            .remove(owner)
            .map_or(0, |lines| lines.len() as u64))
    }

    async fn merge_guest_cart(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeReport, RepositoryError> {
        let mut state = self.state.lock().await;
        let guest_owner = CartOwner::Guest(guest.clone());
        let Some(guest_lines) = state.carts.remove(&guest_owner) else {
            return Ok(MergeReport::default());
        };
        let guest_lines: Vec<_> = guest_lines.into_iter().collect();

        let user_owner = CartOwner::User(user);
        let user_lines: HashMap<_, _> = state
            .carts
            .get(&user_owner)
            .map(|lines| lines.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();

        let merge = plan::plan_merge(&guest_lines, &user_lines, &state.snapshots());
        let cart = state.carts.entry(user_owner).or_default();
        cart.extend(merge.upserts);
        Ok(merge.report)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, new: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut state = self.state.lock().await;

        if let Some(reference) = &new.payment_reference
            && let Some(existing) = state.order_by_reference(reference)
        {
            return Ok(PlacedOrder {
                order: existing.clone(),
                created: false,
                backorders: Vec::new(),
            });
        }

        let plan = plan::plan_order(&new.lines, &state.snapshots(), new.stock_policy)?;

        // Nothing has been written yet; from here on every step succeeds.
        for &(product_id, stock) in &plan.stock_levels {
            state.set_stock(product_id, stock);
        }

        let now = Utc::now();
        let order_id = OrderId::new(state.next_id());
        let mut items = Vec::with_capacity(plan.priced.lines.len());
        for line in &plan.priced.lines {
            items.push(OrderItem {
                id: OrderItemId::new(state.next_id()),
                product_id: line.product_id,
                product_name: line.name.clone(),
                quantity: line.quantity,
                price: line.unit_price,
            });
        }
        let order = Order {
            id: order_id,
            owner_id: new.owner_id,
            status: OrderStatus::Pending,
            total: plan.priced.total,
            shipping: new.shipping,
            payment_reference: new.payment_reference,
            items,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order_id, order.clone());

        match &new.clear_cart {
            Some(CartClear::All(owner)) => {
                state.carts.remove(owner);
            }
            Some(CartClear::Products(owner, products)) => {
                if let Some(lines) = state.carts.get_mut(owner) {
                    lines.retain(|id, _| !products.contains(id));
                }
            }
            None => {}
        }
        if let Some(session_id) = &new.checkout_session
            && let Some(session) = state.checkout_sessions.get_mut(session_id)
        {
            session.completed_order_id = Some(order_id);
        }

        Ok(PlacedOrder {
            order,
            created: true,
            backorders: plan.backorders,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.owner_id == Some(user))
            .cloned()
            .collect())
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: Option<OrderStatus>,
        status: OrderStatus,
    ) -> Result<StatusUpdate, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.get(&id) else {
            return Ok(StatusUpdate::NotFound);
        };
        let current = order.status;
        if expected.is_some_and(|e| e != current) {
            return Ok(StatusUpdate::Conflict(current));
        }

        if let Some(movement) = plan::stock_move(current, status) {
            let items: Vec<_> = order
                .items
                .iter()
                .map(|i| (i.product_id, i.quantity))
                .collect();
            for (product_id, quantity) in items {
                if let Some(stock) = state.products.get(&product_id).map(|p| p.stock) {
                    state.set_stock(product_id, plan::moved_stock(stock, quantity, movement));
                }
            }
        }

        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(StatusUpdate::NotFound);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(StatusUpdate::Updated(order.clone()))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.orders.remove(&id).is_some())
    }

    async fn claim_guest_orders(&self, user: UserId, email: &Email) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let mut claimed = 0;
        for order in state.orders.values_mut() {
            if order.owner_id.is_none() && order.shipping.email == *email {
                order.owner_id = Some(user);
                order.updated_at = Utc::now();
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let created = User {
            id: UserId::new(state.next_id()),
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(created.id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .get(&id)
            .map(|(user, _)| user.clone()))
    }

    async fn get_user_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(u, _)| u.email == *email)
            .cloned())
    }
}

#[async_trait]
impl CheckoutSessionStore for MemoryStore {
    async fn save_checkout_session(
        &self,
        record: &CheckoutSessionRecord,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .await
            .checkout_sessions
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_checkout_session(
        &self,
        id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, RepositoryError> {
        Ok(self.state.lock().await.checkout_sessions.get(id).cloned())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
