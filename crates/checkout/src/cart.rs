//! Session-backed cart operations for the request layer.

use std::collections::HashMap;

use common::SessionId;
use domain::{Cart, CartLineView, Money, ProductId};
use store::{Catalog, SessionStore};

use crate::error::CartServiceError;

/// Session key under which the cart blob is stored.
pub const CART_SESSION_KEY: &str = "cart";

/// What a cart mutation reports back: the badge count and the new total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub line_count: u32,
    pub total: Money,
}

impl From<&Cart> for CartSummary {
    fn from(cart: &Cart) -> Self {
        Self {
            line_count: cart.line_count(),
            total: cart.total_price(),
        }
    }
}

/// Cart contents ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub summary: CartSummary,
}

/// Loads, mutates and persists the cart of a session.
#[derive(Clone)]
pub struct CartService<S, C> {
    catalog: S,
    sessions: C,
}

impl<S, C> CartService<S, C>
where
    S: Catalog,
    C: SessionStore,
{
    pub fn new(catalog: S, sessions: C) -> Self {
        Self { catalog, sessions }
    }

    /// Rebuilds the session's cart. Malformed entries are dropped.
    pub async fn load(&self, session: &SessionId) -> store::Result<Cart> {
        let blob = self.sessions.load(session, CART_SESSION_KEY).await?;
        Ok(Cart::from_session(blob.as_ref()))
    }

    /// Writes the cart back if it changed.
    pub async fn save(&self, session: &SessionId, cart: &mut Cart) -> store::Result<()> {
        if cart.is_modified() {
            self.sessions
                .save(session, CART_SESSION_KEY, cart.to_session())
                .await?;
            cart.mark_saved();
        }
        Ok(())
    }

    /// Adds `quantity` units of a product.
    ///
    /// Rejects unknown or inactive products, and quantities that are zero or
    /// above the product's current stock. The stored quantity is still
    /// clamped by the cart itself.
    #[tracing::instrument(skip(self), fields(session = %session))]
    pub async fn add(
        &self,
        session: &SessionId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSummary, CartServiceError> {
        self.put(session, product_id, quantity, false).await
    }

    /// Replaces the quantity of a product.
    #[tracing::instrument(skip(self), fields(session = %session))]
    pub async fn update(
        &self,
        session: &SessionId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSummary, CartServiceError> {
        self.put(session, product_id, quantity, true).await
    }

    async fn put(
        &self,
        session: &SessionId,
        product_id: &ProductId,
        quantity: u32,
        override_quantity: bool,
    ) -> Result<CartSummary, CartServiceError> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CartServiceError::ProductNotFound(product_id.clone()))?;

        if quantity == 0 || quantity > product.stock {
            return Err(CartServiceError::InvalidQuantity {
                product_id: product_id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        let mut cart = self.load(session).await?;
        cart.add(&product, quantity, override_quantity);
        self.save(session, &mut cart).await?;
        Ok(CartSummary::from(&cart))
    }

    /// Removes a product. Removing an absent product is a no-op.
    #[tracing::instrument(skip(self), fields(session = %session))]
    pub async fn remove(
        &self,
        session: &SessionId,
        product_id: &ProductId,
    ) -> Result<CartSummary, CartServiceError> {
        let mut cart = self.load(session).await?;
        cart.remove(product_id);
        self.save(session, &mut cart).await?;
        Ok(CartSummary::from(&cart))
    }

    /// Empties the cart.
    pub async fn clear(&self, session: &SessionId) -> store::Result<()> {
        self.sessions.remove(session, CART_SESSION_KEY).await
    }

    /// Refreshes stock snapshots from the catalog and returns the valid lines.
    ///
    /// Lines whose product disappeared are dropped and quantities above the
    /// live stock are lowered.
    pub async fn view(&self, session: &SessionId) -> Result<CartView, CartServiceError> {
        let mut cart = self.load(session).await?;
        let products = self.catalog.products(&cart.product_ids()).await?;
        let live_stock: HashMap<ProductId, u32> =
            products.into_iter().map(|p| (p.id, p.stock)).collect();
        cart.refresh_stock(&live_stock);
        self.save(session, &mut cart).await?;

        Ok(CartView {
            lines: cart.lines().collect(),
            summary: CartSummary::from(&cart),
        })
    }

    /// Quantity of a product in the session's cart, zero if absent.
    pub async fn quantity_of(
        &self,
        session: &SessionId,
        product_id: &ProductId,
    ) -> Result<u32, CartServiceError> {
        Ok(self.load(session).await?.quantity_of(product_id))
    }
}
