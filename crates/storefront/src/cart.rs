//! Cart aggregation.
//!
//! A [`Cart`] is an explicitly owned value: screens hold one and mutate it
//! through `&mut self`. Adding a product that is already present bumps its
//! quantity instead of adding a second row, and quantities never fall below
//! one. Nothing here touches the network; checkout consumes the cart through
//! [`Cart::to_order_payload`].

use serde::{Deserialize, Serialize};

use pocket_store_core::{Price, ProductId};

/// The product fields the cart needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    /// Missing prices count as zero.
    pub price: Option<Price>,
    pub image_url: String,
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Price,
    /// Always at least 1.
    pub quantity: u32,
    pub image_url: String,
}

impl LineItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A line item as handed to checkout: the product ID is not carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
}

impl OrderLine {
    /// Single-unit payload for a "buy now" purchase that skips the cart.
    #[must_use]
    pub fn single(product: &ProductRef) -> Self {
        Self {
            product_name: product.name.clone(),
            unit_price: product.price.unwrap_or(Price::ZERO),
            quantity: 1,
            image_url: product.image_url.clone(),
        }
    }
}

impl From<&LineItem> for OrderLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_name: item.product_name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            image_url: item.image_url.clone(),
        }
    }
}

/// In-session cart keyed by product ID, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `product`, merging with an existing line.
    pub fn add(&mut self, product: &ProductRef) {
        if let Some(item) = self.find_mut(&product.id) {
            item.quantity = item.quantity.saturating_add(1);
            tracing::debug!(product_id = %product.id, quantity = item.quantity, "Merged into cart line");
            return;
        }

        self.items.push(LineItem {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            unit_price: product.price.unwrap_or(Price::ZERO),
            quantity: 1,
            image_url: product.image_url.clone(),
        });
        tracing::debug!(product_id = %product.id, "Added cart line");
    }

    /// Change a line's quantity by `delta`, clamping at 1.
    ///
    /// Unknown product IDs are ignored. There is no removal; a line stays in
    /// the cart until the cart is dropped.
    pub fn adjust_quantity(&mut self, product_id: &ProductId, delta: i64) {
        if let Some(item) = self.find_mut(product_id) {
            let adjusted = i64::from(item.quantity).saturating_add(delta);
            item.quantity = u32::try_from(adjusted.max(1)).unwrap_or(u32::MAX);
        }
    }

    /// Shorthand for `adjust_quantity(id, 1)`.
    pub fn increment(&mut self, product_id: &ProductId) {
        self.adjust_quantity(product_id, 1);
    }

    /// Shorthand for `adjust_quantity(id, -1)`; a no-op at quantity 1.
    pub fn decrement(&mut self, product_id: &ProductId) {
        self.adjust_quantity(product_id, -1);
    }

    /// Sum of unit price times quantity over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Lines in insertion order, without product IDs.
    #[must_use]
    pub fn to_order_payload(&self) -> Vec<OrderLine> {
        self.items.iter().map(OrderLine::from).collect()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.items
    }

    /// Look up a line by product ID.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |n, i| n.saturating_add(i.quantity))
    }

    fn find_mut(&mut self, product_id: &ProductId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| &i.product_id == product_id)
    }
}

// =============================================================================
// Display
// =============================================================================

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image_url: String,
    /// The decrement control is disabled at quantity 1.
    pub can_decrement: bool,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: Price::ZERO.display(),
            item_count: 0,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().iter().map(CartItemView::from).collect(),
            total: cart.total().display(),
            item_count: cart.item_count(),
        }
    }
}

impl From<&LineItem> for CartItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.product_id.to_string(),
            title: item.product_name.clone(),
            quantity: item.quantity,
            price: item.unit_price.display(),
            line_price: item.line_total().display(),
            image_url: item.image_url.clone(),
            can_decrement: item.quantity > 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: &str, cents: Option<i64>) -> ProductRef {
        ProductRef {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: cents.map(Price::from_cents),
            image_url: format!("https://img.test/{id}.jpg"),
        }
    }

    #[test]
    fn test_repeated_add_merges() {
        let mut cart = Cart::new();
        let p = product("p1", Some(1000));
        for _ in 0..5 {
            cart.add(&p);
        }

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.line(&p.id).unwrap().quantity, 5);
    }

    #[test]
    fn test_decrement_floors_at_one() {
        let mut cart = Cart::new();
        let p = product("p1", Some(1000));
        cart.add(&p);
        cart.add(&p);

        for _ in 0..10 {
            cart.decrement(&p.id);
        }
        assert_eq!(cart.line(&p.id).unwrap().quantity, 1);

        cart.adjust_quantity(&p.id, i64::MIN);
        assert_eq!(cart.line(&p.id).unwrap().quantity, 1);
    }

    #[test]
    fn test_adjust_unknown_product_is_noop() {
        let mut cart = Cart::new();
        cart.add(&product("p1", Some(100)));
        let before = cart.clone();

        cart.adjust_quantity(&ProductId::new("missing"), 3);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        assert_eq!(cart.total(), Price::ZERO);

        let a = product("a", Some(1000));
        cart.add(&a);
        cart.increment(&a.id);
        cart.add(&product("b", Some(550)));

        assert_eq!(cart.total(), Price::from_cents(2550));
        assert_eq!(cart.total().display(), "$25.50");
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_oversized_price_saturates_total() {
        let mut cart = Cart::new();
        let huge = ProductRef {
            price: Some(Price::parse_lenient("70000000000000000000000000000")),
            ..product("huge", None)
        };
        cart.add(&huge);
        cart.increment(&huge.id);
        cart.add(&product("mug", Some(1000)));

        assert_eq!(cart.lines()[0].line_total(), Price::MAX);
        assert_eq!(cart.total(), Price::MAX);
        assert_eq!(CartView::from(&cart).total, Price::MAX.display());
    }

    #[test]
    fn test_missing_price_defaults_to_zero() {
        let mut cart = Cart::new();
        cart.add(&product("free", None));
        assert_eq!(cart.lines()[0].unit_price, Price::ZERO);
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_payload_keeps_insertion_order() {
        let mut cart = Cart::new();
        cart.add(&product("b", Some(200)));
        cart.add(&product("a", Some(100)));
        cart.add(&product("b", Some(200)));

        let payload = cart.to_order_payload();
        let names: Vec<_> = payload.iter().map(|l| l.product_name.as_str()).collect();
        assert_eq!(names, vec!["Product b", "Product a"]);
        assert_eq!(payload[0].quantity, 2);
    }

    #[test]
    fn test_buy_now_line() {
        let line = OrderLine::single(&product("x", Some(999)));
        assert_eq!(line.quantity, 1);
        assert_eq!(line.unit_price, Price::from_cents(999));
    }

    #[test]
    fn test_cart_view() {
        let mut cart = Cart::new();
        let p = product("p1", Some(1000));
        cart.add(&p);
        let view = CartView::from(&cart);
        assert!(!view.items[0].can_decrement);

        cart.increment(&p.id);
        let view = CartView::from(&cart);
        assert!(view.items[0].can_decrement);
        assert_eq!(view.items[0].price, "$10.00");
        assert_eq!(view.items[0].line_price, "$20.00");
        assert_eq!(view.total, "$20.00");
        assert_eq!(view.item_count, 2);

        assert_eq!(CartView::empty().total, "$0.00");
    }
}
