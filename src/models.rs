//! Cart models.

/// Product identifier, stable across anonymous and authenticated carts.
pub type ProductId = u64;

/// Server-assigned durable identifier of an authenticated cart line item.
pub type ServerItemId = u64;

/// Display snapshot attached to a line item by enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub name: String,
    /// Unit price in minor units.
    pub price: u64,
    pub image: String,
    pub stock: u32,
}

/// Reference to a cart line item.
///
/// An authenticated cart addresses items by a server-assigned durable id; an
/// anonymous cart has no durable ids and addresses items by position in the
/// local list. Keeping the two as a tagged variant makes the routing in the
/// core exhaustive instead of inferred from session state at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    /// Durable id assigned by the remote cart service.
    Server(ServerItemId),
    /// Position in the anonymous local cart.
    Local(usize),
}

/// A single cart line.
///
/// `product` is `None` until enrichment has run, and stays `None` when the
/// lookup has no snapshot for the product (deleted product, transient miss).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineItem {
    pub item: ItemRef,
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: u32,
    pub product: Option<ProductSnapshot>,
}

/// Derived `{total_items, total_price}` pair shown in compact UI surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartSummary {
    pub total_items: u32,
    pub total_price: u64,
}

/// The in-memory cart: an ordered item list, unique by product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartLineItem>,
}

impl Cart {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Compute the summary locally.
    ///
    /// Items without a hydrated product contribute zero to the price total;
    /// an un-enriched cart still has a correct item count.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        let total_items = self.items.iter().map(|item| item.quantity).sum();

        let total_price = self
            .items
            .iter()
            .filter_map(|item| {
                item.product
                    .as_ref()
                    .map(|product| product.price * u64::from(item.quantity))
            })
            .sum();

        CartSummary {
            total_items,
            total_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, price: u64) -> ProductSnapshot {
        ProductSnapshot {
            name: name.to_string(),
            price,
            image: format!("{name}.png"),
            stock: 10,
        }
    }

    #[test]
    fn summary_sums_quantities_and_prices() {
        let cart = Cart {
            items: vec![
                CartLineItem {
                    item: ItemRef::Local(0),
                    product_id: 5,
                    quantity: 2,
                    product: Some(snapshot("Widget", 10_00)),
                },
                CartLineItem {
                    item: ItemRef::Local(1),
                    product_id: 9,
                    quantity: 1,
                    product: Some(snapshot("Gadget", 3_50)),
                },
            ],
        };

        let summary = cart.summary();

        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.total_price, 23_50);
    }

    #[test]
    fn unhydrated_item_counts_but_contributes_zero_price() {
        let cart = Cart {
            items: vec![
                CartLineItem {
                    item: ItemRef::Local(0),
                    product_id: 7,
                    quantity: 4,
                    product: None,
                },
                CartLineItem {
                    item: ItemRef::Local(1),
                    product_id: 5,
                    quantity: 1,
                    product: Some(snapshot("Widget", 10_00)),
                },
            ],
        };

        let summary = cart.summary();

        assert_eq!(summary.total_items, 5);
        assert_eq!(summary.total_price, 10_00);
    }

    #[test]
    fn summary_is_stable_for_unchanged_cart() {
        let cart = Cart {
            items: vec![CartLineItem {
                item: ItemRef::Local(0),
                product_id: 5,
                quantity: 2,
                product: Some(snapshot("Widget", 10_00)),
            }],
        };

        assert_eq!(cart.summary(), cart.summary());
    }

    #[test]
    fn empty_cart_summary_is_zero() {
        assert_eq!(Cart::empty().summary(), CartSummary::default());
    }
}
