//! Normalized response structures

/// Amount in the smallest currency unit plus its currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: i64,
    pub currency_code: String,
    pub formatted: Option<String>,
}

impl Price {
    pub fn new(amount: i64, currency_code: String) -> Self {
        Self {
            amount,
            currency_code,
            formatted: None,
        }
    }
}

/// A line in a remote shopping cart
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartItem {
    pub cart_item_id: String,
    /// Kept as the exact wire string
    pub asin: Option<String>,
    pub quantity: u32,
    pub title: Option<String>,
    pub seller: Option<String>,
    pub product_group: Option<String>,
    pub price: Option<Price>,
    pub total: Option<Price>,
}

/// Remote shopping cart
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cart {
    pub cart_id: String,
    pub hmac: String,
    pub purchase_url: Option<String>,
    pub subtotal: Option<Price>,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all item quantities
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Look up an item by ASIN or cart item id
    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.cart_item_id == id || item.asin.as_deref() == Some(id))
    }
}

/// Reference to a product when adding to a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEntry {
    /// Product identified by ASIN
    Asin(String),
    /// Line already in the cart
    CartItemId(String),
}

impl CartEntry {
    pub(crate) fn key(&self) -> &'static str {
        match self {
            CartEntry::Asin(_) => "ASIN",
            CartEntry::CartItemId(_) => "CartItemId",
        }
    }

    pub(crate) fn id(&self) -> &str {
        match self {
            CartEntry::Asin(id) | CartEntry::CartItemId(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_lookup_and_quantity() {
        let cart = Cart {
            cart_id: "1".to_string(),
            hmac: "h".to_string(),
            items: vec![
                CartItem {
                    cart_item_id: "U1".to_string(),
                    asin: Some("0201896834".to_string()),
                    quantity: 2,
                    ..Default::default()
                },
                CartItem {
                    cart_item_id: "U2".to_string(),
                    asin: Some("0000000000".to_string()),
                    quantity: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.get("U2").map(|i| i.quantity), Some(1));
        assert_eq!(cart.get("0201896834").map(|i| i.cart_item_id.as_str()), Some("U1"));
        assert!(cart.get("missing").is_none());
        assert!(!cart.is_empty());
    }
}
