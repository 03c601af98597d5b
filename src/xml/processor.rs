//! Response processing boundary
//!
//! A [`ResponseProcessor`] turns raw response bytes into a [`Document`] and
//! reports embedded wire errors. The client holds it as a trait object and
//! never inspects the concrete type.

use crate::api::types::{Cart, CartItem, Price};
use crate::errors::{classify, ApiError};
use crate::xml::document::{Document, Element};
use thiserror::Error;

/// Failures at the processing boundary
#[derive(Error, Debug)]
pub enum ProcessError {
    /// An `<Error>` element in an otherwise well-formed response
    #[error("{code}: {message}")]
    Protocol { code: String, message: String },

    #[error("Malformed response: {0}")]
    Malformed(#[from] ApiError),

    #[error("{0} is not supported by this processor")]
    Unsupported(&'static str),
}

impl ProcessError {
    /// Convert into a caller-facing error; wire errors are always classified
    pub fn into_api_error(self, locale: &str) -> ApiError {
        match self {
            ProcessError::Protocol { code, message } => {
                ApiError::Service(classify(&code, &message, locale))
            }
            ProcessError::Malformed(err) => err,
            ProcessError::Unsupported(what) => {
                ApiError::InvalidResponse(format!("{} is not supported", what))
            }
        }
    }
}

/// Parses response bodies and extracts structured results
pub trait ResponseProcessor: Send + Sync {
    /// Parse a body; fails with [`ProcessError::Protocol`] when it carries an error
    fn parse(&self, body: &[u8]) -> Result<Document, ProcessError>;

    /// Extract a cart from a cart-shaped response
    fn parse_cart(&self, _document: &Document) -> Result<Cart, ProcessError> {
        Err(ProcessError::Unsupported("cart parsing"))
    }
}

/// Default processor backed by [`Document`]
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlProcessor;

impl XmlProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Locate an error element: the root itself, a direct child, or
    /// `Request/Errors/Error` anywhere below the root
    fn find_error(document: &Document) -> Option<&Element> {
        let root = document.root();
        if root.name() == "Error" {
            return Some(root);
        }
        root.child("Error")
            .or_else(|| document.find("//Request/Errors/Error"))
    }

    fn price(element: Option<&Element>) -> Option<Price> {
        let element = element?;
        let amount = element.child_text("Amount")?.trim().parse().ok()?;
        Some(Price {
            amount,
            currency_code: element.child_text("CurrencyCode").unwrap_or_default(),
            formatted: element.child_text("FormattedPrice"),
        })
    }

    fn cart_item(element: &Element) -> Result<CartItem, ProcessError> {
        let quantity = element
            .child_text("Quantity")
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| {
                ApiError::InvalidResponse("CartItem without a valid Quantity".to_string())
            })?;

        Ok(CartItem {
            cart_item_id: element.child_text("CartItemId").unwrap_or_default(),
            asin: element.child_text("ASIN"),
            quantity,
            title: element.child_text("Title"),
            seller: element.child_text("SellerNickname"),
            product_group: element.child_text("ProductGroup"),
            price: Self::price(element.child("Price")),
            total: Self::price(element.child("ItemTotal")),
        })
    }
}

impl ResponseProcessor for XmlProcessor {
    fn parse(&self, body: &[u8]) -> Result<Document, ProcessError> {
        let document = Document::parse(body)?;

        if let Some(error) = Self::find_error(&document) {
            return Err(ProcessError::Protocol {
                code: error.child_text("Code").unwrap_or_default(),
                message: error.child_text("Message").unwrap_or_default(),
            });
        }

        Ok(document)
    }

    fn parse_cart(&self, document: &Document) -> Result<Cart, ProcessError> {
        let cart = document
            .find("//Cart")
            .ok_or_else(|| ApiError::InvalidResponse("Response contains no Cart".to_string()))?;

        let items = cart
            .select("CartItems/CartItem")
            .into_iter()
            .map(Self::cart_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Cart {
            cart_id: cart.child_text("CartId").unwrap_or_default(),
            hmac: cart.child_text("HMAC").unwrap_or_default(),
            purchase_url: cart.child_text("PurchaseURL"),
            subtotal: Self::price(cart.select("CartItems/SubTotal").into_iter().next())
                .or_else(|| Self::price(cart.child("SubTotal"))),
            items,
        })
    }
}
