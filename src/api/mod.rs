//! Request side of the client: signing, throttling, composition and dispatch

pub mod client;
pub mod locale;
pub mod operation;
pub mod params;
pub mod retry;
pub mod signer;
pub mod throttle;
pub mod types;

pub use client::{ApiClient, RawResponse};
pub use operation::{CompositionError, Operation};
pub use params::{ParamValue, RequestParameters};
pub use retry::{Dispatch, Retry, RetryPolicy};
pub use signer::{RequestSigner, SignedUrl};
pub use throttle::Throttle;
pub use types::{Cart, CartEntry, CartItem, Price};
