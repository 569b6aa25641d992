//! Domain models returned by the repositories and serialized by the routes.
//!
//! JSON field names are camelCase to match what the storefront frontend
//! expects.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use cart::{Cart, CartItem, MAX_LINE_QUANTITY};
pub use order::{Order, OrderItem, ShippingDetails};
pub use product::{Product, ProductDetail, ProductFilter, ProductSort, ProductSummary};
pub use review::{Review, ReviewAuthor, ReviewWithAuthor};
pub use user::User;
