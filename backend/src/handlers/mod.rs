//! HTTP request handlers

pub mod alerts;
pub mod events;
pub mod extract;
pub mod health;
pub mod products;
pub mod sales;
pub mod stock;

pub use alerts::*;
pub use events::*;
pub use health::*;
pub use products::*;
pub use sales::*;
pub use stock::*;
