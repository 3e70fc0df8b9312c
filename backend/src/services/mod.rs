//! Business logic services for the Inventory Manager

pub mod alerts;
pub mod ledger;
pub mod notification;
pub mod product;
pub mod sale;

pub use alerts::AlertService;
pub use ledger::LedgerService;
pub use notification::{BroadcastSink, EventName, NotificationSink, Notifier};
pub use product::ProductService;
pub use sale::SaleService;
