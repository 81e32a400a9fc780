//! Record shapes for load generation: trade orders with a configurable hot
//! customer, user-behavior events and dashboard candles.

pub mod sample;
mod dashboard;
mod trade;
mod user_behavior;

pub use dashboard::{DashboardFactory, DashboardRecord};
pub use trade::{HOT_CID, TradeFactory, TradeRecord};
pub use user_behavior::{UserBehaviorFactory, UserBehaviorRecord};
