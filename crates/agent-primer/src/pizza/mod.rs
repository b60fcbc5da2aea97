//! A pizza ordering assistant whose order lives in session state.

mod agent;
mod display;
pub mod menu;
mod order;
pub mod tools;

pub use agent::{default_order_state, pizza_order_agent};
pub use display::{
    format_order_state_for_display, is_order_complete, order_progress,
    order_status_message, order_summary,
};
pub use order::{OrderState, OrderStatus, PriceBreakdown};
