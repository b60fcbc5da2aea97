//! Text renderings of an order for the CLI and the model.

use std::fmt::Write as _;

use primer_session::StateMap;

use super::menu::{display_list, display_name, find_pizza};
use super::order::{KEY_STATUS, OrderState, OrderStatus};

/// Renders the "current order" block printed by the CLI.
pub fn format_order_state_for_display(values: &StateMap) -> String {
    if values.is_empty() {
        return "Your order is empty.".to_owned();
    }
    let order = OrderState::from_values(values);

    let mut output = String::from("\n🛒 **CURRENT ORDER:**\n");
    let _ = writeln!(output, "Pizza: {}", or_not_selected(&order.pizza_type));
    let _ = writeln!(output, "Size: {}", or_not_selected(&order.size));
    if !order.toppings.is_empty() {
        let toppings = display_list(order.toppings.iter().map(String::as_str));
        let _ = writeln!(output, "Extra Toppings: {toppings}");
    }
    let _ = writeln!(output, "Quantity: {}", order.quantity);
    if let Some(address) = non_empty(&order.address) {
        let _ = writeln!(output, "Delivery Address: {address}");
    }
    if let Some(phone) = non_empty(&order.phone_number) {
        let _ = writeln!(output, "Phone: {phone}");
    }
    if order.total_price > 0.0 {
        let _ = writeln!(output, "\n**Total: ${:.2}**", order.total_price);
    }
    output
}

/// Renders the summary returned by the `view_current_order` tool.
pub fn order_summary(order: &OrderState) -> String {
    let mut summary = String::from("🍕 **CURRENT ORDER SUMMARY** 🍕\n\n");

    match non_empty(&order.pizza_type) {
        Some(pizza_type) => {
            let _ = writeln!(summary, "Pizza: {}", display_name(pizza_type));
            if let Some(pizza) = find_pizza(pizza_type) {
                let _ = writeln!(summary, "Description: {}", pizza.description);
            }
        }
        None => summary.push_str("Pizza: Not selected\n"),
    }
    let _ = writeln!(summary, "Size: {}", or_not_selected(&order.size));
    if order.toppings.is_empty() {
        summary.push_str("Extra Toppings: None\n");
    } else {
        let toppings = display_list(order.toppings.iter().map(String::as_str));
        let _ = writeln!(summary, "Extra Toppings: {toppings}");
    }
    let _ = writeln!(summary, "Quantity: {}", order.quantity);
    let _ = writeln!(
        summary,
        "Delivery Address: {}",
        non_empty(&order.address).unwrap_or("Not provided")
    );
    let _ = writeln!(
        summary,
        "Phone Number: {}",
        non_empty(&order.phone_number).unwrap_or("Not provided")
    );
    if order.total_price > 0.0 {
        let _ = writeln!(
            summary,
            "\n**Total Price: ${:.2}**",
            order.total_price
        );
    }
    let _ = writeln!(summary, "\nOrder Status: {}", order.status);
    summary
}

/// Returns a friendly line for the order status.
pub fn order_status_message(values: &StateMap) -> &'static str {
    const FALLBACK: &str = "Let me help you with your pizza order!";

    let Some(status) = values.get(KEY_STATUS) else {
        return if values.is_empty() {
            status_message(OrderStatus::Start)
        } else {
            FALLBACK
        };
    };
    match serde_json::from_value::<OrderStatus>(status.clone()) {
        Ok(status) => status_message(status),
        Err(_) => FALLBACK,
    }
}

fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Start => {
            "👋 Welcome! Ready to order some delicious pizza?"
        }
        OrderStatus::PizzaSelected => {
            "🍕 Great choice! Now let's pick a size."
        }
        OrderStatus::SizeSelected => {
            "📏 Perfect! Want to add any extra toppings?"
        }
        OrderStatus::ToppingsAdded => {
            "🧀 Awesome toppings! Ready for delivery details?"
        }
        OrderStatus::DeliveryInfoSet => {
            "📍 All set! Let me calculate your total."
        }
        OrderStatus::OrderComplete => {
            "✅ Order ready! Confirm to place your order."
        }
    }
}

/// Returns `true` if the pizza, size, address and phone are all known.
#[inline]
pub fn is_order_complete(values: &StateMap) -> bool {
    OrderState::from_values(values).is_complete()
}

/// Renders five markers: pizza, size, toppings, address and phone.
/// Toppings are optional and show `➖` when there are none.
pub fn order_progress(values: &StateMap) -> String {
    let order = OrderState::from_values(values);
    let mark = |done: bool| if done { "✅" } else { "⭕" };
    [
        mark(non_empty(&order.pizza_type).is_some()),
        mark(non_empty(&order.size).is_some()),
        if order.toppings.is_empty() { "➖" } else { "✅" },
        mark(non_empty(&order.address).is_some()),
        mark(non_empty(&order.phone_number).is_some()),
    ]
    .join(" ")
}

#[inline]
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn or_not_selected(key: &Option<String>) -> String {
    match non_empty(key) {
        Some(key) => display_name(key),
        None => "Not selected".to_owned(),
    }
}
