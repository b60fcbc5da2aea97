//! Tools the pizza agent uses to build an order in session state.
//!
//! Every tool answers with a JSON object carrying an `action` field.
//! Invalid requests are answered with `"status": "error"` and a message
//! for the model, they never fail the call.

use primer_core::tool::{
    NoArguments, Tool, ToolContext, ToolResult, parameter_schema,
};
use primer_session::State;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::display::order_summary;
use super::menu::{
    PIZZAS, SIZES, TOPPINGS, display_list, display_name, find_pizza,
    find_size, find_topping, menu_text, normalize_name, round_cents,
};
use super::order::{
    KEY_ADDRESS, KEY_PHONE_NUMBER, KEY_PIZZA_TYPE, KEY_QUANTITY, KEY_SIZE,
    KEY_STATUS, KEY_TOPPINGS, KEY_TOTAL_PRICE, MAX_QUANTITY, MIN_QUANTITY,
    OrderState, OrderStatus,
};

/// Defines a tool type whose work is a synchronous handler over the
/// session state.
///
/// The handler has the signature `fn(&mut State, Input) -> Value`. The
/// state lock is held only while it runs.
macro_rules! define_tool {
    {
        $(#[$attr:meta])*
        $v:vis struct $tool:ident {
            name: $name:literal,
            description: $description:literal,
            input: $input:ty,
            handler: $handler:path $(,)?
        }
    } => {
        $(#[$attr])*
        $v struct $tool {
            parameter_schema: Value,
        }

        impl $tool {
            #[inline]
            pub fn new() -> Self {
                $tool {
                    parameter_schema: parameter_schema::<$input>(),
                }
            }
        }

        impl Default for $tool {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl Tool for $tool {
            type Input = $input;

            fn name(&self) -> &str {
                $name
            }

            fn description(&self) -> &str {
                $description
            }

            fn parameter_schema(&self) -> &Value {
                &self.parameter_schema
            }

            fn execute(
                &self,
                input: $input,
                ctx: ToolContext,
            ) -> impl Future<Output = ToolResult> + Send + 'static {
                debug!("tool `{}` called", $name);
                let result = $handler(&mut ctx.state(), input);
                std::future::ready(Ok(result))
            }
        }
    };
}

#[derive(Deserialize, JsonSchema)]
pub struct PizzaTypeInput {
    #[schemars(description = "Pizza from the menu, e.g. \"margherita\".")]
    pub pizza_type: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct PizzaSizeInput {
    #[schemars(description = "small, medium, large or extra_large.")]
    pub size: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct ToppingsInput {
    #[schemars(description = "Topping names, e.g. [\"extra_cheese\"].")]
    pub toppings: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct QuantityInput {
    #[schemars(description = "Number of pizzas, between 1 and 20.")]
    pub quantity: i64,
}

#[derive(Deserialize, JsonSchema)]
pub struct DeliveryInfoInput {
    #[schemars(description = "Street address for delivery.")]
    pub address: String,
    #[schemars(description = "Contact phone number, 10 or 11 digits.")]
    pub phone_number: String,
}

define_tool! {
    /// Shows pizzas, sizes and toppings with their prices.
    pub struct DisplayMenuTool {
        name: "display_menu",
        description: "Shows the pizza menu with prices, sizes and extra \
                      toppings.",
        input: NoArguments,
        handler: display_menu,
    }
}

define_tool! {
    /// Selects the pizza.
    pub struct SetPizzaTypeTool {
        name: "set_pizza_type",
        description: "Selects the pizza the customer wants.",
        input: PizzaTypeInput,
        handler: set_pizza_type,
    }
}

define_tool! {
    /// Selects the size.
    pub struct SetPizzaSizeTool {
        name: "set_pizza_size",
        description: "Selects the pizza size.",
        input: PizzaSizeInput,
        handler: set_pizza_size,
    }
}

define_tool! {
    pub struct AddToppingsTool {
        name: "add_toppings",
        description: "Adds extra toppings to the pizza. Toppings already on \
                      the pizza are skipped.",
        input: ToppingsInput,
        handler: add_toppings,
    }
}

define_tool! {
    pub struct RemoveToppingsTool {
        name: "remove_toppings",
        description: "Removes extra toppings from the pizza.",
        input: ToppingsInput,
        handler: remove_toppings,
    }
}

define_tool! {
    pub struct SetQuantityTool {
        name: "set_quantity",
        description: "Sets how many pizzas to order, between 1 and 20.",
        input: QuantityInput,
        handler: set_quantity,
    }
}

define_tool! {
    /// Records where and whom to deliver to.
    pub struct SetDeliveryInfoTool {
        name: "set_delivery_info",
        description: "Sets the delivery address and contact phone number.",
        input: DeliveryInfoInput,
        handler: set_delivery_info,
    }
}

define_tool! {
    /// Prices the order and stores the total.
    pub struct CalculateTotalPriceTool {
        name: "calculate_total_price",
        description: "Calculates the order total with an itemized price \
                      breakdown. Pizza type and size must be selected first.",
        input: NoArguments,
        handler: calculate_total_price,
    }
}

define_tool! {
    pub struct ViewCurrentOrderTool {
        name: "view_current_order",
        description: "Shows a summary of the current order and whether it \
                      is ready for delivery.",
        input: NoArguments,
        handler: view_current_order,
    }
}

fn error_result(action: &str, message: String) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("action".to_owned(), action.into());
    result.insert("status".to_owned(), "error".into());
    result.insert("message".to_owned(), message.into());
    result
}

fn display_menu(_state: &mut State, _input: NoArguments) -> Value {
    json!({
        "action": "display_menu",
        "menu": menu_text(),
    })
}

fn set_pizza_type(state: &mut State, input: PizzaTypeInput) -> Value {
    let Some(pizza) = find_pizza(&input.pizza_type) else {
        let available = display_list(PIZZAS.iter().map(|pizza| pizza.key));
        return error_result(
            "set_pizza_type",
            format!(
                "Pizza type '{}' is not available. Available pizzas: \
                 {available}",
                input.pizza_type
            ),
        )
        .into();
    };

    state.set(KEY_PIZZA_TYPE, pizza.key);
    state.set(KEY_STATUS, OrderStatus::PizzaSelected);

    json!({
        "action": "set_pizza_type",
        "pizza_type": pizza.key,
        "description": pizza.description,
        "base_price": pizza.base_price,
        "message": format!(
            "Great choice! Selected {} pizza (${:.2}). {}",
            display_name(pizza.key),
            pizza.base_price,
            pizza.description
        ),
    })
}

fn set_pizza_size(state: &mut State, input: PizzaSizeInput) -> Value {
    let Some(size) = find_size(&input.size) else {
        let available = display_list(SIZES.iter().map(|size| size.key));
        return error_result(
            "set_pizza_size",
            format!(
                "Size '{}' is not available. Available sizes: {available}",
                input.size
            ),
        )
        .into();
    };

    state.set(KEY_SIZE, size.key);
    state.set(KEY_STATUS, OrderStatus::SizeSelected);

    json!({
        "action": "set_pizza_size",
        "size": size.key,
        "multiplier": size.multiplier,
        "message": format!(
            "Perfect! Selected {} size (price multiplier: {:.1}x)",
            display_name(size.key),
            size.multiplier
        ),
    })
}

fn add_toppings(state: &mut State, input: ToppingsInput) -> Value {
    let mut toppings = OrderState::from_values(state.values()).toppings;

    let mut invalid = vec![];
    let mut added = vec![];
    for name in &input.toppings {
        match find_topping(name) {
            Some(topping) => {
                let key = topping.key.to_owned();
                if !toppings.contains(&key) && !added.contains(&topping) {
                    added.push(topping);
                }
            }
            None => invalid.push(name.clone()),
        }
    }

    if !invalid.is_empty() {
        let available = display_list(TOPPINGS.iter().map(|t| t.key));
        let mut result = error_result(
            "add_toppings",
            format!(
                "Invalid toppings: {}. Available toppings: {available}",
                invalid.join(", ")
            ),
        );
        result.insert("invalid_toppings".to_owned(), json!(invalid));
        return result.into();
    }

    toppings.extend(added.iter().map(|topping| topping.key.to_owned()));
    state.set(KEY_TOPPINGS, json!(toppings));
    if !added.is_empty() {
        state.set(KEY_STATUS, OrderStatus::ToppingsAdded);
    }

    let topping_prices: Map<String, Value> = added
        .iter()
        .map(|topping| (topping.key.to_owned(), topping.price.into()))
        .collect();
    let extra_cost =
        round_cents(added.iter().map(|topping| topping.price).sum());
    let added: Vec<&str> = added.iter().map(|topping| topping.key).collect();
    let added_names = display_list(added.iter().copied());

    json!({
        "action": "add_toppings",
        "added_toppings": added,
        "topping_prices": topping_prices,
        "total_topping_cost": extra_cost,
        "all_toppings": toppings,
        "message": format!(
            "Added toppings: {added_names}. Extra cost: ${extra_cost:.2}"
        ),
    })
}

fn remove_toppings(state: &mut State, input: ToppingsInput) -> Value {
    let mut toppings = OrderState::from_values(state.values()).toppings;

    let mut removed = vec![];
    let mut not_found = vec![];
    for name in &input.toppings {
        let key = normalize_name(name);
        match toppings.iter().position(|topping| *topping == key) {
            Some(index) => removed.push(toppings.remove(index)),
            None => not_found.push(name.clone()),
        }
    }

    state.set(KEY_TOPPINGS, json!(toppings));

    let mut message = vec![];
    if !removed.is_empty() {
        message.push(format!(
            "Removed toppings: {}.",
            display_list(removed.iter().map(String::as_str))
        ));
    }
    if !not_found.is_empty() {
        message.push(format!(
            "Could not find these toppings to remove: {}",
            not_found.join(", ")
        ));
    }

    json!({
        "action": "remove_toppings",
        "removed_toppings": removed,
        "not_found_toppings": not_found,
        "remaining_toppings": toppings,
        "message": message.join(" "),
    })
}

fn set_quantity(state: &mut State, input: QuantityInput) -> Value {
    let quantity = input.quantity;
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return error_result(
            "set_quantity",
            format!(
                "Quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY} \
                 pizzas"
            ),
        )
        .into();
    }

    state.set(KEY_QUANTITY, quantity);

    let plural = if quantity > 1 { "s" } else { "" };
    json!({
        "action": "set_quantity",
        "quantity": quantity,
        "message": format!("Set quantity to {quantity} pizza{plural}"),
    })
}

fn set_delivery_info(state: &mut State, input: DeliveryInfoInput) -> Value {
    let address = input.address.trim();
    let phone_number: String = input
        .phone_number
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    let mut errors = vec![];
    if address.chars().count() < 10 {
        errors.push("Address must be at least 10 characters long");
    }
    if !matches!(phone_number.len(), 10 | 11) {
        errors.push("Phone number must be 10 or 11 digits");
    }
    if !errors.is_empty() {
        let mut result = error_result(
            "set_delivery_info",
            format!("Validation failed: {}", errors.join("; ")),
        );
        result.insert("errors".to_owned(), json!(errors));
        return result.into();
    }

    state.set(KEY_ADDRESS, address);
    state.set(KEY_PHONE_NUMBER, phone_number.as_str());
    state.set(KEY_STATUS, OrderStatus::DeliveryInfoSet);

    json!({
        "action": "set_delivery_info",
        "address": address,
        "phone_number": phone_number,
        "message": format!(
            "Delivery info set! Address: {address}, Phone: {phone_number}"
        ),
    })
}

fn calculate_total_price(state: &mut State, _input: NoArguments) -> Value {
    let order = OrderState::from_values(state.values());
    let Some(price) = order.price() else {
        return error_result(
            "calculate_total_price",
            "Cannot calculate price: Pizza type and size must be selected \
             first"
                .to_owned(),
        )
        .into();
    };

    state.set(KEY_TOTAL_PRICE, price.total_price);
    if order.is_complete() {
        state.set(KEY_STATUS, OrderStatus::OrderComplete);
    }

    let mut result = json!({
        "action": "calculate_total_price",
        "pizza_type": order.pizza_type,
        "size": order.size,
        "toppings": order.toppings,
        "quantity": order.quantity,
        "message": format!(
            "Order total: ${:.2} (Subtotal: ${:.2} + Tax: ${:.2})",
            price.total_price, price.subtotal, price.tax
        ),
    });
    if let (Value::Object(result), Ok(Value::Object(breakdown))) =
        (&mut result, serde_json::to_value(price))
    {
        result.extend(breakdown);
    }
    result
}

fn view_current_order(state: &mut State, _input: NoArguments) -> Value {
    let order = OrderState::from_values(state.values());
    json!({
        "action": "view_current_order",
        "order_summary": order_summary(&order),
        "order_complete": order.is_complete(),
        "status": order.status,
    })
}
