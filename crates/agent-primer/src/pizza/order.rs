//! The order as it lives in session state.

use std::fmt;

use primer_session::StateMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::menu::{TAX_RATE, find_pizza, find_size, find_topping, round_cents};

pub const KEY_STATUS: &str = "status";
pub const KEY_PIZZA_TYPE: &str = "pizza_type";
pub const KEY_SIZE: &str = "size";
pub const KEY_TOPPINGS: &str = "toppings";
pub const KEY_QUANTITY: &str = "quantity";
pub const KEY_ADDRESS: &str = "address";
pub const KEY_PHONE_NUMBER: &str = "phone_number";
pub const KEY_TOTAL_PRICE: &str = "total_price";

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 20;

/// Where the customer is in the ordering process.
///
/// The status is a hint for the model and the CLI. Tools may be called in
/// any order and never check it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Start,
    PizzaSelected,
    SizeSelected,
    ToppingsAdded,
    DeliveryInfoSet,
    OrderComplete,
}

impl OrderStatus {
    /// Returns the label stored in session state.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Start => "START",
            OrderStatus::PizzaSelected => "PIZZA_SELECTED",
            OrderStatus::SizeSelected => "SIZE_SELECTED",
            OrderStatus::ToppingsAdded => "TOPPINGS_ADDED",
            OrderStatus::DeliveryInfoSet => "DELIVERY_INFO_SET",
            OrderStatus::OrderComplete => "ORDER_COMPLETE",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OrderStatus> for Value {
    #[inline]
    fn from(status: OrderStatus) -> Self {
        Value::String(status.as_str().to_owned())
    }
}

/// A typed snapshot of the order keys in session state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderState {
    pub status: OrderStatus,
    pub pizza_type: Option<String>,
    pub size: Option<String>,
    pub toppings: Vec<String>,
    pub quantity: i64,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub total_price: f64,
}

impl Default for OrderState {
    fn default() -> Self {
        Self {
            status: OrderStatus::Start,
            pizza_type: None,
            size: None,
            toppings: vec![],
            quantity: MIN_QUANTITY,
            address: None,
            phone_number: None,
            total_price: 0.0,
        }
    }
}

impl OrderState {
    /// Reads the order from session state.
    ///
    /// Missing keys, `null`s and values of the wrong shape fall back to the
    /// defaults, so a half-written or hand-edited state still loads.
    pub fn from_values(values: &StateMap) -> Self {
        let default = Self::default();
        Self {
            status: field(values, KEY_STATUS).unwrap_or(default.status),
            pizza_type: field(values, KEY_PIZZA_TYPE),
            size: field(values, KEY_SIZE),
            toppings: field(values, KEY_TOPPINGS).unwrap_or_default(),
            quantity: field(values, KEY_QUANTITY).unwrap_or(default.quantity),
            address: field(values, KEY_ADDRESS),
            phone_number: field(values, KEY_PHONE_NUMBER),
            total_price: field(values, KEY_TOTAL_PRICE)
                .unwrap_or(default.total_price),
        }
    }

    /// Writes every key, with `null` for fields that aren't set yet.
    pub fn to_state_map(&self) -> StateMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(object)) => object.into_iter().collect(),
            _ => StateMap::new(),
        }
    }

    /// Returns `true` once everything needed for delivery is known.
    pub fn is_complete(&self) -> bool {
        is_set(&self.pizza_type)
            && is_set(&self.size)
            && is_set(&self.address)
            && is_set(&self.phone_number)
    }

    /// Prices the order. Returns `None` until a known pizza and size are
    /// selected.
    ///
    /// Toppings that aren't on the menu are ignored.
    pub fn price(&self) -> Option<PriceBreakdown> {
        let pizza = find_pizza(self.pizza_type.as_deref()?)?;
        let size = find_size(self.size.as_deref()?)?;

        let pizza_price = pizza.base_price * size.multiplier;
        let toppings_price: f64 = self
            .toppings
            .iter()
            .filter_map(|name| find_topping(name))
            .map(|topping| topping.price)
            .sum();
        let price_per_pizza = pizza_price + toppings_price;
        let subtotal = price_per_pizza * self.quantity as f64;

        Some(PriceBreakdown {
            base_price: pizza.base_price,
            size_multiplier: size.multiplier,
            pizza_price: round_cents(pizza_price),
            toppings_price: round_cents(toppings_price),
            price_per_pizza: round_cents(price_per_pizza),
            subtotal: round_cents(subtotal),
            tax: round_cents(subtotal * TAX_RATE),
            total_price: round_cents(subtotal * (1.0 + TAX_RATE)),
        })
    }
}

/// How the total of an order adds up. Amounts are rounded to cents, the
/// total is computed before rounding the parts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub size_multiplier: f64,
    pub pizza_price: f64,
    pub toppings_price: f64,
    pub price_per_pizza: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total_price: f64,
}

fn field<T: DeserializeOwned>(values: &StateMap, key: &str) -> Option<T> {
    match values.get(key)? {
        Value::Null => None,
        value => match serde_json::from_value(value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("ignoring order key `{key}`: {err}");
                None
            }
        },
    }
}

#[inline]
fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|value| !value.is_empty())
}
