//! The fixed menu: pizzas, sizes and extra toppings.

use std::fmt::Write as _;

/// Sales tax applied to the subtotal.
pub const TAX_RATE: f64 = 0.08;

/// A pizza on the menu.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pizza {
    /// Key stored in the order state, e.g. `meat_lovers`.
    pub key: &'static str,
    /// Price of a medium pizza without extra toppings.
    pub base_price: f64,
    /// What's on it.
    pub description: &'static str,
}

/// A pizza size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    /// Key stored in the order state, e.g. `extra_large`.
    pub key: &'static str,
    /// Factor applied to the base price.
    pub multiplier: f64,
}

/// An extra topping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Topping {
    /// Key stored in the order state, e.g. `extra_cheese`.
    pub key: &'static str,
    /// Surcharge per pizza.
    pub price: f64,
}

pub const PIZZAS: &[Pizza] = &[
    Pizza {
        key: "margherita",
        base_price: 12.99,
        description: "Classic tomato sauce, mozzarella, and basil",
    },
    Pizza {
        key: "pepperoni",
        base_price: 14.99,
        description: "Tomato sauce, mozzarella, and pepperoni",
    },
    Pizza {
        key: "supreme",
        base_price: 18.99,
        description: "Tomato sauce, mozzarella, pepperoni, sausage, peppers, \
                      onions, mushrooms",
    },
    Pizza {
        key: "hawaiian",
        base_price: 16.99,
        description: "Tomato sauce, mozzarella, ham, and pineapple",
    },
    Pizza {
        key: "meat_lovers",
        base_price: 19.99,
        description: "Tomato sauce, mozzarella, pepperoni, sausage, ham, \
                      and bacon",
    },
    Pizza {
        key: "veggie",
        base_price: 15.99,
        description: "Tomato sauce, mozzarella, peppers, onions, mushrooms, \
                      and olives",
    },
];

pub const SIZES: &[Size] = &[
    Size {
        key: "small",
        multiplier: 0.8,
    },
    Size {
        key: "medium",
        multiplier: 1.0,
    },
    Size {
        key: "large",
        multiplier: 1.3,
    },
    Size {
        key: "extra_large",
        multiplier: 1.6,
    },
];

pub const TOPPINGS: &[Topping] = &[
    Topping {
        key: "pepperoni",
        price: 2.00,
    },
    Topping {
        key: "sausage",
        price: 2.00,
    },
    Topping {
        key: "mushrooms",
        price: 1.50,
    },
    Topping {
        key: "peppers",
        price: 1.50,
    },
    Topping {
        key: "onions",
        price: 1.50,
    },
    Topping {
        key: "olives",
        price: 1.50,
    },
    Topping {
        key: "extra_cheese",
        price: 2.50,
    },
    Topping {
        key: "bacon",
        price: 2.50,
    },
    Topping {
        key: "ham",
        price: 2.00,
    },
    Topping {
        key: "pineapple",
        price: 1.50,
    },
];

/// Turns user or model input into a menu key: trimmed, lowercase, with
/// spaces and hyphens as underscores. `"Extra Cheese"` → `extra_cheese`.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Turns a menu key into a title, `meat_lovers` → `Meat Lovers`.
pub fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Joins display names of `keys` with commas.
pub fn display_list<'a, I>(keys: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .map(display_name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[inline]
pub fn find_pizza(name: &str) -> Option<&'static Pizza> {
    let key = normalize_name(name);
    PIZZAS.iter().find(|pizza| pizza.key == key)
}

#[inline]
pub fn find_size(name: &str) -> Option<&'static Size> {
    let key = normalize_name(name);
    SIZES.iter().find(|size| size.key == key)
}

#[inline]
pub fn find_topping(name: &str) -> Option<&'static Topping> {
    let key = normalize_name(name);
    TOPPINGS.iter().find(|topping| topping.key == key)
}

/// Rounds a price to whole cents.
#[inline]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Renders the full menu as Markdown-ish text.
pub fn menu_text() -> String {
    let mut text = String::from("🍕 **PIZZA MENU** 🍕\n\n");
    for pizza in PIZZAS {
        let _ = writeln!(
            text,
            "**{}** - ${:.2}\n   {}\n",
            display_name(pizza.key),
            pizza.base_price,
            pizza.description
        );
    }

    text.push_str("\n**SIZES & PRICING:**\n");
    for size in SIZES {
        let pricing = if size.multiplier == 1.0 {
            "base price".to_owned()
        } else {
            format!("{:.0}% of base price", size.multiplier * 100.0)
        };
        let _ = writeln!(text, "- {} ({pricing})", display_name(size.key));
    }

    text.push_str("\n**ADDITIONAL TOPPINGS:**\n");
    for topping in TOPPINGS {
        let _ = writeln!(
            text,
            "- {}: +${:.2}",
            display_name(topping.key),
            topping.price
        );
    }
    text
}
