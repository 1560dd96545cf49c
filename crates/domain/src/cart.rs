//! Session-scoped shopping cart.
//!
//! The cart is rebuilt from an opaque session blob on every request and
//! written back when modified. It never fails on bad data: entries that
//! cannot be interpreted are dropped on load, quantities are clamped to the
//! known stock, and lines with a non-positive price or quantity are skipped
//! when iterating or totalling.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::product::Product;
use crate::value_objects::{Money, ProductId};

const KEY_QUANTITY: &str = "quantity";
const KEY_PRICE: &str = "price";
const KEY_NAME: &str = "name";
const KEY_STOCK: &str = "stock";
const KEY_IMAGE: &str = "image";

/// One product's entry in the cart, as stored in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub quantity: u32,
    /// Price captured when the product was first added.
    pub unit_price: Money,
    pub name: String,
    /// Stock seen at the last add or refresh; used only for clamping.
    pub stock: u32,
    pub image: Option<String>,
}

impl CartLine {
    fn is_valid(&self) -> bool {
        self.quantity > 0 && self.unit_price.is_positive()
    }
}

/// Normalized, read-only snapshot of a valid cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub stock: u32,
}

/// Cart contents keyed by product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: BTreeMap<ProductId, CartLine>,
    modified: bool,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a cart from its session blob, dropping malformed entries.
    ///
    /// A missing or non-object blob yields an empty cart.
    pub fn from_session(blob: Option<&Value>) -> Self {
        let Some(Value::Object(entries)) = blob else {
            return Self {
                lines: BTreeMap::new(),
                modified: blob.is_some(),
            };
        };

        let mut lines = BTreeMap::new();
        let mut dropped = 0usize;
        for (key, entry) in entries {
            match parse_line(entry) {
                Some(line) => {
                    lines.insert(ProductId::new(key.as_str()), line);
                }
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, "dropped malformed cart entries");
        }

        Self {
            lines,
            modified: dropped > 0,
        }
    }

    /// Serializes the cart into its session blob.
    pub fn to_session(&self) -> Value {
        let entries: Map<String, Value> = self
            .lines
            .iter()
            .map(|(id, line)| {
                let mut entry = Map::new();
                entry.insert(KEY_QUANTITY.into(), Value::from(line.quantity));
                entry.insert(
                    KEY_PRICE.into(),
                    Value::String(line.unit_price.to_decimal().to_string()),
                );
                entry.insert(KEY_NAME.into(), Value::String(line.name.clone()));
                entry.insert(KEY_STOCK.into(), Value::from(line.stock));
                entry.insert(
                    KEY_IMAGE.into(),
                    line.image.clone().map_or(Value::Null, Value::String),
                );
                (id.to_string(), Value::Object(entry))
            })
            .collect();
        Value::Object(entries)
    }

    /// Adds a product or changes its quantity.
    ///
    /// A new line gets `quantity`; an existing line is incremented by
    /// `quantity`, or replaced when `override_quantity` is set. Either way the
    /// stored quantity is clamped to the product's current stock. Over-asking
    /// is not an error.
    pub fn add(&mut self, product: &Product, quantity: u32, override_quantity: bool) {
        let line = self
            .lines
            .entry(product.id.clone())
            .and_modify(|line| {
                line.quantity = if override_quantity {
                    quantity
                } else {
                    line.quantity.saturating_add(quantity)
                };
                line.stock = product.stock;
            })
            .or_insert_with(|| CartLine {
                quantity,
                unit_price: product.price,
                name: product.name.clone(),
                stock: product.stock,
                image: product.image.clone(),
            });

        line.quantity = line.quantity.min(product.stock);
        self.modified = true;
    }

    /// Removes a product's line. Returns false if it was not in the cart.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let removed = self.lines.remove(product_id).is_some();
        if removed {
            self.modified = true;
        }
        removed
    }

    /// Discards every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.modified = true;
    }

    /// Iterates the valid lines in product order.
    ///
    /// Each call starts a fresh pass over the current contents.
    pub fn lines(&self) -> impl Iterator<Item = CartLineView> + '_ {
        self.lines
            .iter()
            .filter(|(_, line)| line.is_valid())
            .map(|(id, line)| CartLineView {
                product_id: id.clone(),
                name: line.name.clone(),
                image: line.image.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.unit_price.multiply(line.quantity),
                stock: line.stock,
            })
    }

    /// Sum of `price × quantity` over valid lines; zero for an empty cart.
    pub fn total_price(&self) -> Money {
        self.lines().map(|line| line.total_price).sum()
    }

    /// Total number of units across valid lines (the cart badge count).
    pub fn line_count(&self) -> u32 {
        self.lines()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Quantity stored for a product, zero if absent.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.lines.get(product_id).map_or(0, |line| line.quantity)
    }

    /// Raw line lookup, including lines that iteration would skip.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.get(product_id)
    }

    /// Products referenced by the cart, in lock order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.keys().cloned().collect()
    }

    /// Returns true if no valid line remains.
    pub fn is_empty(&self) -> bool {
        self.line_count() == 0
    }

    /// Applies freshly read stock levels.
    ///
    /// Lines whose product is missing from `live_stock` are dropped; the others
    /// get a new stock snapshot and are re-clamped.
    pub fn refresh_stock(&mut self, live_stock: &HashMap<ProductId, u32>) {
        let before = self.lines.clone();
        self.lines.retain(|id, line| match live_stock.get(id) {
            Some(&stock) => {
                line.stock = stock;
                line.quantity = line.quantity.min(stock);
                true
            }
            None => false,
        });
        if self.lines != before {
            self.modified = true;
        }
    }

    /// Returns true if the cart changed since it was loaded or last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Marks the current contents as persisted.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }
}

fn parse_line(entry: &Value) -> Option<CartLine> {
    let entry = entry.as_object()?;
    let quantity = coerce_count(entry.get(KEY_QUANTITY)?)?;
    let unit_price = coerce_price(entry.get(KEY_PRICE)?)?;
    let name = match entry.get(KEY_NAME)? {
        Value::String(name) => name.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    let stock = coerce_count(entry.get(KEY_STOCK)?)?;
    let image = entry
        .get(KEY_IMAGE)
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(CartLine {
        quantity,
        unit_price,
        name,
        stock,
        image,
    })
}

fn coerce_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                u32::try_from(v).ok()
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) {
                    Some(f as u32)
                } else {
                    None
                }
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_price(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => Money::parse(&n.to_string()),
        Value::String(s) => Money::parse(s),
        _ => None,
    }
}
