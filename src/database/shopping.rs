use std::collections::BTreeMap;

use super::{
    error::{Error, ErrorKind},
    schema::CartLine,
};
use crate::constants::SHOPPING_LIST_HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per `(name, unit)`. Output is ordered by name, then unit,
/// using plain byte-wise string ordering.
pub fn aggregate(lines: Vec<CartLine>) -> Vec<ShoppingItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn render(first_name: &str, last_name: &str, items: &[ShoppingItem]) -> String {
    let mut text = format!("{SHOPPING_LIST_HEADER} {first_name} {last_name}\n");
    for item in items {
        text += &format!(
            "({} ({}) \u{2014} {})\n",
            item.name, item.measurement_unit, item.amount
        );
    }
    text
}

/// Builds the downloadable list for the cart lines of one user.
pub fn shopping_list(first_name: &str, last_name: &str, lines: Vec<CartLine>) -> Result<String, Error> {
    if lines.is_empty() {
        return Err(ErrorKind::NotFound.new("Shopping cart is empty"));
    }

    Ok(render(first_name, last_name, &aggregate(lines)))
}
