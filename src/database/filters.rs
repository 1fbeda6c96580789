use std::str::FromStr;

use super::{
    error::{Error, TypeError},
    schema::Id,
};

/// Raw query string pairs, in order, repeated keys kept.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get(key) {
            Some(value) if !value.is_empty() => value
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(key, "Expected a valid integer")),
            _ => Ok(None),
        }
    }

    pub fn get_flag(&self, key: &str) -> Result<Option<bool>, TypeError> {
        match self.get(key) {
            Some(value) => parse_flag(value)
                .map(Some)
                .ok_or_else(|| TypeError::new(key, "Expected 0, 1, true or false")),
            None => Ok(None),
        }
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Recipe list predicates. Flags only apply to authenticated callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub ingredient_name: Option<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    pub fn from_params(params: &QueryParams) -> Result<Self, Error> {
        let mut tags: Vec<String> = params
            .get_all("tags")
            .into_iter()
            .filter(|slug| !slug.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        Ok(Self {
            author: params.get_number("author")?,
            tags,
            ingredient_name: params
                .get("ingredients__name")
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            is_favorited: params.get_flag("is_favorited")?,
            is_in_shopping_cart: params.get_flag("is_in_shopping_cart")?,
        })
    }

    /// Drops the caller-relative flags for anonymous callers.
    pub fn for_viewer(mut self, authenticated: bool) -> Self {
        if !authenticated {
            self.is_favorited = None;
            self.is_in_shopping_cart = None;
        }
        self
    }
}

/// Case-insensitive substring pattern for `ILIKE`, with the input's own
/// wildcards escaped.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
