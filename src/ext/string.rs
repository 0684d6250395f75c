/// Single quotes a SQL string literal, doubling any embedded quote.
pub fn single_quote(s: &str) -> String {
    format!("'{}'", escape_literal(s))
}

pub fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

pub fn singularize(s: &str) -> String {
    pluralizer::pluralize(s, 1, false)
}

pub fn pluralize(s: &str) -> String {
    pluralizer::pluralize(s, 2, false)
}

/// The lookup key every table name and alias is stored under.
///
/// `Products`, `products` and `product` all map to `product`, so callers
/// never need to know which form a name was written in.
pub fn canonical(name: &str) -> String {
    singularize(&name.to_lowercase())
}

pub fn is_singular(name: &str) -> bool {
    let lower = name.to_lowercase();
    singularize(&lower) == lower && pluralize(&lower) != lower
}
