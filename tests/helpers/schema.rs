use sqlgraph::db::introspect::{DbColumn, DbInfo, DbTable, TableKind};

fn table(id: i32, name: &str) -> DbTable {
    DbTable {
        id,
        name: name.to_string(),
        kind: TableKind::Table,
    }
}

/// A small shop: users own products, customers buy products through
/// purchases, products carry tags by slug and employees report to each other.
pub fn shop() -> DbInfo {
    let users = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "full_name", "text").not_null(),
        DbColumn::new(3, "email", "text").unique(),
        DbColumn::new(4, "stripe_id", "text"),
    ];

    let products = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "name", "text"),
        DbColumn::new(3, "description", "text"),
        DbColumn::new(4, "price", "numeric(7,2)"),
        DbColumn::new(5, "user_id", "bigint").references("users", 1),
        DbColumn::new(6, "tags", "text[]").array().references("tags", 3),
        DbColumn::new(7, "tsv", "tsvector"),
    ];

    let customers = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "full_name", "text"),
        DbColumn::new(3, "email", "text").unique(),
    ];

    let purchases = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "customer_id", "bigint").references("customers", 1),
        DbColumn::new(3, "product_id", "bigint").references("products", 1),
        DbColumn::new(4, "quantity", "integer"),
    ];

    let tags = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "name", "text"),
        DbColumn::new(3, "slug", "text").unique(),
    ];

    let employees = vec![
        DbColumn::new(1, "id", "bigint").primary(),
        DbColumn::new(2, "name", "text"),
        DbColumn::new(3, "manager_id", "bigint").references("employees", 1),
    ];

    DbInfo {
        version: 110005,
        tables: vec![
            table(1, "users"),
            table(2, "products"),
            table(3, "customers"),
            table(4, "purchases"),
            table(5, "tags"),
            table(6, "employees"),
        ],
        columns: vec![users, products, customers, purchases, tags, employees],
    }
}

/// A log table with no primary key, and a view counting its events.
pub fn keyless() -> DbInfo {
    let counts = DbTable {
        id: 2,
        name: "event_counts".to_string(),
        kind: TableKind::View,
    };

    DbInfo {
        version: 110005,
        tables: vec![table(1, "events"), counts],
        columns: vec![
            vec![
                DbColumn::new(1, "name", "text"),
                DbColumn::new(2, "payload", "jsonb"),
            ],
            vec![
                DbColumn::new(1, "name", "text"),
                DbColumn::new(2, "total", "bigint"),
            ],
        ],
    }
}
