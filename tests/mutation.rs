#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{compile, expect_ok, keyless_compiler, nest, select, vars, TestError};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlgraph::ast::{Exp, Op, Operation, Preset, QCode, Val};
use sqlgraph::Error;

fn compile_err(qc: &QCode, vars: &sqlgraph::ast::Variables) -> Error {
    match compile(qc, vars) {
        Err(TestError::Compile(err)) => err,
        Err(other) => panic!("unexpected failure: {}", other),
        Ok(compiled) => panic!("expected an error, got {}", compiled.sql),
    }
}

#[test]
fn test_insert() {
    let qc = QCode::mutation(
        Operation::Insert,
        "data",
        vec![select(0, "products", &["id", "name"])],
    );
    let sql = expect_ok(compile(&qc, &vars(json!({ "data": { "name": "Apple", "price": 10 } })))).sql;

    assert_eq!(
        sql,
        concat!(
            r#"WITH "_sg_input" AS (SELECT '{{data}}' :: json AS j), "#,
            r#""products" AS (INSERT INTO "products" ("name", "price") "#,
            r#"SELECT "t"."name", "t"."price" FROM "_sg_input" i, "#,
            r#"json_populate_record(NULL::"products", i.j) t RETURNING *) "#,
            r#"SELECT json_object_agg('products', "json_0") FROM ("#,
            r#"SELECT coalesce(json_agg("json_0"), '[]') AS "json_0" FROM ("#,
            r#"SELECT row_to_json((SELECT "json_row_0" FROM ("#,
            r#"SELECT "products_0"."id" AS "id", "products_0"."name" AS "name""#,
            r#") AS "json_row_0")) AS "json_0" FROM ("#,
            r#"SELECT "products"."id", "products"."name" FROM "products""#,
            r#") AS "products_0") AS "json_agg_0") AS "sel_0""#,
        )
    );
}

#[test]
fn test_blocked_insert_stays_valid() {
    let mut products = select(0, "products", &["id"]);
    products.filter = Some(Exp::False);
    let qc = QCode::mutation(Operation::Insert, "data", vec![products]);

    let sql = expect_ok(compile(&qc, &vars(json!({ "data": { "name": "Apple" } })))).sql;
    assert!(
        sql.contains(r#"json_populate_record(NULL::"products", i.j) t WHERE false RETURNING *)"#),
        "{}",
        sql
    );
}

#[test]
fn test_insert_with_parent_row() {
    let mut selects = vec![select(0, "products", &["id"]), select(1, "users", &["email"])];
    selects[1].singular = true;
    selects[1].field_name = "user".to_string();
    nest(&mut selects, 0, 1);
    let qc = QCode::mutation(Operation::Insert, "data", selects);

    let payload = json!({ "data": { "name": "Apple", "user": { "email": "ada@example.com" } } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.starts_with(concat!(
            r#"WITH "_sg_input" AS (SELECT '{{data}}' :: json AS j), "#,
            r#""users" AS (INSERT INTO "users" ("email") SELECT "t"."email" FROM "_sg_input" i, "#,
            r#"json_populate_record(NULL::"users", i.j->'user') t RETURNING *), "#,
            r#""products" AS (INSERT INTO "products" ("name", "user_id") "#,
            r#"SELECT "t"."name", "users"."id" FROM "_sg_input" i, "users", "#,
            r#"json_populate_record(NULL::"products", i.j) t RETURNING *) SELECT"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_insert_with_child_rows() {
    let qc = QCode::mutation(Operation::Insert, "data", vec![select(0, "users", &["id"])]);
    let payload = json!({ "data": {
        "full_name": "Ada",
        "products": [{ "name": "Apple" }, { "name": "Pear", "price": 2 }]
    } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    let users = sql.find(r#""users" AS (INSERT"#).unwrap();
    let products = sql.find(r#""products" AS (INSERT"#).unwrap();
    assert!(users < products, "{}", sql);
    assert!(
        sql.contains(concat!(
            r#""products" AS (INSERT INTO "products" ("name", "price", "user_id") "#,
            r#"SELECT "t"."name", "t"."price", "users"."id" FROM "_sg_input" i, "users", "#,
            r#"json_populate_recordset(NULL::"products", i.j->'products') t RETURNING *)"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_insert_through_junction() {
    let qc = QCode::mutation(Operation::Insert, "data", vec![select(0, "products", &["id"])]);
    let payload = json!({ "data": { "name": "Apple", "customers": { "full_name": "Bo" } } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.contains(concat!(
            r#""customers" AS (INSERT INTO "customers" ("full_name") SELECT "t"."full_name" "#,
            r#"FROM "_sg_input" i, json_populate_record(NULL::"customers", i.j->'customers') t "#,
            r#"RETURNING *), "purchases_1" AS (INSERT INTO "purchases" ("product_id", "customer_id") "#,
            r#"SELECT "products"."id", "customers"."id" FROM "products", "customers" RETURNING *)"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_bulk_insert() {
    let qc = QCode::mutation(Operation::Insert, "data", vec![select(0, "tags", &["slug"])]);
    let payload = json!({ "data": [{ "name": "Red" }, { "name": "Blue", "slug": "blue" }] });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.contains(r#"INSERT INTO "tags" ("name", "slug") SELECT "t"."name", "t"."slug" FROM "_sg_input" i, json_populate_recordset(NULL::"tags", i.j) t"#),
        "{}",
        sql
    );
}

#[test]
fn test_presets_and_allow_list() {
    let mut users = select(0, "users", &["full_name"]);
    users.allowed.insert("full_name".to_string());
    users.presets.push(Preset {
        col: "stripe_id".to_string(),
        value: "$stripe".to_string(),
    });
    let qc = QCode::mutation(Operation::Insert, "data", vec![users]);

    let payload = json!({
        "data": { "full_name": "Ada", "email": "ada@example.com" },
        "stripe": "cus_1"
    });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;
    assert!(
        sql.contains(r#"INSERT INTO "users" ("full_name", "stripe_id") SELECT "t"."full_name", 'cus_1' :: text FROM"#),
        "{}",
        sql
    );
}

#[test]
fn test_preset_on_unknown_column() {
    let mut users = select(0, "users", &["id"]);
    users.presets.push(Preset {
        col: "role".to_string(),
        value: "admin".to_string(),
    });
    let qc = QCode::mutation(Operation::Insert, "data", vec![users]);

    match compile_err(&qc, &vars(json!({ "data": { "full_name": "Ada" } }))) {
        Error::UnknownColumn { column, .. } => assert_eq!(column, "role"),
        other => panic!("expected an unknown column, got {:?}", other),
    }
}

#[test]
fn test_upsert() {
    let qc = QCode::mutation(Operation::Upsert, "data", vec![select(0, "users", &["id"])]);

    let sql = expect_ok(compile(
        &qc,
        &vars(json!({ "data": { "email": "ada@example.com", "full_name": "Ada" } })),
    ))
    .sql;
    assert!(
        sql.contains(concat!(
            r#"json_populate_record(NULL::"users", i.j) t ON CONFLICT ("email") "#,
            r#"DO UPDATE SET "full_name" = EXCLUDED."full_name" RETURNING *)"#,
        )),
        "{}",
        sql
    );

    let sql = expect_ok(compile(&qc, &vars(json!({ "data": { "email": "ada@example.com" } })))).sql;
    assert!(sql.contains(r#"ON CONFLICT ("email") DO NOTHING RETURNING *)"#), "{}", sql);

    let sql = expect_ok(compile(&qc, &vars(json!({ "data": { "full_name": "Ada" } })))).sql;
    assert!(
        sql.contains(r#"ON CONFLICT ("id") DO UPDATE SET "full_name" = EXCLUDED."full_name""#),
        "{}",
        sql
    );
}

#[test]
fn test_upsert_needs_a_conflict_target() {
    let compiler = expect_ok(keyless_compiler());
    let qc = QCode::mutation(Operation::Upsert, "data", vec![select(0, "events", &["name"])]);

    match compiler.compile(&qc, &vars(json!({ "data": { "name": "signup" } }))) {
        Err(Error::MissingPrimaryKey { table, .. }) => assert_eq!(table, "events"),
        other => panic!("expected a missing primary key, got {:?}", other.map(|c| c.sql)),
    }
}

#[test]
fn test_update() {
    let mut user = select(0, "users", &["id"]);
    user.singular = true;
    user.filter = Some(Exp::cond("id", Op::Equals, Val::Var("id".to_string())));
    let qc = QCode::mutation(Operation::Update, "data", vec![user]);

    let sql = expect_ok(compile(&qc, &vars(json!({ "data": { "full_name": "Ada" } })))).sql;
    assert!(
        sql.contains(concat!(
            r#""users" AS (UPDATE "users" SET ("full_name") = (SELECT "t"."full_name" "#,
            r#"FROM "_sg_input" i, json_populate_record(NULL::"users", i.j) t) "#,
            r#"WHERE (("users"."id") = '{{id}}' :: bigint) RETURNING "users".*)"#,
        )),
        "{}",
        sql
    );
    // The read only narrows to one row, the filter already ran.
    assert!(
        sql.contains(r#"SELECT "users"."id" FROM "users" LIMIT ('1') :: integer"#),
        "{}",
        sql
    );
}

#[test]
fn test_nested_update() {
    let mut user = select(0, "users", &["id"]);
    user.filter = Some(Exp::cond("id", Op::Equals, Val::Int(1)));
    let qc = QCode::mutation(Operation::Update, "data", vec![user]);

    let payload = json!({ "data": {
        "full_name": "Ada",
        "products": { "where": { "id": 5 }, "name": "Golden Apple" }
    } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;
    assert!(
        sql.contains(concat!(
            r#""products" AS (UPDATE "products" SET ("name") = (SELECT "t"."name" "#,
            r#"FROM "_sg_input" i, json_populate_record(NULL::"products", i.j->'products') t) "#,
            r#"FROM "users" WHERE (("products"."user_id") = ("users"."id")) "#,
            r#"AND (("products"."id") = 5) RETURNING "products".*)"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_update_and_delete_need_a_filter() {
    let qc = QCode::mutation(Operation::Update, "data", vec![select(0, "users", &["id"])]);
    match compile_err(&qc, &vars(json!({ "data": { "full_name": "Ada" } }))) {
        Error::MissingFilter { operation, table } => {
            assert_eq!(operation, "update");
            assert_eq!(table, "users");
        }
        other => panic!("expected a missing filter, got {:?}", other),
    }

    let mut qc = QCode::query(vec![select(0, "users", &["id"])]);
    qc.operation = Operation::Delete;
    match compile_err(&qc, &vars(json!({}))) {
        Error::MissingFilter { operation, .. } => assert_eq!(operation, "delete"),
        other => panic!("expected a missing filter, got {:?}", other),
    }
}

#[test]
fn test_delete() {
    let mut products = select(0, "products", &["id"]);
    products.filter = Some(Exp::cond("id", Op::Equals, Val::Int(1)));
    let mut qc = QCode::query(vec![products]);
    qc.operation = Operation::Delete;

    let sql = expect_ok(compile(&qc, &vars(json!({})))).sql;
    assert!(
        sql.starts_with(concat!(
            r#"WITH "products" AS (DELETE FROM "products" WHERE (("products"."id") = 1) RETURNING *) "#,
            r#"SELECT json_object_agg('products', "json_0")"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_connect_parent_row() {
    let mut selects = vec![select(0, "products", &["id"]), select(1, "users", &["email"])];
    selects[1].singular = true;
    selects[1].field_name = "user".to_string();
    nest(&mut selects, 0, 1);
    let qc = QCode::mutation(Operation::Insert, "data", selects);

    let payload = json!({ "data": { "name": "Apple", "user": { "connect": { "id": 5 } } } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.starts_with(concat!(
            r#"WITH "_sg_input" AS (SELECT '{{data}}' :: json AS j), "#,
            r#""users_2" AS (SELECT * FROM "users" WHERE (("users"."id") = 5) LIMIT 1), "#,
            r#""users" AS (SELECT * FROM "users_2"), "#,
            r#""products" AS (INSERT INTO "products" ("name", "user_id") "#,
            r#"SELECT "t"."name", "users_2"."id" FROM "_sg_input" i, "users_2", "#,
            r#"json_populate_record(NULL::"products", i.j) t RETURNING *) SELECT"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_connect_and_disconnect_children() {
    let mut user = select(0, "users", &["id"]);
    user.filter = Some(Exp::cond("id", Op::Equals, Val::Var("id".to_string())));
    let qc = QCode::mutation(Operation::Update, "data", vec![user]);

    let payload = json!({ "data": {
        "products": { "connect": { "id": 1 }, "disconnect": { "id": 2 } }
    } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.starts_with(concat!(
            r#"WITH "_sg_input" AS (SELECT '{{data}}' :: json AS j), "#,
            r#""users" AS (SELECT "users".* FROM "users" WHERE (("users"."id") = '{{id}}' :: bigint)), "#,
            r#""products_2" AS (UPDATE "products" SET "user_id" = "users"."id" FROM "users" "#,
            r#"WHERE (("products"."id") = 1) RETURNING "products".*), "#,
            r#""products_3" AS (UPDATE "products" SET "user_id" = NULL FROM "users" "#,
            r#"WHERE (("products"."user_id") = ("users"."id")) AND (("products"."id") = 2) "#,
            r#"RETURNING "products".*), "#,
            r#""products" AS (SELECT * FROM "products_2" UNION ALL SELECT * FROM "products_3") SELECT"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_connect_through_junction() {
    let mut selects = vec![select(0, "products", &["id"]), select(1, "customers", &["id"])];
    nest(&mut selects, 0, 1);
    let qc = QCode::mutation(Operation::Insert, "data", selects);
    let payload = json!({ "data": {
        "name": "Apple",
        "customers": { "connect": [{ "id": 1 }, { "id": 2 }] }
    } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.contains(concat!(
            r#""customers_2" AS (SELECT * FROM "customers" "#,
            r#"WHERE ((("customers"."id") = 1) OR (("customers"."id") = 2))), "#,
            r#""purchases_2" AS (INSERT INTO "purchases" ("product_id", "customer_id") "#,
            r#"SELECT "products"."id", "customers_2"."id" FROM "products", "customers_2" RETURNING *), "#,
            r#""customers" AS (SELECT * FROM "customers_2"), "#,
            r#""purchases" AS (SELECT "purchases".* FROM "purchases" "#,
            r#"UNION ALL SELECT * FROM "purchases_2") SELECT"#,
        )),
        "{}",
        sql
    );

    // The read joins the junction rows written above.
    let junction = sql.find(r#""purchases" AS (SELECT"#).unwrap();
    let join = sql.find(r#"LEFT OUTER JOIN "purchases" ON"#).unwrap();
    assert!(junction < join, "{}", sql);
}

#[test]
fn test_disconnect_through_junction() {
    let mut products = select(0, "products", &["id"]);
    products.filter = Some(Exp::cond("id", Op::Equals, Val::Int(1)));
    let mut selects = vec![products, select(1, "customers", &["id"])];
    nest(&mut selects, 0, 1);
    let qc = QCode::mutation(Operation::Update, "data", selects);

    let payload = json!({ "data": { "customers": { "disconnect": { "id": 2 } } } });
    let sql = expect_ok(compile(&qc, &vars(payload))).sql;

    assert!(
        sql.contains(concat!(
            r#""purchases_2" AS (DELETE FROM "purchases" USING "products", "customers_2" "#,
            r#"WHERE (("purchases"."product_id") = ("products"."id")) "#,
            r#"AND (("purchases"."customer_id") = ("customers_2"."id")) RETURNING "purchases".*)"#,
        )),
        "{}",
        sql
    );
    assert!(
        sql.contains(concat!(
            r#""purchases" AS (SELECT "purchases".* FROM "purchases" WHERE NOT EXISTS "#,
            r#"(SELECT 1 FROM "purchases_2" WHERE "#,
            r#"(("purchases_2"."customer_id") = ("purchases"."customer_id")) AND "#,
            r#"(("purchases_2"."product_id") = ("purchases"."product_id")))) SELECT"#,
        )),
        "{}",
        sql
    );
}

#[test]
fn test_views_cannot_be_written() {
    let compiler = expect_ok(keyless_compiler());
    let qc = QCode::mutation(
        Operation::Insert,
        "data",
        vec![select(0, "event_counts", &["total"])],
    );

    match compiler.compile(&qc, &vars(json!({ "data": { "name": "signup" } }))) {
        Err(Error::ReadOnlyTable(table)) => assert_eq!(table, "event_counts"),
        other => panic!("expected a read only table, got {:?}", other.map(|c| c.sql)),
    }

    let read = QCode::query(vec![select(0, "event_counts", &["total"])]);
    assert!(compiler.compile(&read, &vars(json!({}))).is_ok());
}

#[test]
fn test_rejected_payloads() {
    let insert_users = QCode::mutation(Operation::Insert, "data", vec![select(0, "users", &["id"])]);

    match compile_err(&insert_users, &vars(json!({}))) {
        Error::MissingVariable(name) => assert_eq!(name, "data"),
        other => panic!("expected a missing variable, got {:?}", other),
    }

    let bulk = json!({ "data": [{ "full_name": "Ada", "products": [{ "name": "Apple" }] }] });
    match compile_err(&insert_users, &vars(bulk)) {
        Error::NestedBulkMutation => {}
        other => panic!("expected a nested bulk error, got {:?}", other),
    }

    let disconnect = json!({ "data": { "products": { "disconnect": { "id": 1 } } } });
    match compile_err(&insert_users, &vars(disconnect)) {
        Error::InvalidPayload(_) => {}
        other => panic!("expected an invalid payload, got {:?}", other),
    }

    let unknown = json!({ "data": { "full_name": "Ada", "widgets": { "name": "x" } } });
    match compile_err(&insert_users, &vars(unknown)) {
        Error::UnknownTable(name) => assert_eq!(name, "widgets"),
        other => panic!("expected an unknown table, got {:?}", other),
    }

    let insert_products =
        QCode::mutation(Operation::Insert, "data", vec![select(0, "products", &["id"])]);
    let twice = json!({ "data": {
        "name": "Apple",
        "user": { "email": "ada@example.com", "products": { "name": "Pear" } }
    } });
    match compile_err(&insert_products, &vars(twice)) {
        Error::DuplicateMutation(name) => assert_eq!(name, "products"),
        other => panic!("expected a duplicate mutation, got {:?}", other),
    }

    let junction_twice = json!({ "data": {
        "name": "Apple",
        "customers": { "connect": { "id": 1 } },
        "purchases": { "quantity": 2 }
    } });
    match compile_err(&insert_products, &vars(junction_twice)) {
        Error::DuplicateMutation(name) => assert_eq!(name, "purchases"),
        other => panic!("expected a duplicate mutation, got {:?}", other),
    }
}

#[test]
fn test_remote_children_cannot_be_written() {
    let qc = QCode::mutation(Operation::Insert, "data", vec![select(0, "users", &["id"])]);
    let payload = json!({ "data": { "full_name": "Ada", "payments": { "amount": 1 } } });

    match compile_err(&qc, &vars(payload)) {
        Error::UnknownTable(name) => assert_eq!(name, "payments"),
        Error::UnsupportedRelationship { child, .. } => assert_eq!(child, "payments"),
        other => panic!("expected the remote child to be refused, got {:?}", other),
    }
}
