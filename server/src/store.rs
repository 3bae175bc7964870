//! Durable half of the image substrate.
//!
//! Classes and their methods live in normalised tables; everything else
//! in the base image (the bridge marker, plain values) lives as raw
//! key→JSON rows. `base_environment` recomposes the blob the loader
//! consumes. Method saves are upserts inside a transaction, so
//! concurrent saves serialise with last-write-wins per
//! (class, selector) and a method row keeps its id across updates.

use std::str::FromStr;

use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

/// Open the store and bring it to the current schema.
///
/// Reads dominate this service (the UI polls the base environment);
/// writes are rare upserts serialised through transactions. WAL keeps
/// readers unblocked during a save, and foreign keys are enforced so a
/// class row owns its method rows.
pub async fn open(database_url: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// A stored method, as served by `GET /method/{class}/{selector}`.
pub struct MethodRecord {
    pub selector: String,
    pub arguments: Value,
    pub body: Value,
}

/// First-run seed: write the built-in base image into an empty store.
pub async fn seed_defaults(db: &SqlitePool) -> sqlx::Result<()> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS cnt FROM classes")
        .fetch_one(db)
        .await?
        .get("cnt");
    if count > 0 {
        return Ok(());
    }

    let image = son_eval::image::default_image();
    let Some(blob) = image.as_object() else {
        return Ok(());
    };
    for (key, value) in blob {
        match value.get("methods").and_then(|m| m.as_object()) {
            Some(methods) => {
                let class_id = ensure_class(db, key).await?;
                for (selector, def) in methods {
                    let (arg_names, body) = split_method_def(def);
                    upsert_method(db, class_id, selector, &arg_names, &body).await?;
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO base_environment (key, value) VALUES (?, ?) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key)
                .bind(value.to_string())
                .execute(db)
                .await?;
            }
        }
    }
    tracing::info!("seeded base image");
    Ok(())
}

/// Storage shape for a method definition JSON: primitive entries keep
/// the whole `{"primitive": tag}` object as the body.
fn split_method_def(def: &Value) -> (String, String) {
    if def.get("primitive").is_some() {
        return ("[]".to_string(), def.to_string());
    }
    let arg_names = def.get("argNames").cloned().unwrap_or_else(|| Value::Array(vec![]));
    let body = def.get("body").cloned().unwrap_or(Value::Null);
    (arg_names.to_string(), body.to_string())
}

async fn ensure_class(db: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    sqlx::query("INSERT INTO classes (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(db)
        .await?;
    let id: i64 = sqlx::query("SELECT id FROM classes WHERE name = ?")
        .bind(name)
        .fetch_one(db)
        .await?
        .get("id");
    Ok(id)
}

async fn upsert_method(
    db: &SqlitePool,
    class_id: i64,
    selector: &str,
    arg_names: &str,
    body: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO methods (class_id, selector, arg_names, body) VALUES (?, ?, ?, ?) \
         ON CONFLICT(class_id, selector) DO UPDATE SET arg_names = excluded.arg_names, body = excluded.body",
    )
    .bind(class_id)
    .bind(selector)
    .bind(arg_names)
    .bind(body)
    .execute(db)
    .await?;
    Ok(())
}

/// Recompose the blob the image loader consumes: raw rows plus a
/// `{"methods": ...}` object per class.
pub async fn base_environment(db: &SqlitePool) -> sqlx::Result<Map<String, Value>> {
    let mut blob = Map::new();

    let rows = sqlx::query("SELECT key, value FROM base_environment")
        .fetch_all(db)
        .await?;
    for row in rows {
        let key: String = row.get("key");
        let text: String = row.get("value");
        blob.insert(key, serde_json::from_str(&text).unwrap_or(Value::Null));
    }

    let classes = sqlx::query("SELECT id, name FROM classes ORDER BY name")
        .fetch_all(db)
        .await?;
    for class in classes {
        let id: i64 = class.get("id");
        let name: String = class.get("name");
        let rows = sqlx::query(
            "SELECT selector, arg_names, body FROM methods WHERE class_id = ? ORDER BY selector",
        )
        .bind(id)
        .fetch_all(db)
        .await?;
        let mut methods = Map::new();
        for row in rows {
            let selector: String = row.get("selector");
            methods.insert(selector, method_def(&row));
        }
        blob.insert(name, serde_json::json!({ "methods": methods }));
    }

    Ok(blob)
}

fn method_def(row: &SqliteRow) -> Value {
    let body: Value =
        serde_json::from_str(row.get::<String, _>("body").as_str()).unwrap_or(Value::Null);
    if body.as_object().is_some_and(|o| o.contains_key("primitive")) {
        return body;
    }
    let arg_names: Value =
        serde_json::from_str(row.get::<String, _>("arg_names").as_str())
            .unwrap_or_else(|_| Value::Array(vec![]));
    serde_json::json!({ "argNames": arg_names, "body": body })
}

pub async fn class_names(db: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM classes ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(rows.iter().map(|r| r.get("name")).collect())
}

pub async fn class_id(db: &SqlitePool, name: &str) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM classes WHERE name = ?")
        .bind(name)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn method_selectors(db: &SqlitePool, class_id: i64) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query("SELECT selector FROM methods WHERE class_id = ? ORDER BY selector")
        .bind(class_id)
        .fetch_all(db)
        .await?;
    Ok(rows.iter().map(|r| r.get("selector")).collect())
}

pub async fn find_method(
    db: &SqlitePool,
    class_name: &str,
    selector: &str,
) -> sqlx::Result<Option<MethodRecord>> {
    let row = sqlx::query(
        "SELECT m.selector, m.arg_names, m.body FROM methods m \
         JOIN classes c ON c.id = m.class_id \
         WHERE c.name = ? AND m.selector = ?",
    )
    .bind(class_name)
    .bind(selector)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|r| MethodRecord {
        selector: r.get("selector"),
        arguments: serde_json::from_str(r.get::<String, _>("arg_names").as_str())
            .unwrap_or_else(|_| Value::Array(vec![])),
        body: serde_json::from_str(r.get::<String, _>("body").as_str()).unwrap_or(Value::Null),
    }))
}

/// Insert-or-replace a method, creating its class on first use.
pub async fn save_method(
    db: &SqlitePool,
    class_name: &str,
    selector: &str,
    arguments: &[String],
    body: &Value,
) -> sqlx::Result<SaveOutcome> {
    let mut tx = db.begin().await?;

    sqlx::query("INSERT INTO classes (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(class_name)
        .execute(&mut *tx)
        .await?;
    let class_id: i64 = sqlx::query("SELECT id FROM classes WHERE name = ?")
        .bind(class_name)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

    let existing = sqlx::query("SELECT id FROM methods WHERE class_id = ? AND selector = ?")
        .bind(class_id)
        .bind(selector)
        .fetch_optional(&mut *tx)
        .await?;

    let arg_names = serde_json::to_string(arguments).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "INSERT INTO methods (class_id, selector, arg_names, body) VALUES (?, ?, ?, ?) \
         ON CONFLICT(class_id, selector) DO UPDATE SET arg_names = excluded.arg_names, body = excluded.body",
    )
    .bind(class_id)
    .bind(selector)
    .bind(&arg_names)
    .bind(body.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(if existing.is_some() {
        SaveOutcome::Updated
    } else {
        SaveOutcome::Created
    })
}
