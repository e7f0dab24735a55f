//! Product repository: queries over the `products` table.
//!
//! Rows are raw string-typed mirrors of the table; conversion to the
//! domain [`crate::record::ClassificationRecord`] lives with the store
//! implementation.

use rusqlite::{params, params_from_iter, Row};

use super::{Database, DatabaseError};

/// A raw product row from the database.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: String,
    pub submitted_at: Option<String>,
    pub processed_at: Option<String>,
    pub explanation: Option<String>,
    pub is_food: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category: row.get("category")?,
            status: row.get("status")?,
            submitted_at: row.get("submitted_at")?,
            processed_at: row.get("processed_at")?,
            explanation: row.get("explanation")?,
            is_food: row.get("is_food")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new product row.
pub fn insert(db: &Database, product: &ProductRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO products (id, name, category, status, submitted_at, processed_at,
             explanation, is_food, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                product.id,
                product.name,
                product.category,
                product.status,
                product.submitted_at,
                product.processed_at,
                product.explanation,
                product.is_food,
                product.created_at,
                product.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Upserts a batch of product rows in one transaction. Existing rows keep
/// their `created_at`; everything else is overwritten.
pub fn upsert_all(db: &Database, products: &[ProductRow]) -> Result<(), DatabaseError> {
    if products.is_empty() {
        return Ok(());
    }

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        for product in products {
            tx.execute(
                "INSERT INTO products (id, name, category, status, submitted_at, processed_at,
                 explanation, is_food, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    status = excluded.status,
                    submitted_at = excluded.submitted_at,
                    processed_at = excluded.processed_at,
                    explanation = excluded.explanation,
                    is_food = excluded.is_food,
                    updated_at = excluded.updated_at",
                params![
                    product.id,
                    product.name,
                    product.category,
                    product.status,
                    product.submitted_at,
                    product.processed_at,
                    product.explanation,
                    product.is_food,
                    product.created_at,
                    product.updated_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
}

/// Finds a product by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ProductRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM products WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ProductRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds all products matching the given id set.
pub fn find_by_ids(db: &Database, ids: &[String]) -> Result<Vec<ProductRow>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT * FROM products WHERE id IN ({})", placeholders);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), ProductRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Products that have never been handed to the API and still need a
/// classification: no submission stamp, status `unknown` or `pending`.
pub fn find_unsubmitted(db: &Database) -> Result<Vec<ProductRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM products
             WHERE submitted_at IS NULL AND status IN ('unknown', 'pending')
             ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map([], ProductRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Products that were submitted and still await a verdict.
pub fn find_submitted_unprocessed(db: &Database) -> Result<Vec<ProductRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM products
             WHERE submitted_at IS NOT NULL AND processed_at IS NULL AND status = 'pending'
             ORDER BY submitted_at",
        )?;
        let rows = stmt
            .query_map([], ProductRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Clears the submission stamp on the given ids, making them eligible for
/// the submit cycle again. Status is left untouched. Returns the number of
/// rows changed.
pub fn clear_submitted_at(
    db: &Database,
    ids: &[String],
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    if ids.is_empty() {
        return Ok(0);
    }

    db.with_conn(|conn| {
        let placeholders = (2..=ids.len() + 1)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE products SET submitted_at = NULL, updated_at = ?1 WHERE id IN ({})",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut values: Vec<&dyn rusqlite::types::ToSql> = vec![&updated_at];
        for id in ids {
            values.push(id);
        }
        let changed = stmt.execute(&values[..])?;
        Ok(changed)
    })
}

/// Counts products with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM products WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
