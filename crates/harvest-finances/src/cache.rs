//! SQLite storage for API snapshots and locally-recorded expenses
//!
//! Fetched collections are replaced wholesale on every sync so a reporting
//! pass always sees one consistent snapshot. Local expenses are persistent
//! records, never touched by a sync.

use anyhow::{Context, Result};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;

use crate::records::{Expense, ExpenseCategory, Farmer, LocalExpense, Sale, parse_category};

/// Cache database wrapper
pub struct Cache {
    pool: SqlitePool,
}

/// Row type for sales query
#[derive(FromRow)]
struct SaleRow {
    id: String,
    farmer_id: String,
    crop: String,
    quantity_kg: f64,
    unit_price: f64,
    buyer_name: String,
    buyer_contact: String,
    date: Option<String>,
}

/// Row type for expenses query
#[derive(FromRow)]
struct ExpenseRow {
    id: String,
    farmer_id: String,
    crop: Option<String>,
    category: String,
    amount: f64,
    description: String,
    date: Option<String>,
}

/// Row type for farmers query
#[derive(FromRow)]
struct FarmerRow {
    id: String,
    name: String,
    email: String,
    region: String,
    created_at: Option<String>,
}

/// Row type for local expenses query
#[derive(FromRow)]
struct LocalExpenseRow {
    id: i64,
    farmer_id: String,
    crop: Option<String>,
    category: String,
    amount: f64,
    description: String,
    date: String,
}

impl Cache {
    /// Open or create the database
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SQLx requires the file to exist for SQLite
        if !path.exists() {
            std::fs::File::create(path)?;
        }

        let url = format!("sqlite:{}", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .context("Failed to open database")?;

        // WAL mode and a busy timeout prevent SQLITE_BUSY when another
        // process holds the file
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "
            -- Sales snapshot (replaced wholesale on sync)
            CREATE TABLE IF NOT EXISTS sales (
                id TEXT PRIMARY KEY,
                farmer_id TEXT NOT NULL,
                crop TEXT NOT NULL,
                quantity_kg REAL NOT NULL,
                unit_price REAL NOT NULL,
                buyer_name TEXT NOT NULL,
                buyer_contact TEXT NOT NULL,
                date TEXT,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Expenses snapshot (replaced wholesale on sync)
            CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                farmer_id TEXT NOT NULL,
                crop TEXT,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                date TEXT,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Farmers snapshot (replaced wholesale on sync)
            CREATE TABLE IF NOT EXISTS farmers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                region TEXT NOT NULL,
                created_at TEXT,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Locally recorded expenses (persistent, not part of the snapshot)
            CREATE TABLE IF NOT EXISTS local_expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                farmer_id TEXT NOT NULL,
                crop TEXT,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Cache metadata
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Sales Snapshot
    // =========================================================================

    /// Get the cached sales snapshot
    pub async fn get_sales(&self) -> Result<Vec<Sale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(
            "SELECT id, farmer_id, crop, quantity_kg, unit_price, buyer_name, buyer_contact, date
             FROM sales
             ORDER BY date, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Sale {
                id: r.id,
                farmer_id: r.farmer_id,
                crop: r.crop,
                quantity_kg: r.quantity_kg,
                unit_price: r.unit_price,
                buyer_name: r.buyer_name,
                buyer_contact: r.buyer_contact,
                date: r.date,
            })
            .collect())
    }

    /// Replace the sales snapshot (in a transaction for atomicity)
    pub async fn replace_sales(&self, sales: &[Sale]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sales").execute(&mut *tx).await?;

        for sale in sales {
            sqlx::query(
                "INSERT OR REPLACE INTO sales
                 (id, farmer_id, crop, quantity_kg, unit_price, buyer_name, buyer_contact, date)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sale.id)
            .bind(&sale.farmer_id)
            .bind(&sale.crop)
            .bind(sale.quantity_kg)
            .bind(sale.unit_price)
            .bind(&sale.buyer_name)
            .bind(&sale.buyer_contact)
            .bind(&sale.date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Expenses Snapshot
    // =========================================================================

    /// Get the cached expenses snapshot
    pub async fn get_expenses(&self) -> Result<Vec<Expense>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            "SELECT id, farmer_id, crop, category, amount, description, date
             FROM expenses
             ORDER BY date, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Expense {
                id: r.id,
                farmer_id: r.farmer_id,
                crop: r.crop,
                category: category_from_db(&r.category),
                amount: r.amount,
                description: r.description,
                date: r.date,
            })
            .collect())
    }

    /// Replace the expenses snapshot (in a transaction for atomicity)
    pub async fn replace_expenses(&self, expenses: &[Expense]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM expenses")
            .execute(&mut *tx)
            .await?;

        for expense in expenses {
            sqlx::query(
                "INSERT OR REPLACE INTO expenses
                 (id, farmer_id, crop, category, amount, description, date)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&expense.id)
            .bind(&expense.farmer_id)
            .bind(&expense.crop)
            .bind(expense.category.to_string())
            .bind(expense.amount)
            .bind(&expense.description)
            .bind(&expense.date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Farmers Snapshot
    // =========================================================================

    /// Get the cached farmers snapshot
    pub async fn get_farmers(&self) -> Result<Vec<Farmer>> {
        let rows: Vec<FarmerRow> = sqlx::query_as(
            "SELECT id, name, email, region, created_at
             FROM farmers
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Farmer {
                id: r.id,
                name: r.name,
                email: r.email,
                region: r.region,
                created_at: r.created_at,
            })
            .collect())
    }

    /// Replace the farmers snapshot (in a transaction for atomicity)
    pub async fn replace_farmers(&self, farmers: &[Farmer]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM farmers").execute(&mut *tx).await?;

        for farmer in farmers {
            sqlx::query(
                "INSERT OR REPLACE INTO farmers (id, name, email, region, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&farmer.id)
            .bind(&farmer.name)
            .bind(&farmer.email)
            .bind(&farmer.region)
            .bind(&farmer.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Local Expenses
    // =========================================================================

    /// Get all locally recorded expenses
    pub async fn get_local_expenses(&self) -> Result<Vec<LocalExpense>> {
        let rows: Vec<LocalExpenseRow> = sqlx::query_as(
            "SELECT id, farmer_id, crop, category, amount, description, date
             FROM local_expenses
             ORDER BY date, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LocalExpense {
                id: Some(r.id),
                farmer_id: r.farmer_id,
                crop: r.crop,
                category: category_from_db(&r.category),
                amount: r.amount,
                description: r.description,
                date: r.date,
            })
            .collect())
    }

    /// Add a new local expense, returns the ID
    pub async fn add_local_expense(&self, expense: &LocalExpense) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO local_expenses (farmer_id, crop, category, amount, description, date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&expense.farmer_id)
        .bind(&expense.crop)
        .bind(expense.category.to_string())
        .bind(expense.amount)
        .bind(&expense.description)
        .bind(&expense.date)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Delete a local expense by ID
    pub async fn delete_local_expense(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM local_expenses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Import multiple local expenses (for bulk import from CSV)
    pub async fn import_local_expenses(&self, expenses: &[LocalExpense]) -> Result<usize> {
        let mut count = 0;
        for expense in expenses {
            self.add_local_expense(expense).await?;
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Get metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        let sales: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        let expenses: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses")
            .fetch_one(&self.pool)
            .await?;
        let farmers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM farmers")
            .fetch_one(&self.pool)
            .await?;
        let local_expenses: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM local_expenses")
            .fetch_one(&self.pool)
            .await?;

        Ok(CacheStats {
            sales: sales.0 as u64,
            expenses: expenses.0 as u64,
            farmers: farmers.0 as u64,
            local_expenses: local_expenses.0 as u64,
        })
    }
}

/// Parse a stored category string, defaulting to Other
fn category_from_db(s: &str) -> ExpenseCategory {
    parse_category(s).unwrap_or(ExpenseCategory::Other)
}

/// Cache statistics
#[derive(Debug)]
pub struct CacheStats {
    pub sales: u64,
    pub expenses: u64,
    pub farmers: u64,
    pub local_expenses: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sales, {} expenses, {} farmers, {} local expenses",
            self.sales, self.expenses, self.farmers, self.local_expenses
        )
    }
}
