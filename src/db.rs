use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::source::TransactionSource;
use crate::transaction::{CustomerId, Transaction};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Hash used to make imports idempotent.
///
/// `occurrence` distinguishes identical purchases inside one batch (same
/// customer, amount and day), so they are all kept while a re-import of the
/// same batch is not.
pub fn compute_idempotency_hash(tx: &Transaction, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        tx.customer_id,
        tx.amount,
        tx.date.format(DATE_FORMAT),
        occurrence
    ));
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // date may be NULL in rows written by other tools; checked on read
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            customer_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            date TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customer ON transactions(customer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_date ON transactions(date)",
        [],
    )?;

    Ok(())
}

pub fn insert_transactions(conn: &Connection, transactions: &[Transaction]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;
    let mut seen: HashMap<(CustomerId, u64, NaiveDate), usize> = HashMap::new();

    for tx in transactions {
        let occurrence = seen
            .entry((tx.customer_id, tx.amount.to_bits(), tx.date))
            .and_modify(|n| *n += 1)
            .or_insert(0);
        let hash = compute_idempotency_hash(tx, *occurrence);

        let customer_id = i64::try_from(tx.customer_id)
            .with_context(|| format!("Customer id {} does not fit in SQLite", tx.customer_id))?;

        let result = conn.execute(
            "INSERT INTO transactions (idempotency_hash, customer_id, amount, date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                hash,
                customer_id,
                tx.amount,
                tx.date.format(DATE_FORMAT).to_string(),
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(inserted, duplicates, "imported transactions");

    Ok(inserted)
}

type RawRow = (i64, f64, Option<String>);

fn into_transaction((customer_id, amount, date): RawRow) -> Result<Transaction> {
    let customer_id = CustomerId::try_from(customer_id)
        .with_context(|| format!("Invalid customer id in database: {customer_id}"))?;

    let date = date.ok_or_else(|| anyhow!("Missing date for customer {customer_id}"))?;
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .with_context(|| format!("Invalid date {date:?} for customer {customer_id}"))?;

    Ok(Transaction::new(customer_id, amount, date))
}

pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT customer_id, amount, date
         FROM transactions
         ORDER BY customer_id, date",
    )?;

    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<RawRow>, _>>()?;

    rows.into_iter().map(into_transaction).collect()
}

pub fn get_transactions_for_customer(conn: &Connection, customer_id: CustomerId) -> Result<Vec<Transaction>> {
    let Ok(key) = i64::try_from(customer_id) else {
        // cannot have been stored
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(
        "SELECT customer_id, amount, date
         FROM transactions
         WHERE customer_id = ?1
         ORDER BY date",
    )?;

    let rows = stmt
        .query_map([key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<RawRow>, _>>()?;

    rows.into_iter().map(into_transaction).collect()
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// SQLITE SOURCE
// ============================================================================

/// SQLite-backed transaction source shared across requests
pub struct SqliteSource {
    conn: Mutex<Connection>,
}

impl SqliteSource {
    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteSource {
            conn: Mutex::new(conn),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
        SqliteSource::new(conn)
    }

    /// Idempotently import a batch, returning how many rows were new
    pub fn import(&self, transactions: &[Transaction]) -> Result<usize> {
        self.with_conn(|conn| insert_transactions(conn, transactions))
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(verify_count)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        f(&conn)
    }
}

impl TransactionSource for SqliteSource {
    fn find_all(&self) -> Result<Vec<Transaction>> {
        self.with_conn(get_all_transactions)
            .context("Failed to read transactions")
    }

    fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Transaction>> {
        self.with_conn(|conn| get_transactions_for_customer(conn, customer_id))
            .with_context(|| format!("Failed to read transactions for customer {customer_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_transaction(customer_id: CustomerId, amount: f64, date: &str) -> Transaction {
        Transaction::new(
            customer_id,
            amount,
            NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
        )
    }

    fn test_transactions() -> Vec<Transaction> {
        vec![
            create_test_transaction(1, 120.0, "2024-04-10"),
            create_test_transaction(1, 75.0, "2024-05-15"),
            create_test_transaction(2, 60.0, "2024-04-12"),
        ]
    }

    #[test]
    fn test_idempotency_import_twice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let transactions = test_transactions();

        let inserted1 = insert_transactions(&conn, &transactions).unwrap();
        let count1 = verify_count(&conn).unwrap();

        let inserted2 = insert_transactions(&conn, &transactions).unwrap();
        let count2 = verify_count(&conn).unwrap();

        assert_eq!(inserted1, 3, "First import should insert 3 transactions");
        assert_eq!(count1, 3);
        assert_eq!(
            inserted2, 0,
            "Second import should insert 0 transactions (all duplicates)"
        );
        assert_eq!(count2, 3, "Database should still have 3 transactions");
    }

    #[test]
    fn test_identical_purchases_in_one_batch_are_kept() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let transactions = vec![
            create_test_transaction(1, 60.0, "2024-04-12"),
            create_test_transaction(1, 60.0, "2024-04-12"),
        ];

        assert_eq!(insert_transactions(&conn, &transactions).unwrap(), 2);
        assert_eq!(insert_transactions(&conn, &transactions).unwrap(), 0);
        assert_eq!(verify_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_hash_is_stable() {
        let tx = create_test_transaction(1, 120.0, "2024-04-10");
        assert_eq!(compute_idempotency_hash(&tx, 0), compute_idempotency_hash(&tx, 0));
        assert_ne!(compute_idempotency_hash(&tx, 0), compute_idempotency_hash(&tx, 1));
        assert_eq!(compute_idempotency_hash(&tx, 0).len(), 64);
    }

    #[test]
    fn test_round_trip_through_database() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        insert_transactions(&conn, &test_transactions()).unwrap();

        let all = get_all_transactions(&conn).unwrap();
        assert_eq!(all, test_transactions());

        let customer = get_transactions_for_customer(&conn, 2).unwrap();
        assert_eq!(customer.len(), 1);
        assert_eq!(customer[0].amount, 60.0);

        assert!(get_transactions_for_customer(&conn, 99).unwrap().is_empty());
        assert!(get_transactions_for_customer(&conn, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_missing_date_rejected_on_read() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn.execute(
            "INSERT INTO transactions (idempotency_hash, customer_id, amount, date)
             VALUES ('x', 5, 120.0, NULL)",
            [],
        )
        .unwrap();

        let err = get_all_transactions(&conn).unwrap_err();
        assert!(err.to_string().contains("Missing date for customer 5"));
    }

    #[test]
    fn test_sqlite_source() {
        let conn = Connection::open_in_memory().unwrap();
        let source = SqliteSource::new(conn).unwrap();
        assert_eq!(source.import(&test_transactions()).unwrap(), 3);
        assert_eq!(source.import(&test_transactions()).unwrap(), 0);
        assert_eq!(source.count().unwrap(), 3);

        assert_eq!(source.find_all().unwrap().len(), 3);
        assert_eq!(source.find_by_customer(1).unwrap().len(), 2);
    }

    #[test]
    fn test_sqlite_source_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewards.db");

        {
            let source = SqliteSource::open(&path).unwrap();
            source.import(&test_transactions()).unwrap();
        }

        let reopened = SqliteSource::open(&path).unwrap();
        assert_eq!(reopened.find_all().unwrap(), test_transactions());
    }
}
