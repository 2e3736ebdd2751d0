// Transaction sources - where the engine's input comes from
//
// The engine only needs a deterministic list per call; it does not care if
// that list lives in memory, in a CSV export, or in SQLite (see db.rs).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

use crate::transaction::{CustomerId, Transaction};

pub trait TransactionSource: Send + Sync {
    fn find_all(&self) -> Result<Vec<Transaction>>;

    fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Transaction>>;
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Fixed list of transactions, used for demos and tests
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    transactions: Vec<Transaction>,
}

impl InMemorySource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        InMemorySource { transactions }
    }

    /// Demo dataset: four customers spread over 2024-2025
    pub fn sample() -> Self {
        let rows: [(CustomerId, f64, (i32, u32, u32)); 13] = [
            (1, 120.0, (2025, 4, 10)),
            (1, 60.0, (2025, 4, 1)),
            (1, 300.0, (2025, 4, 5)),
            (1, 80.0, (2025, 5, 15)),
            (1, 40.0, (2025, 6, 5)),
            (2, 30.0, (2024, 1, 12)),
            (2, 150.0, (2024, 2, 20)),
            (2, 60.0, (2024, 3, 25)),
            (3, 500.0, (2025, 3, 10)),
            (3, 620.0, (2025, 9, 3)),
            (4, 30.0, (2025, 10, 12)),
            (4, 150.0, (2025, 12, 20)),
            (4, 60.0, (2025, 11, 25)),
        ];

        let transactions = rows
            .iter()
            .filter_map(|&(customer_id, amount, (y, m, d))| {
                NaiveDate::from_ymd_opt(y, m, d).map(|date| Transaction::new(customer_id, amount, date))
            })
            .collect();

        InMemorySource { transactions }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionSource for InMemorySource {
    fn find_all(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }

    fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| tx.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// CSV LOADER
// ============================================================================

/// Raw CSV row; the date stays optional so a missing one can be reported
#[derive(Debug, Deserialize)]
struct CsvRecord {
    customer_id: CustomerId,
    amount: f64,
    date: Option<NaiveDate>,
}

/// Load `customer_id,amount,date` rows (dates as YYYY-MM-DD)
pub fn load_csv(csv_path: &Path) -> Result<Vec<Transaction>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut transactions = Vec::new();

    for (index, result) in rdr.deserialize().enumerate() {
        // header is line 1
        let line = index + 2;
        let record: CsvRecord =
            result.with_context(|| format!("Failed to deserialize transaction on line {line}"))?;

        let Some(date) = record.date else {
            bail!("Missing date on line {line} (customer {})", record.customer_id);
        };

        transactions.push(Transaction::new(record.customer_id, record.amount, date));
    }

    tracing::info!(count = transactions.len(), path = ?csv_path, "loaded transactions from CSV");
    Ok(transactions)
}
