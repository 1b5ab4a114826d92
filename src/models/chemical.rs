use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inventory item.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chemical {
    pub chemical_id: String,
    pub chemical_name: String,
    pub chemical_type: String,
    pub grade: String,
    pub phase: String,
    pub quantity_available: f64,
    pub unit: String,
    pub make: Option<String>,
    pub date_of_mfg: NaiveDate,
    pub date_of_exp: NaiveDate,
    pub rack: String,
    pub created_at: DateTime<Utc>,
}

/// A single stock issuance against an inventory item.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub chemical_id: String,
    pub chemical_name: String,
    pub quantity_used: f64,
    pub unit: String,
    pub used_at: DateTime<Utc>,
}

/// Outcome of an atomic stock deduction.
#[derive(Debug, Clone, PartialEq)]
pub enum StockDeduction {
    Issued { remaining: f64 },
    Insufficient { available: f64 },
    NotFound,
}

/// Formats a counter value into a chemical id, e.g. `CHEM-007`.
pub fn format_chemical_id(prefix: &str, seq: i64) -> String {
    format!("{}{:03}", prefix, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chemical_id_is_zero_padded() {
        assert_eq!(format_chemical_id("CHEM-", 7), "CHEM-007");
        assert_eq!(format_chemical_id("LAB/BRL-", 1234), "LAB/BRL-1234");
    }
}
