//! Domain records and wire-boundary validation
//!
//! Wire records are validated here before any arithmetic happens. Numeric
//! fields are parse-or-reject: a record with a malformed quantity, price, or
//! amount is dropped (and counted), never summed as NaN. Records with a bad
//! date are kept for the totals but excluded from monthly bucketing.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::{WireExpense, WireFarmer, WireNumber, WireSale};
use crate::constants;
use crate::error::RecordError;

// =============================================================================
// Domain Types
// =============================================================================

/// A validated sale record
#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: String,
    pub farmer_id: String,
    pub crop: String,
    pub quantity_kg: f64,
    pub unit_price: f64,
    pub buyer_name: String,
    pub buyer_contact: String,
    pub date: Option<String>,
}

impl Sale {
    /// Revenue contribution of this sale
    pub fn revenue(&self) -> f64 {
        self.quantity_kg * self.unit_price
    }
}

/// A validated expense record
#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: String,
    pub farmer_id: String,
    /// None means a general (farm-wide) expense
    pub crop: Option<String>,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub description: String,
    pub date: Option<String>,
}

/// A validated farmer record
#[derive(Debug, Clone, Serialize)]
pub struct Farmer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub region: String,
    pub created_at: Option<String>,
}

/// Expense category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    Seeds,
    Fertilizers,
    Pesticides,
    Labor,
    Machinery,
    Irrigation,
    Transport,
    LandPreparation,
    Packaging,
    Other,
}

impl ExpenseCategory {
    /// Every category, in display order
    pub const ALL: [ExpenseCategory; 10] = [
        ExpenseCategory::Seeds,
        ExpenseCategory::Fertilizers,
        ExpenseCategory::Pesticides,
        ExpenseCategory::Labor,
        ExpenseCategory::Machinery,
        ExpenseCategory::Irrigation,
        ExpenseCategory::Transport,
        ExpenseCategory::LandPreparation,
        ExpenseCategory::Packaging,
        ExpenseCategory::Other,
    ];
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpenseCategory::Seeds => write!(f, "Seeds"),
            ExpenseCategory::Fertilizers => write!(f, "Fertilizers"),
            ExpenseCategory::Pesticides => write!(f, "Pesticides"),
            ExpenseCategory::Labor => write!(f, "Labor"),
            ExpenseCategory::Machinery => write!(f, "Machinery"),
            ExpenseCategory::Irrigation => write!(f, "Irrigation"),
            ExpenseCategory::Transport => write!(f, "Transport"),
            ExpenseCategory::LandPreparation => write!(f, "Land Preparation"),
            ExpenseCategory::Packaging => write!(f, "Packaging"),
            ExpenseCategory::Other => write!(f, "Other"),
        }
    }
}

/// Parse expense category from string
pub fn parse_category(s: &str) -> Result<ExpenseCategory, RecordError> {
    match s.trim().to_lowercase().as_str() {
        "seeds" => Ok(ExpenseCategory::Seeds),
        "fertilizers" | "fertilizer" => Ok(ExpenseCategory::Fertilizers),
        "pesticides" | "pesticide" => Ok(ExpenseCategory::Pesticides),
        "labor" | "labour" => Ok(ExpenseCategory::Labor),
        "machinery" => Ok(ExpenseCategory::Machinery),
        "irrigation" => Ok(ExpenseCategory::Irrigation),
        "transport" => Ok(ExpenseCategory::Transport),
        "landpreparation" | "land_preparation" | "land-preparation" | "land preparation" => {
            Ok(ExpenseCategory::LandPreparation)
        }
        "packaging" => Ok(ExpenseCategory::Packaging),
        "other" => Ok(ExpenseCategory::Other),
        _ => Err(RecordError::UnknownCategory(s.to_string())),
    }
}

// =============================================================================
// Local Expenses (recorded via CLI, off-platform costs)
// =============================================================================

/// Expense entry recorded locally rather than fetched from the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExpense {
    /// Database ID (None for new entries not yet saved)
    #[serde(skip)]
    pub id: Option<i64>,
    pub farmer_id: String,
    pub crop: Option<String>,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub description: String,
    pub date: String,
}

impl LocalExpense {
    /// View as an Expense for the aggregation pipeline
    pub fn to_expense(&self) -> Expense {
        Expense {
            id: self
                .id
                .map(|i| format!("local-{}", i))
                .unwrap_or_else(|| "local".to_string()),
            farmer_id: self.farmer_id.clone(),
            crop: self.crop.clone(),
            category: self.category,
            amount: self.amount,
            description: self.description.clone(),
            date: Some(self.date.clone()),
        }
    }
}

/// Load local expenses from a CSV file (for importing/migration)
pub fn load_from_csv(path: &Path) -> Result<Vec<LocalExpense>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut expenses = Vec::new();
    for result in rdr.deserialize() {
        let mut expense: LocalExpense = result?;
        expense.id = None; // CSV imports don't have IDs
        expenses.push(expense);
    }
    Ok(expenses)
}

/// Export local expenses to CSV (for backup)
pub fn export_to_csv(expenses: &[LocalExpense], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for expense in expenses {
        wtr.serialize(expense)?;
    }
    wtr.flush()?;
    Ok(())
}

// =============================================================================
// Wire Validation
// =============================================================================

/// A record that was dropped or repaired during validation
#[derive(Debug, Clone)]
pub struct RecordIssue {
    pub id: String,
    pub error: RecordError,
}

/// Outcome of validating one wire collection
#[derive(Debug)]
pub struct Validated<T> {
    pub records: Vec<T>,
    /// Records excluded entirely
    pub dropped: Vec<RecordIssue>,
    /// Records kept with a field defaulted
    pub repaired: Vec<RecordIssue>,
}

impl<T> Default for Validated<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: Vec::new(),
            repaired: Vec::new(),
        }
    }
}

/// Parse a tolerant wire number, rejecting non-finite and unparseable values
fn parse_number(field: &'static str, raw: &WireNumber) -> Result<f64, RecordError> {
    let value = match raw {
        WireNumber::Number(n) => *n,
        WireNumber::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            RecordError::MalformedNumber {
                field,
                value: s.clone(),
            }
        })?,
    };

    if !value.is_finite() {
        return Err(RecordError::MalformedNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Like parse_number, but also rejects negatives
fn parse_amount(field: &'static str, raw: &WireNumber) -> Result<f64, RecordError> {
    let value = parse_number(field, raw)?;
    if value < 0.0 {
        return Err(RecordError::NegativeNumber { field, value });
    }
    Ok(value)
}

/// Validate a date string, returning None (repair) when it does not parse
fn check_date(raw: Option<String>) -> Result<Option<String>, RecordError> {
    match raw {
        None => Ok(None),
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            // Backend timestamps may carry a time component; keep the day part
            let day = trimmed.get(..10).unwrap_or(trimmed);
            match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                Ok(_) => Ok(Some(day.to_string())),
                Err(_) => Err(RecordError::InvalidDate(s.clone())),
            }
        }
    }
}

/// Normalize an optional crop field: empty or whitespace means general
fn normalize_crop(crop: Option<String>) -> Option<String> {
    crop.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Validate the sales collection
pub fn validate_sales(wire: Vec<WireSale>) -> Validated<Sale> {
    let mut out = Validated::default();

    for raw in wire {
        let id = raw.id.clone().unwrap_or_default();

        let Some(farmer_ref) = raw.farmer_id else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("farmerId"),
            });
            continue;
        };
        let Some(crop) = normalize_crop(raw.crop) else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("cropType"),
            });
            continue;
        };
        let Some(quantity_raw) = raw.quantity else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("quantity"),
            });
            continue;
        };
        let Some(price_raw) = raw.unit_price else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("unitPrice"),
            });
            continue;
        };

        let quantity_kg = match parse_amount("quantity", &quantity_raw) {
            Ok(v) => v,
            Err(e) => {
                out.dropped.push(RecordIssue { id, error: e });
                continue;
            }
        };
        let unit_price = match parse_amount("unitPrice", &price_raw) {
            Ok(v) => v,
            Err(e) => {
                out.dropped.push(RecordIssue { id, error: e });
                continue;
            }
        };

        let date = match check_date(raw.date) {
            Ok(d) => d,
            Err(e) => {
                // Totals stay correct without a date; only monthly buckets lose it
                out.repaired.push(RecordIssue {
                    id: id.clone(),
                    error: e,
                });
                None
            }
        };

        out.records.push(Sale {
            id,
            farmer_id: farmer_ref.id().to_string(),
            crop,
            quantity_kg,
            unit_price,
            buyer_name: raw.buyer_name.unwrap_or_default(),
            buyer_contact: raw.buyer_contact.unwrap_or_default(),
            date,
        });
    }

    out
}

/// Validate the expenses collection
pub fn validate_expenses(wire: Vec<WireExpense>) -> Validated<Expense> {
    let mut out = Validated::default();

    for raw in wire {
        let id = raw.id.clone().unwrap_or_default();

        let Some(farmer_ref) = raw.farmer_id else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("farmerId"),
            });
            continue;
        };
        let Some(amount_raw) = raw.amount else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("amount"),
            });
            continue;
        };

        let amount = match parse_amount("amount", &amount_raw) {
            Ok(v) => v,
            Err(e) => {
                out.dropped.push(RecordIssue { id, error: e });
                continue;
            }
        };

        // An unrecognized category keeps the money under Other
        let category = match raw.category.as_deref() {
            None | Some("") => ExpenseCategory::Other,
            Some(s) => match parse_category(s) {
                Ok(c) => c,
                Err(e) => {
                    out.repaired.push(RecordIssue {
                        id: id.clone(),
                        error: e,
                    });
                    ExpenseCategory::Other
                }
            },
        };

        let date = match check_date(raw.date) {
            Ok(d) => d,
            Err(e) => {
                out.repaired.push(RecordIssue {
                    id: id.clone(),
                    error: e,
                });
                None
            }
        };

        out.records.push(Expense {
            id,
            farmer_id: farmer_ref.id().to_string(),
            crop: normalize_crop(raw.crop),
            category,
            amount,
            description: raw.description.unwrap_or_default(),
            date,
        });
    }

    out
}

/// Validate the farmers collection
pub fn validate_farmers(wire: Vec<WireFarmer>) -> Validated<Farmer> {
    let mut out = Validated::default();

    for raw in wire {
        let Some(id) = raw.id.filter(|i| !i.is_empty()) else {
            out.dropped.push(RecordIssue {
                id: String::new(),
                error: RecordError::MissingField("_id"),
            });
            continue;
        };
        let Some(name) = raw.name.filter(|n| !n.trim().is_empty()) else {
            out.dropped.push(RecordIssue {
                id,
                error: RecordError::MissingField("name"),
            });
            continue;
        };

        let region = raw
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| constants::UNKNOWN_REGION.to_string());

        out.records.push(Farmer {
            id,
            name,
            email: raw.email.unwrap_or_default(),
            region,
            created_at: raw.created_at,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FarmerRef;

    fn wire_sale(quantity: WireNumber, price: WireNumber) -> WireSale {
        WireSale {
            id: Some("s1".to_string()),
            farmer_id: Some(FarmerRef::Id("f1".to_string())),
            crop: Some("Nadu".to_string()),
            quantity: Some(quantity),
            unit_price: Some(price),
            buyer_name: None,
            buyer_contact: None,
            date: Some("2026-01-15".to_string()),
        }
    }

    #[test]
    fn test_string_numbers_are_coerced() {
        let validated = validate_sales(vec![wire_sale(
            WireNumber::Text(" 10 ".to_string()),
            WireNumber::Number(50.0),
        )]);

        assert_eq!(validated.records.len(), 1);
        assert!(validated.dropped.is_empty());
        assert_eq!(validated.records[0].revenue(), 500.0);
    }

    #[test]
    fn test_malformed_quantity_drops_record() {
        let validated = validate_sales(vec![wire_sale(
            WireNumber::Text("ten".to_string()),
            WireNumber::Number(50.0),
        )]);

        assert!(validated.records.is_empty());
        assert_eq!(validated.dropped.len(), 1);
        assert!(matches!(
            validated.dropped[0].error,
            RecordError::MalformedNumber { field: "quantity", .. }
        ));
    }

    #[test]
    fn test_negative_amount_drops_record() {
        let validated = validate_sales(vec![wire_sale(
            WireNumber::Number(10.0),
            WireNumber::Number(-5.0),
        )]);

        assert!(validated.records.is_empty());
        assert!(matches!(
            validated.dropped[0].error,
            RecordError::NegativeNumber { field: "unitPrice", .. }
        ));
    }

    #[test]
    fn test_bad_date_is_repaired_not_dropped() {
        let mut sale = wire_sale(WireNumber::Number(10.0), WireNumber::Number(50.0));
        sale.date = Some("first of June".to_string());

        let validated = validate_sales(vec![sale]);
        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.repaired.len(), 1);
        assert!(validated.records[0].date.is_none());
    }

    #[test]
    fn test_timestamp_dates_keep_day_part() {
        let mut sale = wire_sale(WireNumber::Number(1.0), WireNumber::Number(1.0));
        sale.date = Some("2026-03-04T10:30:00.000Z".to_string());

        let validated = validate_sales(vec![sale]);
        assert_eq!(validated.records[0].date.as_deref(), Some("2026-03-04"));
    }

    #[test]
    fn test_unknown_category_lands_in_other() {
        let wire = WireExpense {
            id: Some("e1".to_string()),
            farmer_id: Some(FarmerRef::Id("f1".to_string())),
            crop: Some("  ".to_string()),
            category: Some("Bribes".to_string()),
            amount: Some(WireNumber::Number(100.0)),
            description: None,
            date: Some("2026-01-01".to_string()),
        };

        let validated = validate_expenses(vec![wire]);
        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.records[0].category, ExpenseCategory::Other);
        assert!(validated.records[0].crop.is_none());
        assert_eq!(validated.repaired.len(), 1);
    }

    #[test]
    fn test_category_parse_variants() {
        assert_eq!(parse_category("labour").unwrap(), ExpenseCategory::Labor);
        assert_eq!(
            parse_category("land preparation").unwrap(),
            ExpenseCategory::LandPreparation
        );
        assert!(parse_category("fuel").is_err());
    }

    #[test]
    fn test_farmer_region_defaults_to_unknown() {
        let wire = WireFarmer {
            id: Some("f1".to_string()),
            name: Some("A. Perera".to_string()),
            email: None,
            region: None,
            created_at: None,
        };

        let validated = validate_farmers(vec![wire]);
        assert_eq!(validated.records[0].region, "Unknown");
    }
}
