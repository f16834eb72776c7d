//! Chart-ready series derivation
//!
//! The web dashboard renders bar/pie/line charts from plain label + value
//! arrays. Series are derived here and exported as chart_data.json; no
//! rendering happens in this tool.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::aggregate::{CropProfit, FarmerPerformance, top_n};
use crate::records::{Expense, Sale};

/// Labels plus parallel values, ready for a charting library
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// All series exported for the dashboard
#[derive(Debug, Serialize)]
pub struct ChartData {
    pub crop_revenue: ChartSeries,
    pub farmer_profit: ChartSeries,
    pub monthly_profit: ChartSeries,
}

/// Revenue per crop variety, in variety order (pie/bar)
pub fn crop_revenue_series(crops: &[CropProfit]) -> ChartSeries {
    ChartSeries {
        labels: crops.iter().map(|c| c.crop.clone()).collect(),
        values: crops.iter().map(|c| c.revenue).collect(),
    }
}

/// Profit of the top N farmers, descending (bar)
pub fn farmer_profit_series(rows: &[FarmerPerformance], n: usize) -> ChartSeries {
    let top = top_n(rows, n);
    ChartSeries {
        labels: top.iter().map(|r| r.name.clone()).collect(),
        values: top.iter().map(|r| r.profit).collect(),
    }
}

/// Net profit per month, ascending YYYY-MM (line).
/// Records without a usable date are excluded from the buckets.
pub fn monthly_profit_series(sales: &[Sale], expenses: &[Expense]) -> ChartSeries {
    let mut monthly: HashMap<String, f64> = HashMap::new();

    for sale in sales {
        if let Some(month) = month_of(sale.date.as_deref()) {
            *monthly.entry(month).or_insert(0.0) += sale.revenue();
        }
    }
    for expense in expenses {
        if let Some(month) = month_of(expense.date.as_deref()) {
            *monthly.entry(month).or_insert(0.0) -= expense.amount;
        }
    }

    let mut months: Vec<String> = monthly.keys().cloned().collect();
    months.sort();

    let values = months.iter().map(|m| monthly[m]).collect();
    ChartSeries {
        labels: months,
        values,
    }
}

/// Extract the YYYY-MM bucket from a validated date string
pub fn month_of(date: Option<&str>) -> Option<String> {
    let date = date?;
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(parsed.format("%Y-%m").to_string())
}
