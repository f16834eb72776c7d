//! Farmer and crop aggregation
//!
//! The reporting core: pure folds over validated Sales and Expenses, keyed
//! by farmer identity and by crop variety. Every pass recomputes from
//! scratch over an immutable in-memory snapshot; there is no incremental
//! path. Records referencing farmers or crops outside the snapshot are
//! skipped and counted, never summed.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::records::{Expense, Farmer, Sale};

/// Per-farmer aggregate, recomputed on every pass
#[derive(Debug, Clone, Serialize)]
pub struct FarmerPerformance {
    pub farmer_id: String,
    pub name: String,
    pub region: String,
    pub revenue: f64,
    pub expenses: f64,
    pub sale_count: u32,
    pub expense_count: u32,
    pub profit: f64,
    pub roi_percent: f64,
}

/// Per-crop aggregate, recomputed on every pass
#[derive(Debug, Clone, Serialize)]
pub struct CropProfit {
    pub crop: String,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub roi_percent: f64,
    /// Distinct farmers with sales or crop-tagged expenses for this variety
    pub farmer_count: usize,
}

/// Records skipped because they reference entities outside the snapshot
#[derive(Debug, Default, Clone)]
pub struct AggregationStats {
    pub unknown_farmer_sales: usize,
    pub unknown_farmer_expenses: usize,
    pub unknown_crop_sales: usize,
    pub unknown_crop_expenses: usize,
    /// General expense money with no revenue-bearing crop to land on
    pub undistributed_general: f64,
}

impl AggregationStats {
    pub fn has_skips(&self) -> bool {
        self.unknown_farmer_sales > 0
            || self.unknown_farmer_expenses > 0
            || self.unknown_crop_sales > 0
            || self.unknown_crop_expenses > 0
            || self.undistributed_general > 0.0
    }
}

/// Both aggregates plus the skip counters for one pass
#[derive(Debug)]
pub struct FarmReport {
    pub farmers: Vec<FarmerPerformance>,
    pub crops: Vec<CropProfit>,
    pub stats: AggregationStats,
}

/// Run the full aggregation pass
pub fn build_report(
    farmers: &[Farmer],
    varieties: &[String],
    sales: &[Sale],
    expenses: &[Expense],
) -> FarmReport {
    let mut stats = AggregationStats::default();
    let farmer_rows = farmer_performance(farmers, sales, expenses, &mut stats);
    let crop_rows = crop_profitability(varieties, sales, expenses, &mut stats);

    FarmReport {
        farmers: farmer_rows,
        crops: crop_rows,
        stats,
    }
}

/// ROI relative to money spent; exactly 0 when nothing was spent
fn roi_percent(profit: f64, expenses: f64) -> f64 {
    if expenses > 0.0 {
        profit / expenses * 100.0
    } else {
        0.0
    }
}

/// One FarmerPerformance per farmer, in the Farmers input order, including
/// farmers with no activity
pub fn farmer_performance(
    farmers: &[Farmer],
    sales: &[Sale],
    expenses: &[Expense],
    stats: &mut AggregationStats,
) -> Vec<FarmerPerformance> {
    let mut rows: Vec<FarmerPerformance> = farmers
        .iter()
        .map(|f| FarmerPerformance {
            farmer_id: f.id.clone(),
            name: f.name.clone(),
            region: f.region.clone(),
            revenue: 0.0,
            expenses: 0.0,
            sale_count: 0,
            expense_count: 0,
            profit: 0.0,
            roi_percent: 0.0,
        })
        .collect();

    let index: HashMap<&str, usize> = farmers
        .iter()
        .enumerate()
        .map(|(i, f)| (f.id.as_str(), i))
        .collect();

    for sale in sales {
        match index.get(sale.farmer_id.as_str()) {
            Some(&i) => {
                rows[i].revenue += sale.revenue();
                rows[i].sale_count += 1;
            }
            None => stats.unknown_farmer_sales += 1,
        }
    }

    for expense in expenses {
        match index.get(expense.farmer_id.as_str()) {
            Some(&i) => {
                rows[i].expenses += expense.amount;
                rows[i].expense_count += 1;
            }
            None => stats.unknown_farmer_expenses += 1,
        }
    }

    for row in &mut rows {
        row.profit = row.revenue - row.expenses;
        row.roi_percent = roi_percent(row.profit, row.expenses);
    }

    rows
}

/// Working accumulator for one crop variety
#[derive(Default)]
struct CropAcc {
    revenue: f64,
    expenses: f64,
    farmers: HashSet<String>,
}

/// One CropProfit per known variety, in variety order, including varieties
/// with no sales yet.
///
/// General expenses (no crop field) are split evenly across the varieties
/// holding positive revenue. The revenue-positive set is computed once,
/// after the full revenue pass, so the result does not depend on expense
/// order.
pub fn crop_profitability(
    varieties: &[String],
    sales: &[Sale],
    expenses: &[Expense],
    stats: &mut AggregationStats,
) -> Vec<CropProfit> {
    let mut accs: Vec<CropAcc> = varieties.iter().map(|_| CropAcc::default()).collect();

    let index: HashMap<&str, usize> = varieties
        .iter()
        .enumerate()
        .map(|(i, v)| (v.as_str(), i))
        .collect();

    // Phase 1: revenue
    for sale in sales {
        match index.get(sale.crop.as_str()) {
            Some(&i) => {
                accs[i].revenue += sale.revenue();
                accs[i].farmers.insert(sale.farmer_id.clone());
            }
            None => stats.unknown_crop_sales += 1,
        }
    }

    // Phase 2: expenses, against the now-fixed revenue-positive set
    let with_revenue: Vec<usize> = accs
        .iter()
        .enumerate()
        .filter(|(_, acc)| acc.revenue > 0.0)
        .map(|(i, _)| i)
        .collect();

    for expense in expenses {
        match &expense.crop {
            Some(crop) => match index.get(crop.as_str()) {
                Some(&i) => {
                    accs[i].expenses += expense.amount;
                    accs[i].farmers.insert(expense.farmer_id.clone());
                }
                None => stats.unknown_crop_expenses += 1,
            },
            None => {
                if with_revenue.is_empty() {
                    stats.undistributed_general += expense.amount;
                } else {
                    let share = expense.amount / with_revenue.len() as f64;
                    for &i in &with_revenue {
                        accs[i].expenses += share;
                    }
                }
            }
        }
    }

    varieties
        .iter()
        .zip(accs)
        .map(|(variety, acc)| {
            let profit = acc.revenue - acc.expenses;
            CropProfit {
                crop: variety.clone(),
                revenue: acc.revenue,
                profit,
                roi_percent: roi_percent(profit, acc.expenses),
                expenses: acc.expenses,
                farmer_count: acc.farmers.len(),
            }
        })
        .collect()
}

/// The farmer with the highest profit; first encountered wins on ties.
/// Empty input yields None.
pub fn top_performer(rows: &[FarmerPerformance]) -> Option<&FarmerPerformance> {
    let mut best: Option<&FarmerPerformance> = None;
    for row in rows {
        let better = match best {
            Some(current) => row.profit > current.profit,
            None => true,
        };
        if better {
            best = Some(row);
        }
    }
    best
}

/// Top N farmers by descending profit; equal profits keep input order
pub fn top_n(rows: &[FarmerPerformance], n: usize) -> Vec<FarmerPerformance> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.profit.total_cmp(&a.profit));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ExpenseCategory;

    fn farmer(id: &str, name: &str) -> Farmer {
        Farmer {
            id: id.to_string(),
            name: name.to_string(),
            email: String::new(),
            region: "Unknown".to_string(),
            created_at: None,
        }
    }

    fn sale(farmer_id: &str, crop: &str, quantity: f64, price: f64) -> Sale {
        Sale {
            id: format!("s-{}-{}", farmer_id, crop),
            farmer_id: farmer_id.to_string(),
            crop: crop.to_string(),
            quantity_kg: quantity,
            unit_price: price,
            buyer_name: String::new(),
            buyer_contact: String::new(),
            date: Some("2026-01-15".to_string()),
        }
    }

    fn expense(farmer_id: &str, crop: Option<&str>, amount: f64) -> Expense {
        Expense {
            id: format!("e-{}", farmer_id),
            farmer_id: farmer_id.to_string(),
            crop: crop.map(|c| c.to_string()),
            category: ExpenseCategory::Other,
            amount,
            description: String::new(),
            date: Some("2026-01-20".to_string()),
        }
    }

    fn varieties(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_worked_example() {
        // 10 kg at 50 with a 200 expense: revenue 500, profit 300, ROI 150%
        let farmers = vec![farmer("f1", "A")];
        let sales = vec![sale("f1", "Nadu", 10.0, 50.0)];
        let expenses = vec![expense("f1", Some("Nadu"), 200.0)];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &sales, &expenses, &mut stats);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, 500.0);
        assert_eq!(rows[0].expenses, 200.0);
        assert_eq!(rows[0].profit, 300.0);
        assert_eq!(rows[0].roi_percent, 150.0);
        assert_eq!(rows[0].sale_count, 1);
        assert_eq!(rows[0].expense_count, 1);
        assert!(!stats.has_skips());
    }

    #[test]
    fn test_revenue_and_expense_conservation() {
        let farmers = vec![farmer("f1", "A"), farmer("f2", "B")];
        let sales = vec![
            sale("f1", "Nadu", 10.0, 50.0),
            sale("f2", "Samba", 7.0, 80.0),
            sale("f1", "Samba", 3.0, 60.0),
        ];
        let expenses = vec![
            expense("f1", Some("Nadu"), 120.0),
            expense("f2", None, 90.0),
        ];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &sales, &expenses, &mut stats);

        let total_revenue: f64 = rows.iter().map(|r| r.revenue).sum();
        let total_expenses: f64 = rows.iter().map(|r| r.expenses).sum();
        let expected_revenue: f64 = sales.iter().map(|s| s.revenue()).sum();
        let expected_expenses: f64 = expenses.iter().map(|e| e.amount).sum();

        assert_eq!(total_revenue, expected_revenue);
        assert_eq!(total_expenses, expected_expenses);
        for row in &rows {
            assert_eq!(row.profit, row.revenue - row.expenses);
        }
    }

    #[test]
    fn test_zero_activity_farmer_has_zero_roi() {
        let farmers = vec![farmer("f1", "A")];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &[], &[], &mut stats);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].roi_percent, 0.0);
        assert!(rows[0].roi_percent.is_finite());
    }

    #[test]
    fn test_unknown_farmer_records_are_counted_not_summed() {
        let farmers = vec![farmer("f1", "A")];
        let sales = vec![sale("ghost", "Nadu", 10.0, 50.0)];
        let expenses = vec![expense("ghost", None, 75.0)];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &sales, &expenses, &mut stats);

        assert_eq!(rows[0].revenue, 0.0);
        assert_eq!(rows[0].expenses, 0.0);
        assert_eq!(stats.unknown_farmer_sales, 1);
        assert_eq!(stats.unknown_farmer_expenses, 1);
    }

    #[test]
    fn test_crop_revenue_attribution_is_total() {
        let vs = varieties(&["Nadu", "Samba", "Suwandel"]);
        let sales = vec![
            sale("f1", "Nadu", 10.0, 50.0),
            sale("f2", "Samba", 5.0, 100.0),
        ];

        let mut stats = AggregationStats::default();
        let rows = crop_profitability(&vs, &sales, &[], &mut stats);

        assert_eq!(rows.len(), 3);
        let total: f64 = rows.iter().map(|r| r.revenue).sum();
        assert_eq!(total, 1000.0);
        // Varieties with no sales still get a row
        assert_eq!(rows[2].crop, "Suwandel");
        assert_eq!(rows[2].revenue, 0.0);
    }

    #[test]
    fn test_general_expense_split_across_revenue_positive_crops() {
        let vs = varieties(&["Nadu", "Samba", "Suwandel"]);
        let sales = vec![
            sale("f1", "Nadu", 10.0, 50.0),
            sale("f2", "Samba", 5.0, 100.0),
        ];
        // 90 split across the two crops with revenue: 45 each, 0 to Suwandel
        let expenses = vec![expense("f1", None, 90.0)];

        let mut stats = AggregationStats::default();
        let rows = crop_profitability(&vs, &sales, &expenses, &mut stats);

        assert_eq!(rows[0].expenses, 45.0);
        assert_eq!(rows[1].expenses, 45.0);
        assert_eq!(rows[2].expenses, 0.0);
        assert_eq!(stats.undistributed_general, 0.0);
    }

    #[test]
    fn test_general_expense_with_no_revenue_goes_nowhere() {
        let vs = varieties(&["Nadu", "Samba"]);
        let expenses = vec![expense("f1", None, 90.0)];

        let mut stats = AggregationStats::default();
        let rows = crop_profitability(&vs, &[], &expenses, &mut stats);

        assert!(rows.iter().all(|r| r.expenses == 0.0));
        assert_eq!(stats.undistributed_general, 90.0);
    }

    #[test]
    fn test_crop_distinct_farmer_count() {
        let vs = varieties(&["Nadu"]);
        let sales = vec![
            sale("f1", "Nadu", 10.0, 50.0),
            sale("f1", "Nadu", 4.0, 55.0),
            sale("f2", "Nadu", 2.0, 48.0),
        ];
        let expenses = vec![expense("f3", Some("Nadu"), 30.0)];

        let mut stats = AggregationStats::default();
        let rows = crop_profitability(&vs, &sales, &expenses, &mut stats);

        assert_eq!(rows[0].farmer_count, 3);
    }

    #[test]
    fn test_top_performer_max_profit() {
        let rows = vec![
            FarmerPerformance {
                farmer_id: "1".to_string(),
                name: "A".to_string(),
                region: "X".to_string(),
                revenue: 100.0,
                expenses: 0.0,
                sale_count: 1,
                expense_count: 0,
                profit: 100.0,
                roi_percent: 0.0,
            },
            FarmerPerformance {
                farmer_id: "2".to_string(),
                name: "B".to_string(),
                region: "X".to_string(),
                revenue: 250.0,
                expenses: 0.0,
                sale_count: 1,
                expense_count: 0,
                profit: 250.0,
                roi_percent: 0.0,
            },
            FarmerPerformance {
                farmer_id: "3".to_string(),
                name: "C".to_string(),
                region: "X".to_string(),
                revenue: 0.0,
                expenses: 10.0,
                sale_count: 0,
                expense_count: 1,
                profit: -10.0,
                roi_percent: -100.0,
            },
        ];

        assert_eq!(top_performer(&rows).map(|r| r.farmer_id.as_str()), Some("2"));
    }

    #[test]
    fn test_top_performer_empty_is_none() {
        assert!(top_performer(&[]).is_none());
    }

    #[test]
    fn test_top_performer_tie_first_wins() {
        let farmers = vec![farmer("f1", "A"), farmer("f2", "B")];
        let sales = vec![
            sale("f1", "Nadu", 1.0, 100.0),
            sale("f2", "Nadu", 2.0, 50.0),
        ];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &sales, &[], &mut stats);

        assert_eq!(top_performer(&rows).map(|r| r.farmer_id.as_str()), Some("f1"));
    }

    #[test]
    fn test_top_n_descending_and_truncated() {
        let farmers = vec![farmer("f1", "A"), farmer("f2", "B"), farmer("f3", "C")];
        let sales = vec![
            sale("f1", "Nadu", 1.0, 10.0),
            sale("f2", "Nadu", 1.0, 30.0),
            sale("f3", "Nadu", 1.0, 20.0),
        ];

        let mut stats = AggregationStats::default();
        let rows = farmer_performance(&farmers, &sales, &[], &mut stats);
        let top = top_n(&rows, 2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].farmer_id, "f2");
        assert_eq!(top[1].farmer_id, "f3");
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let farmers = vec![farmer("f1", "A"), farmer("f2", "B")];
        let vs = varieties(&["Nadu", "Samba"]);
        let sales = vec![
            sale("f1", "Nadu", 10.0, 50.0),
            sale("f2", "Samba", 7.0, 80.0),
        ];
        let expenses = vec![
            expense("f1", Some("Nadu"), 120.0),
            expense("f2", None, 90.0),
        ];

        let first = build_report(&farmers, &vs, &sales, &expenses);
        let second = build_report(&farmers, &vs, &sales, &expenses);

        let encode = |report: &FarmReport| {
            serde_json::json!({
                "farmers": report.farmers,
                "crops": report.crops,
            })
            .to_string()
        };
        assert_eq!(encode(&first), encode(&second));
    }
}
