//! Report generation (CSV ledgers, chart data, and console summary)

use anyhow::Result;
use csv::Writer;
use std::collections::HashMap;
use std::path::Path;

use crate::aggregate::{AggregationStats, CropProfit, FarmerPerformance, top_n, top_performer};
use crate::charts;
use crate::config::Config;
use crate::constants;
use crate::records::{Expense, ExpenseCategory, Sale};

/// Bundled report data to reduce function argument counts
pub struct ReportData<'a> {
    pub farmers: &'a [FarmerPerformance],
    pub crops: &'a [CropProfit],
    pub sales: &'a [Sale],
    pub expenses: &'a [Expense],
    pub stats: &'a AggregationStats,
    pub config: &'a Config,
}

/// Generate all report files
pub fn generate_all_reports(output_dir: &Path, data: &ReportData) -> Result<()> {
    generate_farmer_ledger(output_dir, data.farmers)?;
    generate_crop_ledger(output_dir, data.crops)?;
    generate_summary(output_dir, data.sales, data.expenses)?;
    generate_chart_data(output_dir, data)?;

    Ok(())
}

/// Generate farmer_performance.csv
fn generate_farmer_ledger(output_dir: &Path, farmers: &[FarmerPerformance]) -> Result<()> {
    let path = output_dir.join(constants::FARMER_PERFORMANCE_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    // Header
    wtr.write_record([
        "Farmer_ID",
        "Name",
        "Region",
        "Revenue",
        "Expenses",
        "Profit",
        "ROI_Percent",
        "Sales",
        "Expense_Entries",
    ])?;

    for row in farmers {
        wtr.write_record([
            row.farmer_id.as_str(),
            row.name.as_str(),
            row.region.as_str(),
            &format!("{:.2}", row.revenue),
            &format!("{:.2}", row.expenses),
            &format!("{:.2}", row.profit),
            &format!("{:.2}", row.roi_percent),
            &row.sale_count.to_string(),
            &row.expense_count.to_string(),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate crop_profitability.csv
fn generate_crop_ledger(output_dir: &Path, crops: &[CropProfit]) -> Result<()> {
    let path = output_dir.join(constants::CROP_PROFITABILITY_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    // Header
    wtr.write_record([
        "Crop",
        "Revenue",
        "Expenses",
        "Profit",
        "ROI_Percent",
        "Farmers",
    ])?;

    for row in crops {
        wtr.write_record([
            row.crop.as_str(),
            &format!("{:.2}", row.revenue),
            &format!("{:.2}", row.expenses),
            &format!("{:.2}", row.profit),
            &format!("{:.2}", row.roi_percent),
            &row.farmer_count.to_string(),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

#[derive(Default)]
struct MonthlyData {
    revenue: f64,
    expenses: f64,
}

/// Generate summary.csv (monthly P&L with annual summaries)
fn generate_summary(output_dir: &Path, sales: &[Sale], expenses: &[Expense]) -> Result<()> {
    let path = output_dir.join(constants::SUMMARY_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    // Aggregate by month; records without a usable date are left out
    let mut monthly: HashMap<String, MonthlyData> = HashMap::new();

    for sale in sales {
        if let Some(month) = charts::month_of(sale.date.as_deref()) {
            let entry = monthly.entry(month).or_default();
            entry.revenue += sale.revenue();
        }
    }

    for expense in expenses {
        if let Some(month) = charts::month_of(expense.date.as_deref()) {
            let entry = monthly.entry(month).or_default();
            entry.expenses += expense.amount;
        }
    }

    // Header
    wtr.write_record([
        "Month",
        "Revenue",
        "Expenses",
        "Net_Profit",
        "YTD_Profit",
    ])?;

    let mut months: Vec<_> = monthly.keys().cloned().collect();
    months.sort();

    // Track annual totals for summary rows
    let mut annual_totals: HashMap<String, MonthlyData> = HashMap::new();
    let mut ytd = 0.0;
    let mut current_year: Option<String> = None;

    for month in &months {
        let year = &month[..4];
        let data = &monthly[month];
        let net_profit = data.revenue - data.expenses;

        // Reset YTD at year boundary
        if current_year.as_deref() != Some(year) {
            current_year = Some(year.to_string());
            ytd = 0.0;
        }
        ytd += net_profit;

        // Accumulate annual totals
        let annual = annual_totals.entry(year.to_string()).or_default();
        annual.revenue += data.revenue;
        annual.expenses += data.expenses;

        wtr.write_record([
            month,
            &format!("{:.2}", data.revenue),
            &format!("{:.2}", data.expenses),
            &format!("{:.2}", net_profit),
            &format!("{:.2}", ytd),
        ])?;
    }

    // Write annual summary rows
    let mut years: Vec<_> = annual_totals.keys().cloned().collect();
    years.sort();

    for year in &years {
        let data = &annual_totals[year];
        let net_profit = data.revenue - data.expenses;

        wtr.write_record([
            &format!("{} TOTAL", year),
            &format!("{:.2}", data.revenue),
            &format!("{:.2}", data.expenses),
            &format!("{:.2}", net_profit),
            "", // No YTD for annual rows
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate chart_data.json for the web dashboard
fn generate_chart_data(output_dir: &Path, data: &ReportData) -> Result<()> {
    let path = output_dir.join(constants::CHART_DATA_FILENAME);

    let chart_data = charts::ChartData {
        crop_revenue: charts::crop_revenue_series(data.crops),
        farmer_profit: charts::farmer_profit_series(data.farmers, constants::PDF_TOP_N),
        monthly_profit: charts::monthly_profit_series(data.sales, data.expenses),
    };

    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, &chart_data)?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Normalize -0.0 to 0.0 for cleaner display
fn normalize_zero(val: f64) -> f64 {
    if val == 0.0 { 0.0 } else { val }
}

/// Print summary to console
pub fn print_summary(data: &ReportData, year_filter: Option<i32>) {
    let money = |v: f64| data.config.money(normalize_zero(v));

    println!("\n============================================================");
    if let Some(year) = year_filter {
        println!("                FINANCIAL SUMMARY ({})", year);
    } else {
        println!("                    FINANCIAL SUMMARY");
    }
    println!("============================================================\n");

    let total_revenue: f64 = data.sales.iter().map(|s| s.revenue()).sum();
    let total_expenses: f64 = data.expenses.iter().map(|e| e.amount).sum();
    let net_profit = total_revenue - total_expenses;

    println!("REVENUE:");
    println!(
        "  {} sales across {} farmers",
        data.sales.len(),
        data.farmers.iter().filter(|f| f.sale_count > 0).count()
    );
    println!("  Total Revenue:      {:>16}", money(total_revenue));

    println!("\nEXPENSES:");
    for category in ExpenseCategory::ALL {
        let amount: f64 = data
            .expenses
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.amount)
            .sum();
        if amount > 0.0 {
            println!("  {:<18}  {:>16}", category.to_string() + ":", money(amount));
        }
    }
    println!("  ─────────────────────────────────────────────");
    println!("  Total Expenses:     {:>16}", money(total_expenses));

    println!("\nPROFIT/LOSS:");
    println!("  Net Profit:         {:>16}", money(net_profit));

    println!("\nCROPS:");
    for crop in data.crops {
        if crop.revenue > 0.0 || crop.expenses > 0.0 {
            println!(
                "  {:<14} revenue {:>14}  profit {:>14}  ({} farmers)",
                crop.crop,
                money(crop.revenue),
                money(crop.profit),
                crop.farmer_count
            );
        }
    }

    println!("\nTOP PERFORMERS:");
    match top_performer(data.farmers) {
        Some(best) => {
            println!("  Best: {} ({})", best.name, best.region);
            for (rank, row) in top_n(data.farmers, constants::CONSOLE_TOP_N)
                .iter()
                .enumerate()
            {
                println!(
                    "  {}. {:<20} profit {:>14}  ROI {:>7.1}%",
                    rank + 1,
                    row.name,
                    money(row.profit),
                    row.roi_percent
                );
            }
        }
        None => println!("  (no farmers in snapshot)"),
    }

    if data.stats.has_skips() {
        println!("\nSKIPPED RECORDS:");
        if data.stats.unknown_farmer_sales > 0 {
            println!(
                "  {} sales referencing unknown farmers",
                data.stats.unknown_farmer_sales
            );
        }
        if data.stats.unknown_farmer_expenses > 0 {
            println!(
                "  {} expenses referencing unknown farmers",
                data.stats.unknown_farmer_expenses
            );
        }
        if data.stats.unknown_crop_sales > 0 {
            println!(
                "  {} sales for crops outside the configured varieties",
                data.stats.unknown_crop_sales
            );
        }
        if data.stats.unknown_crop_expenses > 0 {
            println!(
                "  {} expenses for crops outside the configured varieties",
                data.stats.unknown_crop_expenses
            );
        }
        if data.stats.undistributed_general > 0.0 {
            println!(
                "  {} of general expenses had no revenue-bearing crop",
                money(data.stats.undistributed_general)
            );
        }
    }

    println!("============================================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_report;
    use crate::records::{Farmer, Sale};

    fn farmer(id: &str) -> Farmer {
        Farmer {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: String::new(),
            region: "Unknown".to_string(),
            created_at: None,
        }
    }

    fn sale(date: &str, quantity: f64, price: f64) -> Sale {
        Sale {
            id: "s".to_string(),
            farmer_id: "f1".to_string(),
            crop: "Nadu".to_string(),
            quantity_kg: quantity,
            unit_price: price,
            buyer_name: String::new(),
            buyer_contact: String::new(),
            date: Some(date.to_string()),
        }
    }

    #[test]
    fn test_csv_reports_written() {
        let dir = std::env::temp_dir().join("harvest-finances-report-test");
        std::fs::create_dir_all(&dir).unwrap();

        let farmers = vec![farmer("f1")];
        let varieties = vec!["Nadu".to_string()];
        let sales = vec![sale("2026-01-15", 10.0, 50.0), sale("2026-02-02", 4.0, 55.0)];
        let report = build_report(&farmers, &varieties, &sales, &[]);

        let file_config: crate::config::FileConfig = toml::from_str(
            r#"
            [api]
            base_url = "http://localhost"
            "#,
        )
        .unwrap();
        let config = crate::config::Config::from_file(&file_config, None);

        let data = ReportData {
            farmers: &report.farmers,
            crops: &report.crops,
            sales: &sales,
            expenses: &[],
            stats: &report.stats,
            config: &config,
        };

        generate_all_reports(&dir, &data).unwrap();

        let summary =
            std::fs::read_to_string(dir.join(constants::SUMMARY_FILENAME)).unwrap();
        assert!(summary.contains("2026-01,500.00,0.00,500.00,500.00"));
        assert!(summary.contains("2026-02,220.00,0.00,220.00,720.00"));
        assert!(summary.contains("2026 TOTAL,720.00,0.00,720.00,"));

        let ledger =
            std::fs::read_to_string(dir.join(constants::FARMER_PERFORMANCE_FILENAME)).unwrap();
        assert!(ledger.contains("f1,F1,Unknown,720.00,0.00,720.00,0.00,2,0"));
    }
}
