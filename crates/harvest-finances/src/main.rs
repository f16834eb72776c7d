//! HarvestEase farm finance reporter
//!
//! Pulls the cooperative's sales, expense, and farmer records from the
//! HarvestEase backend, aggregates them per farmer and per crop, and
//! generates the CSV ledgers, chart data, and PDF report.

mod aggregate;
mod api;
mod cache;
mod charts;
mod config;
mod constants;
mod error;
mod pdf;
mod records;
mod reports;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabled::{Table, Tabled};

use api::HarvestClient;
use cache::Cache;
use config::FileConfig;
use records::{Expense, Farmer, LocalExpense, Sale, Validated};

/// Default config file path
const CONFIG_FILE: &str = "config.toml";

/// Load config file or exit with helpful message
fn load_config_file() -> Result<FileConfig> {
    let path = std::path::Path::new(CONFIG_FILE);

    if !path.exists() {
        anyhow::bail!(
            "Config file '{}' not found.\n\n\
            To get started:\n\
            1. Copy config.toml.example to config.toml\n\
            2. Fill in the backend URL and API token\n\n\
            See config.toml.example for the required format.",
            CONFIG_FILE
        );
    }

    FileConfig::load(path)
}

#[derive(Parser, Debug)]
#[command(name = "harvest-finances")]
#[command(about = "Financial reporting for the HarvestEase farm cooperative")]
struct Args {
    /// Data directory for the local database
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Output directory for generated reports
    #[arg(short, long, default_value = "./output", global = true)]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,

    /// Filter reports to a specific year (e.g., 2026)
    #[arg(long)]
    year: Option<i32>,

    /// Filter reports to a single crop variety
    #[arg(long)]
    crop: Option<String>,

    /// Backend API URL (overrides config.toml)
    #[arg(long)]
    api_url: Option<String>,

    /// Use the cached snapshot without contacting the backend
    #[arg(long)]
    offline: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage locally recorded expenses
    Expense {
        #[command(subcommand)]
        action: ExpenseCommand,
    },

    /// Pull the latest records from the backend into the local snapshot
    Sync,

    /// Inspect cached farmer records
    Farmer {
        #[command(subcommand)]
        action: FarmerCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// List all locally recorded expenses
    List,

    /// Add a new local expense
    Add {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Farmer ID the expense belongs to
        #[arg(long)]
        farmer_id: String,

        /// Crop variety (omit for a general farm expense)
        #[arg(long)]
        crop: Option<String>,

        /// Category: Seeds, Fertilizers, Pesticides, Labor, Machinery,
        /// Irrigation, Transport, LandPreparation, Packaging, Other
        #[arg(long)]
        category: String,

        /// Description
        #[arg(long)]
        description: String,

        /// Amount
        #[arg(long)]
        amount: f64,
    },

    /// Delete a local expense by ID
    Delete {
        /// Expense ID to delete
        id: i64,
    },

    /// Import local expenses from CSV file
    Import {
        /// Path to CSV file
        file: PathBuf,
    },

    /// Export local expenses to CSV file
    Export {
        /// Path to output CSV file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum FarmerCommand {
    /// List farmers in the cached snapshot
    List,
}

/// Row shape for the farmer list table
#[derive(Tabled)]
struct FarmerListRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Email")]
    email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Create directories
    std::fs::create_dir_all(&args.data_dir)?;
    std::fs::create_dir_all(&args.output_dir)?;

    // Open the local database (in data directory)
    let cache_path = args.data_dir.join(constants::CACHE_FILENAME);
    let cache = Cache::open(&cache_path).await?;

    // Handle subcommands
    if let Some(command) = args.command.take() {
        return handle_command(command, &cache, &args).await;
    }

    // No subcommand - run the main report generation
    run_report_generation(args, cache).await
}

/// Handle subcommands
async fn handle_command(command: Command, cache: &Cache, args: &Args) -> Result<()> {
    match command {
        Command::Expense { action } => handle_expense_command(action, cache).await,
        Command::Sync => handle_sync_command(cache, args).await,
        Command::Farmer { action } => handle_farmer_command(action, cache).await,
    }
}

/// Handle expense subcommands
async fn handle_expense_command(action: ExpenseCommand, cache: &Cache) -> Result<()> {
    match action {
        ExpenseCommand::List => {
            let expenses = cache.get_local_expenses().await?;
            if expenses.is_empty() {
                println!("No local expenses recorded.");
                println!("\nUse 'harvest-finances expense add' to add expenses");
                println!("Or 'harvest-finances expense import <file.csv>' to import from CSV");
            } else {
                println!(
                    "{:<4} {:<12} {:<10} {:<12} {:<16} {:>10}  Description",
                    "ID", "Date", "Farmer", "Crop", "Category", "Amount"
                );
                println!("{}", "-".repeat(90));

                let mut total = 0.0;
                for expense in &expenses {
                    let id = expense.id.map(|i| i.to_string()).unwrap_or_default();
                    println!(
                        "{:<4} {:<12} {:<10} {:<12} {:<16} {:>10.2}  {}",
                        id,
                        expense.date,
                        truncate(&expense.farmer_id, 9),
                        expense.crop.as_deref().unwrap_or("(general)"),
                        expense.category,
                        expense.amount,
                        truncate(&expense.description, 30),
                    );
                    total += expense.amount;
                }
                println!("{}", "-".repeat(90));
                println!("{:>58} {:>10.2}", "Total:", total);
                println!("\n{} expense(s)", expenses.len());
            }
            Ok(())
        }

        ExpenseCommand::Add {
            date,
            farmer_id,
            crop,
            category,
            description,
            amount,
        } => {
            if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
                anyhow::bail!("Invalid date '{}'. Use YYYY-MM-DD", date);
            }
            if amount < 0.0 {
                anyhow::bail!("Amount must not be negative");
            }
            let category = records::parse_category(&category).map_err(|_| {
                anyhow::anyhow!(
                    "Invalid category '{}'. Use: Seeds, Fertilizers, Pesticides, Labor, \
                     Machinery, Irrigation, Transport, LandPreparation, Packaging, Other",
                    category
                )
            })?;

            let expense = LocalExpense {
                id: None,
                farmer_id,
                crop,
                category,
                amount,
                description,
                date,
            };

            let id = cache.add_local_expense(&expense).await?;
            println!(
                "Added expense #{}: {} - {:.2}",
                id, expense.category, expense.amount
            );
            Ok(())
        }

        ExpenseCommand::Delete { id } => {
            if cache.delete_local_expense(id).await? {
                println!("Deleted expense #{}", id);
            } else {
                println!("Expense #{} not found", id);
            }
            Ok(())
        }

        ExpenseCommand::Import { file } => {
            let expenses = records::load_from_csv(&file)?;
            let count = cache.import_local_expenses(&expenses).await?;
            println!("Imported {} expenses from {}", count, file.display());
            Ok(())
        }

        ExpenseCommand::Export { file } => {
            let expenses = cache.get_local_expenses().await?;
            records::export_to_csv(&expenses, &file)?;
            println!("Exported {} expenses to {}", expenses.len(), file.display());
            Ok(())
        }
    }
}

/// Handle farmer subcommands
async fn handle_farmer_command(action: FarmerCommand, cache: &Cache) -> Result<()> {
    match action {
        FarmerCommand::List => {
            let farmers = cache.get_farmers().await?;
            if farmers.is_empty() {
                println!("No farmers in the snapshot.");
                println!("\nUse 'harvest-finances sync' to pull records from the backend");
            } else {
                let rows: Vec<FarmerListRow> = farmers
                    .iter()
                    .map(|f| FarmerListRow {
                        id: f.id.clone(),
                        name: f.name.clone(),
                        region: f.region.clone(),
                        email: f.email.clone(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
                println!("\n{} farmer(s)", farmers.len());
            }
            Ok(())
        }
    }
}

/// Handle the sync subcommand
async fn handle_sync_command(cache: &Cache, args: &Args) -> Result<()> {
    let file_config = load_config_file()?;
    let config = config::Config::from_file(&file_config, args.api_url.clone());
    let client = HarvestClient::new(&config)?;

    println!("Syncing from {}", config.api_base_url);
    println!("=====================\n");

    let (sales, expenses, farmers) = sync_snapshot(cache, &client, args.verbose).await?;

    println!(
        "\nSnapshot updated: {} sales, {} expenses, {} farmers",
        sales.len(),
        expenses.len(),
        farmers.len()
    );
    Ok(())
}

/// Fetch all three collections, validate, and replace the cached snapshot
async fn sync_snapshot(
    cache: &Cache,
    client: &HarvestClient,
    verbose: bool,
) -> Result<(Vec<Sale>, Vec<Expense>, Vec<Farmer>)> {
    println!("Fetching farmers...");
    let farmers = records::validate_farmers(client.fetch_farmers().await?);
    report_issues("farmers", &farmers, verbose);
    println!("  {} farmers", farmers.records.len());

    println!("Fetching sales...");
    let sales = records::validate_sales(client.fetch_sales().await?);
    report_issues("sales", &sales, verbose);
    println!("  {} sales", sales.records.len());

    println!("Fetching expenses...");
    let expenses = records::validate_expenses(client.fetch_expenses().await?);
    report_issues("expenses", &expenses, verbose);
    println!("  {} expenses", expenses.records.len());

    cache.replace_farmers(&farmers.records).await?;
    cache.replace_sales(&sales.records).await?;
    cache.replace_expenses(&expenses.records).await?;
    cache
        .set_metadata("last_synced", &Utc::now().to_rfc3339())
        .await?;

    Ok((sales.records, expenses.records, farmers.records))
}

/// Print validation warnings for one collection
fn report_issues<T>(label: &str, validated: &Validated<T>, verbose: bool) {
    if !validated.dropped.is_empty() {
        eprintln!(
            "  Warning: dropped {} malformed {} record(s)",
            validated.dropped.len(),
            label
        );
        if verbose {
            for issue in &validated.dropped {
                eprintln!("    [{}] {}", issue.id, issue.error);
            }
        }
    }
    if !validated.repaired.is_empty() {
        eprintln!(
            "  Warning: repaired {} {} record(s) with invalid fields",
            validated.repaired.len(),
            label
        );
        if verbose {
            for issue in &validated.repaired {
                eprintln!("    [{}] {}", issue.id, issue.error);
            }
        }
    }
}

/// Truncate string for display
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

/// Run the main report generation workflow
async fn run_report_generation(args: Args, cache: Cache) -> Result<()> {
    println!("HarvestEase Farm Finance Reporter");
    println!("=============================================\n");

    // Load config file and initialize runtime configuration
    let file_config = load_config_file()?;
    let config = config::Config::from_file(&file_config, args.api_url.clone());
    println!("Backend: {}", config.api_base_url);
    println!("Cooperative: {}\n", config.farm_name);

    // Show snapshot stats
    let stats = cache.stats().await?;
    if stats.sales > 0 || stats.expenses > 0 || stats.farmers > 0 {
        println!("Snapshot: {}", stats);
        if let Some(last_synced) = cache.get_metadata("last_synced").await? {
            println!("Last synced: {}\n", last_synced);
        } else {
            println!();
        }
    }

    // Step 1: Load the record snapshot
    println!("Loading records...");
    let (mut sales, mut expenses, farmers) = if args.offline {
        println!("  (offline: using cached snapshot)");
        (
            cache.get_sales().await?,
            cache.get_expenses().await?,
            cache.get_farmers().await?,
        )
    } else {
        let client = HarvestClient::new(&config)?;
        match sync_snapshot(&cache, &client, args.verbose).await {
            Ok(collections) => collections,
            Err(e) => {
                eprintln!("  Warning: sync failed: {}", e);
                eprintln!("  Falling back to cached snapshot");
                (
                    cache.get_sales().await?,
                    cache.get_expenses().await?,
                    cache.get_farmers().await?,
                )
            }
        }
    };
    println!(
        "  Loaded {} sales, {} expenses, {} farmers\n",
        sales.len(),
        expenses.len(),
        farmers.len()
    );

    // Step 2: Merge locally recorded expenses
    let local = cache.get_local_expenses().await?;
    if !local.is_empty() {
        println!("Merging {} local expense(s)\n", local.len());
        expenses.extend(local.iter().map(|e| e.to_expense()));
    }

    // Step 3: Apply filters; the whole pipeline re-runs on the filtered set
    if let Some(year) = args.year {
        let prefix = format!("{}-", year);
        sales.retain(|s| s.date.as_deref().is_some_and(|d| d.starts_with(&prefix)));
        expenses.retain(|e| e.date.as_deref().is_some_and(|d| d.starts_with(&prefix)));
        println!(
            "Filtered to {}: {} sales, {} expenses\n",
            year,
            sales.len(),
            expenses.len()
        );
    }
    if let Some(crop) = &args.crop {
        // General expenses stay: they distribute over whatever crops have revenue
        sales.retain(|s| &s.crop == crop);
        expenses.retain(|e| e.crop.is_none() || e.crop.as_deref() == Some(crop));
        println!(
            "Filtered to crop {}: {} sales, {} expenses\n",
            crop,
            sales.len(),
            expenses.len()
        );
    }

    // Step 4: Aggregate
    println!("Aggregating...");
    let varieties: Vec<String> = match &args.crop {
        Some(crop) => vec![crop.clone()],
        None => config.varieties.clone(),
    };
    let report = aggregate::build_report(&farmers, &varieties, &sales, &expenses);
    println!(
        "  {} farmers, {} crop varieties\n",
        report.farmers.len(),
        report.crops.len()
    );

    // Step 5: Generate reports
    println!("Generating reports...");
    let report_data = reports::ReportData {
        farmers: &report.farmers,
        crops: &report.crops,
        sales: &sales,
        expenses: &expenses,
        stats: &report.stats,
        config: &config,
    };
    reports::generate_all_reports(&args.output_dir, &report_data)?;

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let pdf_path = args
        .output_dir
        .join(pdf::report_filename(&config.app_name, &today));
    pdf::write_financial_report(&pdf_path, &report_data, &today)?;
    println!("  Generated: {}", pdf_path.display());

    // Step 6: Print summary
    reports::print_summary(&report_data, args.year);

    println!("\nDone! Reports written to: {}", args.output_dir.display());

    Ok(())
}
