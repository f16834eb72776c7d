//! Centralized constants for the farm finance reporter
//!
//! This module contains values that apply to every HarvestEase deployment.
//! Cooperative-specific configuration is loaded from config.toml.

// =============================================================================
// API Endpoints
// =============================================================================

/// Admin sales collection (JSON array, no pagination envelope)
pub const API_SALES_PATH: &str = "/api/admin/sales";

/// Admin expenses collection
pub const API_EXPENSES_PATH: &str = "/api/admin/expenses";

/// Admin farmers collection
pub const API_FARMERS_PATH: &str = "/api/admin/farmers";

// =============================================================================
// Defaults
// =============================================================================

/// Application name used in report branding and filenames
pub const DEFAULT_APP_NAME: &str = "HarvestEase";

/// Currency prefix for formatted amounts
pub const DEFAULT_CURRENCY: &str = "Rs.";

/// Region used when a farmer record carries none
pub const UNKNOWN_REGION: &str = "Unknown";

/// Rice varieties the cooperative trades, used when config.toml lists none
pub const DEFAULT_VARIETIES: [&str; 5] = ["Nadu", "Samba", "Keeri Samba", "Red Kakulu", "Suwandel"];

// =============================================================================
// File Names
// =============================================================================

/// Cache database filename
pub const CACHE_FILENAME: &str = "cache.sqlite";

/// Per-farmer performance ledger
pub const FARMER_PERFORMANCE_FILENAME: &str = "farmer_performance.csv";

/// Per-crop profitability ledger
pub const CROP_PROFITABILITY_FILENAME: &str = "crop_profitability.csv";

/// Monthly P&L summary
pub const SUMMARY_FILENAME: &str = "summary.csv";

/// Chart series export consumed by the web dashboard
pub const CHART_DATA_FILENAME: &str = "chart_data.json";

/// Report kind component of the generated PDF filename
pub const PDF_REPORT_KIND: &str = "Financial-Report";

// =============================================================================
// HTTP Tuning
// =============================================================================

/// Attempts per API request before giving up
pub const API_MAX_RETRIES: u32 = 3;

/// Request timeout in seconds
pub const API_TIMEOUT_SECONDS: u64 = 30;

// =============================================================================
// Ranking
// =============================================================================

/// Farmers shown in the console summary
pub const CONSOLE_TOP_N: usize = 5;

/// Farmers shown in the PDF report table
pub const PDF_TOP_N: usize = 10;
