//! HarvestEase backend API client
//!
//! The admin endpoints return plain JSON arrays with no pagination envelope.
//! Records are decoded into tolerant wire types here; validation into domain
//! types happens in the records module.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::constants;

/// Numeric wire field: the backend stores whatever type the browser sent
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(f64),
    Text(String),
}

/// Farmer reference: a plain id string or a populated sub-document
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FarmerRef {
    Id(String),
    Document {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl FarmerRef {
    pub fn id(&self) -> &str {
        match self {
            FarmerRef::Id(id) => id,
            FarmerRef::Document { id } => id,
        }
    }
}

/// Sale record as returned by /api/admin/sales
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSale {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "farmer")]
    pub farmer_id: Option<FarmerRef>,
    #[serde(alias = "cropType")]
    pub crop: Option<String>,
    pub quantity: Option<WireNumber>,
    pub unit_price: Option<WireNumber>,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub buyer_contact: Option<String>,
    pub date: Option<String>,
}

/// Expense record as returned by /api/admin/expenses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireExpense {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "farmer")]
    pub farmer_id: Option<FarmerRef>,
    /// Absent or empty means a general (farm-wide) expense
    #[serde(alias = "cropType")]
    pub crop: Option<String>,
    pub category: Option<String>,
    pub amount: Option<WireNumber>,
    #[serde(default)]
    pub description: Option<String>,
    pub date: Option<String>,
}

/// Farmer record as returned by /api/admin/farmers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFarmer {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Client for the three admin collections
pub struct HarvestClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HarvestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::API_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
        })
    }

    pub async fn fetch_sales(&self) -> Result<Vec<WireSale>> {
        self.get_json(constants::API_SALES_PATH).await
    }

    pub async fn fetch_expenses(&self) -> Result<Vec<WireExpense>> {
        self.get_json(constants::API_EXPENSES_PATH).await
    }

    pub async fn fetch_farmers(&self) -> Result<Vec<WireFarmer>> {
        self.get_json(constants::API_FARMERS_PATH).await
    }

    /// GET a JSON body with retry and exponential backoff
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let max_retries = constants::API_MAX_RETRIES;
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2u64.pow(attempt));
                sleep(delay).await;
            }

            let mut request = self.client.get(&url).header("Accept", "application/json");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<T>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => {
                                last_error = Some(anyhow!("Parse error: {}", e));
                            }
                        }
                    } else if response.status().as_u16() == 429 {
                        // Rate limited - always retry
                        last_error = Some(anyhow!("Rate limited (429)"));
                        continue;
                    } else {
                        last_error = Some(anyhow!("API returned status: {}", response.status()));
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow!("Request failed: {}", e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Failed after {} retries", max_retries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_sale_tolerates_string_numbers() {
        let json = r#"{
            "_id": "s1",
            "farmerId": "f1",
            "cropType": "Nadu",
            "quantity": "10",
            "unitPrice": 50,
            "buyerName": "Mills Ltd",
            "date": "2026-01-15"
        }"#;

        let sale: WireSale = serde_json::from_str(json).unwrap();
        assert_eq!(sale.id.as_deref(), Some("s1"));
        assert!(matches!(sale.quantity, Some(WireNumber::Text(_))));
        assert!(matches!(sale.unit_price, Some(WireNumber::Number(_))));
    }

    #[test]
    fn test_farmer_ref_accepts_populated_document() {
        let json = r#"{
            "_id": "e1",
            "farmerId": {"_id": "f2", "name": "B"},
            "category": "Labor",
            "amount": 1500,
            "date": "2026-02-01"
        }"#;

        let expense: WireExpense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.farmer_id.as_ref().map(|f| f.id()), Some("f2"));
        assert!(expense.crop.is_none());
    }
}
