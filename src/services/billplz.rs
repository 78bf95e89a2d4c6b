use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Bill creation request; collection id and callback/redirect URLs are
/// client configuration, not per-request data.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub description: String,
    pub email: String,
    pub name: String,
    /// Amount in the provider's minor currency unit (cents).
    pub amount: i64,
}

/// The provider's view of a bill. `raw` is persisted verbatim on the
/// payment row for auditing.
#[derive(Debug, Clone)]
pub struct Bill {
    pub id: String,
    pub url: String,
    pub state: String,
    pub raw: Value,
}

impl Bill {
    pub fn from_json(raw: Value) -> AppResult<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Provider("bill response missing id".to_string()))?
            .to_string();
        let url = raw
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let state = raw
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("due")
            .to_string();

        Ok(Self { id, url, state, raw })
    }

    pub fn is_paid(&self) -> bool {
        self.state == "paid"
    }
}

#[async_trait]
pub trait BillplzProvider: Send + Sync {
    async fn create_bill(&self, bill: &NewBill) -> AppResult<Bill>;
    async fn get_bill(&self, bill_id: &str) -> AppResult<Bill>;
}

pub struct BillplzClient {
    api_key: String,
    collection_id: String,
    base_url: String,
    callback_url: String,
    redirect_url: String,
    client: reqwest::Client,
}

impl BillplzClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.billplz_api_key.clone(),
            collection_id: config.billplz_collection_id.clone(),
            base_url: config.billplz_base_url.clone(),
            callback_url: config.payment_callback_url.clone(),
            redirect_url: config.payment_redirect_url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BillplzProvider for BillplzClient {
    async fn create_bill(&self, bill: &NewBill) -> AppResult<Bill> {
        let amount = bill.amount.to_string();
        let params = [
            ("collection_id", self.collection_id.as_str()),
            ("description", bill.description.as_str()),
            ("email", bill.email.as_str()),
            ("name", bill.name.as_str()),
            ("amount", amount.as_str()),
            ("callback_url", self.callback_url.as_str()),
            ("redirect_url", self.redirect_url.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/bills", self.base_url))
            .basic_auth(&self.api_key, Some(""))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("create bill request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "create bill returned {}: {}",
                status, body
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid bill response: {}", e)))?;

        Bill::from_json(raw)
    }

    async fn get_bill(&self, bill_id: &str) -> AppResult<Bill> {
        let response = self
            .client
            .get(format!("{}/bills/{}", self.base_url, bill_id))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("get bill request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "get bill {} returned {}",
                bill_id,
                response.status()
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid bill response: {}", e)))?;

        Bill::from_json(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bill_parses_provider_payload() {
        let bill = Bill::from_json(json!({
            "id": "8X0Iyzaw",
            "url": "https://www.billplz.com/bills/8X0Iyzaw",
            "state": "due",
            "amount": 25000,
        }))
        .unwrap();

        assert_eq!(bill.id, "8X0Iyzaw");
        assert_eq!(bill.url, "https://www.billplz.com/bills/8X0Iyzaw");
        assert!(!bill.is_paid());
    }

    #[test]
    fn bill_without_id_is_an_error() {
        assert!(Bill::from_json(json!({ "state": "due" })).is_err());
    }

    #[test]
    fn paid_state() {
        let bill = Bill::from_json(json!({ "id": "a", "state": "paid" })).unwrap();
        assert!(bill.is_paid());
    }
}
