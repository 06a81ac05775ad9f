use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInfo {
    pub job_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub song_title: String,
    #[serde(default)]
    pub stems: Vec<String>,
    #[serde(default)]
    pub payment_completed: bool,
}

impl PaymentInfo {
    pub fn amount_display(&self) -> String {
        format!("{:.2} {}", self.amount, self.currency.to_uppercase())
    }
}

/// Acknowledgement returned by `POST /payment/{id}/complete`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentAck {
    #[serde(default)]
    pub message: String,
    pub job_id: String,
}
