use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::session::is_cookie_value;

// --- Shared Response Shapes ---

/// StatusMessage
///
/// The `{status, message}` shape used for errors produced by this service itself,
/// so the front end can branch on `status` the same way it does for backend replies.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct StatusMessage {
    pub status: u16,
    pub message: String,
}

/// EnvelopeDoc
///
/// Documentation schema of the backend envelope returned verbatim by proxying handlers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EnvelopeDoc {
    pub status: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    #[ts(type = "unknown")]
    pub body: Option<Value>,
}

// --- Session Schemas ---

/// LoginTokens
///
/// Input payload for POST /auth/session, the token pair obtained from the backend's
/// login exchange.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl LoginTokens {
    pub fn validate(&self) -> Result<(), String> {
        if self.access_token.trim().is_empty() {
            return Err("access_token is required".to_string());
        }
        if self.refresh_token.trim().is_empty() {
            return Err("refresh_token is required".to_string());
        }
        if !is_cookie_value(&self.access_token) {
            return Err("access_token contains characters not allowed in a cookie".to_string());
        }
        if !is_cookie_value(&self.refresh_token) {
            return Err("refresh_token contains characters not allowed in a cookie".to_string());
        }
        Ok(())
    }
}

/// SessionStatus
///
/// Output schema of the session endpoints: the coarse login predicate and role claim.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct SessionStatus {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// HomePage
///
/// What GET / renders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct HomePage {
    pub app: String,
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// --- Detection ---

/// DetectUpload
///
/// Documentation schema of the multipart upload accepted by POST /detect.
#[derive(Debug, ToSchema)]
pub struct DetectUpload {
    /// Photo of the batik to classify.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

// --- Seller Forms ---

/// WithdrawRequest
///
/// Payout form of the seller wallet. Validated here before it is forwarded to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct WithdrawRequest {
    /// Amount in rupiah.
    pub amount: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

impl WithdrawRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("Amount must be greater than zero".to_string());
        }
        if self.bank_name.trim().is_empty() {
            return Err("Bank name is required".to_string());
        }
        if self.account_name.trim().is_empty() {
            return Err("Account name is required".to_string());
        }
        let account_number = self.account_number.trim();
        if account_number.is_empty() {
            return Err("Account number is required".to_string());
        }
        if !account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err("Account number must contain digits only".to_string());
        }
        Ok(())
    }
}

/// RegisterSellerRequest
///
/// Form a logged-in user submits to open a seller account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterSellerRequest {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RegisterSellerRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Store name is required".to_string());
        }
        if self.address.trim().is_empty() {
            return Err("Address is required".to_string());
        }
        let phone = self.phone.trim();
        let digits = phone.strip_prefix('+').unwrap_or(phone);
        if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err("Phone number must be 8 to 15 digits".to_string());
        }
        Ok(())
    }
}

/// UpdateSellerProfileRequest
///
/// Partial update of the seller profile. Only provided fields are serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSellerProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
