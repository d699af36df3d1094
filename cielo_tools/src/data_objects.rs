//! Request and response bodies for the Cielo e-commerce API. Cielo uses PascalCase field names throughout.
use fpg_common::Cents;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloTransactionRequest {
    pub merchant_order_id: String,
    pub customer: CieloCustomer,
    pub payment: CieloPaymentRequest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloCustomer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<CieloAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<CieloAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloAddress {
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloCard {
    pub card_number: String,
    pub holder: String,
    /// MM/YYYY
    pub expiration_date: String,
    pub security_code: String,
    pub brand: String,
}

/// The payment half of a sale request. The `Type` field selects the payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum CieloPaymentRequest {
    #[serde(rename_all = "PascalCase")]
    CreditCard {
        amount: Cents,
        #[serde(default = "one")]
        installments: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        soft_descriptor: Option<String>,
        #[serde(default)]
        capture: bool,
        credit_card: CieloCard,
    },
    #[serde(rename_all = "PascalCase")]
    DebitCard { amount: Cents, return_url: String, debit_card: CieloCard },
    #[serde(rename_all = "PascalCase")]
    Boleto {
        amount: Cents,
        provider: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boleto_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiration_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
    #[serde(rename_all = "PascalCase")]
    Pix {
        amount: Cents,
        /// Minutes
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qr_code_expiration: Option<u32>,
    },
}

fn one() -> u32 {
    1
}

impl CieloPaymentRequest {
    pub fn amount(&self) -> Cents {
        match self {
            Self::CreditCard { amount, .. } |
            Self::DebitCard { amount, .. } |
            Self::Boleto { amount, .. } |
            Self::Pix { amount, .. } => *amount,
        }
    }
}

/// The response to both `POST /1/sales` and `GET /1/sales/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloTransaction {
    #[serde(default)]
    pub merchant_order_id: Option<String>,
    #[serde(default)]
    pub customer: Option<CieloCustomer>,
    pub payment: CieloPayment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloPayment {
    pub payment_id: String,
    /// The numeric status code. Interpreting it is left to the caller.
    pub status: i64,
    #[serde(default, rename = "Type")]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub amount: Option<Cents>,
    #[serde(default)]
    pub captured_amount: Option<Cents>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub proof_of_sale: Option<String>,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub return_code: Option<String>,
    #[serde(default)]
    pub return_message: Option<String>,
    #[serde(default)]
    pub received_date: Option<String>,
    /// Boleto only
    #[serde(default)]
    pub url: Option<String>,
    /// Pix only
    #[serde(default)]
    pub qr_code_string: Option<String>,
}

/// `GET /1/sales?merchantOrderId=` returns only the payment ids linked to the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MerchantOrderPayments {
    #[serde(default)]
    pub payments: Vec<PaymentReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentReference {
    pub payment_id: String,
    #[serde(default)]
    pub receve_date: Option<String>,
}

/// Response to capture and void calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloStatusUpdate {
    pub status: i64,
    #[serde(default)]
    pub reason_code: Option<i64>,
    #[serde(default)]
    pub reason_message: Option<String>,
    #[serde(default)]
    pub return_code: Option<String>,
    #[serde(default)]
    pub return_message: Option<String>,
}

/// Cielo reports validation failures as a list of code/message pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CieloErrorMessage {
    pub code: i64,
    pub message: String,
}
