//! NFe (Nota Fiscal eletrônica) data extracted from SEFAZ consultation pages.
mod amount;
mod parser;

pub use {amount::normalize_amount, parser::SefazNfeParser};

use serde::{Deserialize, Serialize};

/// Structured data of one consumer invoice.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NfeData {
    /// The 44-digit access key (chave de acesso).
    pub access_key: String,

    /// Invoice number.
    pub number: Option<String>,

    /// Invoice series.
    pub series: Option<String>,

    /// Issue date and time, as printed on the page.
    pub issued_at: Option<String>,

    /// The company that issued the invoice.
    pub issuer: Issuer,

    /// Line items, in page order.
    pub items: Vec<NfeItem>,

    /// Invoice totals.
    pub totals: Totals,

    /// Payments, in page order.
    pub payments: Vec<Payment>,

    /// The consultation page the data was read from.
    pub source_url: String,
}

/// The company that issued an invoice.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    /// Company name.
    pub name: String,

    /// CNPJ, as printed.
    pub cnpj: Option<String>,

    /// Address, as printed.
    pub address: Option<String>,
}

impl Issuer {
    /// The CNPJ with punctuation removed.
    pub fn cnpj_digits(&self) -> Option<String> {
        let digits: String = self.cnpj.as_deref()?.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    }
}

/// One line item of an invoice.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NfeItem {
    /// Product code.
    pub code: Option<String>,

    /// Product description.
    pub description: String,

    /// Quantity, as a decimal string.
    pub quantity: Option<String>,

    /// Unit of measure.
    pub unit: Option<String>,

    /// Price per unit, as a decimal string.
    pub unit_price: Option<String>,

    /// Line total, as a decimal string.
    pub total_price: Option<String>,
}

/// Invoice totals. Amounts are decimal strings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Number of line items.
    pub item_count: Option<u32>,

    /// Sum of the line totals.
    pub gross_amount: Option<String>,

    /// Discounts applied.
    pub discount: Option<String>,

    /// Amount due after discounts.
    pub amount_due: Option<String>,

    /// Change given back.
    pub change: Option<String>,
}

/// One payment towards an invoice.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment method, as printed.
    pub method: String,

    /// Amount paid, as a decimal string.
    pub amount: Option<String>,
}
