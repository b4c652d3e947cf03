//! Commercial record models.
//!
//! One record per booking: the buying side (what the agency pays the
//! supplier) and the selling side (what the agency charges the customer).
//! Every field deserializes leniently through [`super::coerce`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::coerce;

/// How a commission or incentive value is applied.
///
/// Anything other than `"percentage"` is treated as a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Percentage,
    #[default]
    #[serde(other)]
    Fixed,
}

/// How an itemized extra (additional cost or discount line) is applied.
///
/// Anything other than `"fixed"` is treated as a percentage of the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Fixed,
    #[default]
    #[serde(other)]
    Percentage,
}

/// An itemized extra charge on either side of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraItem {
    #[serde(default, deserialize_with = "coerce::text")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub amount: Decimal,
    #[serde(rename = "type", default, deserialize_with = "coerce::or_default")]
    pub kind: ItemKind,
}

impl ExtraItem {
    pub fn fixed(description: &str, amount: Decimal) -> Self {
        Self {
            description: description.to_string(),
            amount,
            kind: ItemKind::Fixed,
        }
    }

    pub fn percentage(description: &str, amount: Decimal) -> Self {
        Self {
            description: description.to_string(),
            amount,
            kind: ItemKind::Percentage,
        }
    }
}

/// Buying side: supplier cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyingTerms {
    #[serde(default, deserialize_with = "coerce::currency")]
    pub currency: String,
    /// VAT-inclusive when `vat_included` is set. `None` when the field was
    /// left blank.
    #[serde(
        default,
        deserialize_with = "coerce::optional_decimal",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub commissionable: bool,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub commission_type: AdjustmentKind,
    #[serde(
        default,
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub commission_value: Decimal,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub vat_included: bool,
    #[serde(
        default,
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub vat_percent: Decimal,
    #[serde(default, deserialize_with = "coerce::items")]
    pub additional_costs: Vec<ExtraItem>,
}

/// Selling side: customer price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellingTerms {
    #[serde(default, deserialize_with = "coerce::currency")]
    pub currency: String,
    #[serde(
        default,
        deserialize_with = "coerce::optional_decimal",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub incentive: bool,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub incentive_type: AdjustmentKind,
    #[serde(
        default,
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub incentive_value: Decimal,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub vat_included: bool,
    #[serde(
        default,
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub vat_percent: Decimal,
    #[serde(default, deserialize_with = "coerce::items")]
    pub discounts: Vec<ExtraItem>,
}

/// The commercial terms of one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialRecord {
    /// Required before persistence, not for live calculation.
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub booking_id: Option<Uuid>,
    #[serde(default)]
    pub buying: BuyingTerms,
    #[serde(default)]
    pub selling: SellingTerms,
    /// 1 unit of buying currency expressed in selling currency.
    #[serde(
        default = "default_exchange_rate",
        deserialize_with = "coerce::decimal",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub exchange_rate: Decimal,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub auto_calculate_rate: bool,
}

fn default_exchange_rate() -> Decimal {
    Decimal::ONE
}

impl Default for CommercialRecord {
    fn default() -> Self {
        Self {
            booking_id: None,
            buying: BuyingTerms::default(),
            selling: SellingTerms::default(),
            exchange_rate: default_exchange_rate(),
            auto_calculate_rate: false,
        }
    }
}

impl CommercialRecord {
    /// Whether the buying amount has to be converted into the selling currency.
    pub fn needs_conversion(&self) -> bool {
        coerce::currency_code(&self.buying.currency) != coerce::currency_code(&self.selling.currency)
    }
}

/// A persisted record with its identity and optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: Uuid,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
    pub record: CommercialRecord,
}

/// Row from commercial_records
#[derive(Debug, Clone, FromRow)]
pub struct CommercialRecordRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub buying_currency: String,
    pub buying_amount: Option<Decimal>,
    pub commissionable: bool,
    pub commission_type: String,
    pub commission_value: Decimal,
    pub buying_vat_included: bool,
    pub buying_vat_percent: Decimal,
    pub additional_costs: String,
    pub selling_currency: String,
    pub selling_price: Option<Decimal>,
    pub incentive: bool,
    pub incentive_type: String,
    pub incentive_value: Decimal,
    pub selling_vat_included: bool,
    pub selling_vat_percent: Decimal,
    pub discounts: String,
    pub exchange_rate: Decimal,
    pub auto_calculate_rate: bool,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl CommercialRecordRow {
    /// Rebuild the record. Item lists are stored as JSON-encoded text and go
    /// through the same lenient parsing as form input.
    pub fn into_stored(self) -> StoredRecord {
        StoredRecord {
            id: self.id,
            version: self.version,
            updated_at: self.updated_at,
            record: CommercialRecord {
                booking_id: Some(self.booking_id),
                buying: BuyingTerms {
                    currency: self.buying_currency,
                    amount: self.buying_amount,
                    commissionable: self.commissionable,
                    commission_type: parse_kind(&self.commission_type),
                    commission_value: self.commission_value,
                    vat_included: self.buying_vat_included,
                    vat_percent: self.buying_vat_percent,
                    additional_costs: coerce::items_from_text(&self.additional_costs),
                },
                selling: SellingTerms {
                    currency: self.selling_currency,
                    price: self.selling_price,
                    incentive: self.incentive,
                    incentive_type: parse_kind(&self.incentive_type),
                    incentive_value: self.incentive_value,
                    vat_included: self.selling_vat_included,
                    vat_percent: self.selling_vat_percent,
                    discounts: coerce::items_from_text(&self.discounts),
                },
                exchange_rate: self.exchange_rate,
                auto_calculate_rate: self.auto_calculate_rate,
            },
        }
    }
}

fn parse_kind<T: serde::de::DeserializeOwned + Default>(raw: &str) -> T {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).unwrap_or_default()
}

/// Text column value for an adjustment kind.
pub fn kind_label(kind: AdjustmentKind) -> &'static str {
    match kind {
        AdjustmentKind::Percentage => "percentage",
        AdjustmentKind::Fixed => "fixed",
    }
}
