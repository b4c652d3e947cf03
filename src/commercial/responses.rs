//! Response DTOs for commercial API endpoints.
//!
//! Amounts are rounded to two decimals here and nowhere else.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::calculators::{round_money, BreakdownResult};
use super::models::CommercialRecord;
use super::services::{LoadedRecord, SaveOutcome};

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

/// Two-decimal display value, always carrying two decimal places.
fn display(value: Decimal) -> Decimal {
    let mut rounded = round_money(value, 2);
    rounded.rescale(2);
    rounded
}

fn money(amount: Decimal, currency: &str) -> MoneyResponse {
    MoneyResponse {
        amount: display(amount),
        currency: currency.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyingBreakdownResponse {
    #[serde(rename = "baseAmountWithoutVAT")]
    pub base_amount_without_vat: MoneyResponse,
    pub vat_amount: MoneyResponse,
    pub commission_amount: MoneyResponse,
    pub additional_costs_total: MoneyResponse,
    pub gross_value: MoneyResponse,
    pub net_value: MoneyResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellingBreakdownResponse {
    #[serde(rename = "baseBeforeVAT")]
    pub base_before_vat: MoneyResponse,
    pub vat_amount: MoneyResponse,
    pub incentive_value: MoneyResponse,
    pub additional_total: MoneyResponse,
    pub gross_revenue: MoneyResponse,
    pub net_revenue: MoneyResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitResponse {
    pub profit: MoneyResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub profit_margin_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub markup_percent: Decimal,
}

/// Response for a breakdown calculation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownResponse {
    pub buying: BuyingBreakdownResponse,
    pub selling: SellingBreakdownResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub exchange_rate: Decimal,
    pub converted_cost: MoneyResponse,
    pub profit: ProfitResponse,
}

impl From<&BreakdownResult> for BreakdownResponse {
    fn from(result: &BreakdownResult) -> Self {
        let buy = result.buying_currency.as_str();
        let sell = result.selling_currency.as_str();

        BreakdownResponse {
            buying: BuyingBreakdownResponse {
                base_amount_without_vat: money(result.buying.base_amount_without_vat, buy),
                vat_amount: money(result.buying.vat_amount, buy),
                commission_amount: money(result.buying.commission_amount, buy),
                additional_costs_total: money(result.buying.additional_costs_total, buy),
                gross_value: money(result.buying.gross_value, buy),
                net_value: money(result.buying.net_value, buy),
            },
            selling: SellingBreakdownResponse {
                base_before_vat: money(result.selling.base_before_vat, sell),
                vat_amount: money(result.selling.vat_amount, sell),
                incentive_value: money(result.selling.incentive_value, sell),
                additional_total: money(result.selling.additional_total, sell),
                gross_revenue: money(result.selling.gross_revenue, sell),
                net_revenue: money(result.selling.net_revenue, sell),
            },
            exchange_rate: result.exchange_rate.normalize(),
            converted_cost: money(result.converted_cost, sell),
            profit: ProfitResponse {
                profit: money(result.profit.profit, sell),
                profit_margin_percent: display(result.profit.profit_margin_percent),
                markup_percent: display(result.profit.markup_percent),
            },
        }
    }
}

/// Response for a live recalculation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub record: CommercialRecord,
    pub breakdown: BreakdownResponse,
}

/// Response for a stored commercial record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialRecordResponse {
    pub record_id: Uuid,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
    pub record: CommercialRecord,
    pub breakdown: BreakdownResponse,
}

impl From<LoadedRecord> for CommercialRecordResponse {
    fn from(loaded: LoadedRecord) -> Self {
        CommercialRecordResponse {
            record_id: loaded.stored.id,
            version: loaded.stored.version,
            updated_at: loaded.stored.updated_at,
            breakdown: BreakdownResponse::from(&loaded.breakdown),
            record: loaded.stored.record,
        }
    }
}

/// Response for a save
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub record_id: Uuid,
    pub version: i32,
    pub created: bool,
    pub record: CommercialRecord,
    pub breakdown: BreakdownResponse,
}

impl From<SaveOutcome> for SaveResponse {
    fn from(outcome: SaveOutcome) -> Self {
        SaveResponse {
            record_id: outcome.record_id,
            version: outcome.version,
            created: outcome.created,
            breakdown: BreakdownResponse::from(&outcome.breakdown),
            record: outcome.record,
        }
    }
}

/// Generic error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
