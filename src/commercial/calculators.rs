//! Core margin calculation functions.
//!
//! Pure functions for the commercial breakdown - no database access, no
//! rate lookups. The whole pipeline is re-run after every edit of a record:
//!
//! record -> buying breakdown, selling breakdown -> converted cost -> profit
//!
//! Inputs are normalized through [`coerce`] first, so none of these functions
//! can fail or overflow.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::coerce;
use super::models::{AdjustmentKind, BuyingTerms, CommercialRecord, ItemKind, SellingTerms};

const HUNDRED: Decimal = dec!(100);

/// Half-even rounding for displayed amounts. Breakdowns keep full precision.
///
/// ```
/// use rust_decimal_macros::dec;
/// use agency_commercial::commercial::round_money;
///
/// // VAT-exclusive base of 1000 at 20%
/// assert_eq!(round_money(dec!(1000) / dec!(1.2), 2), dec!(833.33));
/// assert_eq!(round_money(dec!(16.665), 2), dec!(16.66));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// `numerator / denominator * 100`, or zero when the denominator is not
/// positive or the result does not fit.
fn ratio_percent(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(denominator)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Buying-side cost figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuyingBreakdown {
    pub base_amount_without_vat: Decimal,
    /// Informational when the amount is VAT-exclusive.
    pub vat_amount: Decimal,
    pub commission_amount: Decimal,
    pub additional_costs_total: Decimal,
    /// Net cost before VAT, after commission.
    pub gross_value: Decimal,
    /// Total payable, VAT included.
    pub net_value: Decimal,
}

/// Reduce the buying side to cost figures.
///
/// Commission is taken from the net-of-VAT amount. Additional costs are
/// summed as plain amounts: the item type is not applied on this side.
pub fn buying_breakdown(buying: &BuyingTerms) -> BuyingBreakdown {
    let amount = coerce::amount(buying.amount.unwrap_or_default());
    let vat_rate = coerce::percent(buying.vat_percent) / HUNDRED;

    let base_amount_without_vat = if buying.vat_included {
        amount / (Decimal::ONE + vat_rate)
    } else {
        amount
    };

    let vat_amount = if buying.vat_included {
        amount - base_amount_without_vat
    } else {
        base_amount_without_vat * vat_rate
    };

    let net_before_vat = base_amount_without_vat;
    let commission_amount = if buying.commissionable {
        match buying.commission_type {
            AdjustmentKind::Percentage => {
                net_before_vat * coerce::percent(buying.commission_value) / HUNDRED
            }
            AdjustmentKind::Fixed => coerce::amount(buying.commission_value),
        }
    } else {
        Decimal::ZERO
    };

    let additional_costs_total: Decimal = buying
        .additional_costs
        .iter()
        .map(|item| coerce::amount(item.amount))
        .sum();

    BuyingBreakdown {
        base_amount_without_vat,
        vat_amount,
        commission_amount,
        additional_costs_total,
        gross_value: base_amount_without_vat + additional_costs_total - commission_amount,
        net_value: amount + additional_costs_total,
    }
}

/// Selling-side revenue figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SellingBreakdown {
    pub base_before_vat: Decimal,
    pub vat_amount: Decimal,
    /// Incentive amount (not the configured percentage).
    pub incentive_value: Decimal,
    pub additional_total: Decimal,
    /// Pre-VAT revenue net of incentive: the margin base.
    pub gross_revenue: Decimal,
    /// Amount receivable from the customer, VAT included.
    pub net_revenue: Decimal,
}

/// Reduce the selling side to revenue figures.
///
/// The incentive lowers `gross_revenue` but never `net_revenue`: it does not
/// change what the customer owes. Item types are honored on this side.
pub fn selling_breakdown(selling: &SellingTerms) -> SellingBreakdown {
    let price = coerce::amount(selling.price.unwrap_or_default());
    let vat_rate = if selling.vat_included {
        coerce::percent(selling.vat_percent) / HUNDRED
    } else {
        Decimal::ZERO
    };

    let base_before_vat = if selling.vat_included {
        price / (Decimal::ONE + vat_rate)
    } else {
        price
    };

    let incentive_value = if selling.incentive {
        match selling.incentive_type {
            AdjustmentKind::Percentage => {
                base_before_vat * coerce::percent(selling.incentive_value) / HUNDRED
            }
            AdjustmentKind::Fixed => coerce::amount(selling.incentive_value),
        }
    } else {
        Decimal::ZERO
    };

    let additional_total: Decimal = selling
        .discounts
        .iter()
        .map(|item| match item.kind {
            ItemKind::Fixed => coerce::amount(item.amount),
            ItemKind::Percentage => base_before_vat * coerce::percent(item.amount) / HUNDRED,
        })
        .sum();

    let vat_amount = if selling.vat_included {
        price - base_before_vat
    } else {
        base_before_vat * vat_rate
    };

    SellingBreakdown {
        base_before_vat,
        vat_amount,
        incentive_value,
        additional_total,
        gross_revenue: base_before_vat - incentive_value + additional_total,
        net_revenue: base_before_vat + vat_amount + additional_total,
    }
}

/// Convert the buying total payable into the selling currency.
///
/// Same currency means no conversion, whatever the rate says.
pub fn convert_cost(net_value: Decimal, from: &str, to: &str, exchange_rate: Decimal) -> Decimal {
    if coerce::currency_code(from) == coerce::currency_code(to) {
        net_value
    } else {
        net_value * coerce::rate(exchange_rate)
    }
}

/// Profit figures in the selling currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfitAnalysis {
    pub profit: Decimal,
    /// Profit as a percentage of net revenue.
    pub profit_margin_percent: Decimal,
    /// Profit as a percentage of converted cost.
    pub markup_percent: Decimal,
}

/// Combine the selling breakdown and the converted cost into profit, margin
/// and markup. Zero denominators yield zero percentages.
pub fn analyze_profit(selling: &SellingBreakdown, converted_cost: Decimal) -> ProfitAnalysis {
    let profit = selling.net_revenue - converted_cost;

    ProfitAnalysis {
        profit,
        profit_margin_percent: ratio_percent(profit, selling.net_revenue),
        markup_percent: ratio_percent(profit, converted_cost),
    }
}

/// Complete breakdown of a record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BreakdownResult {
    pub buying: BuyingBreakdown,
    pub selling: SellingBreakdown,
    pub buying_currency: String,
    pub selling_currency: String,
    /// Rate actually applied; 1 when no conversion happened.
    pub exchange_rate: Decimal,
    pub converted_cost: Decimal,
    pub profit: ProfitAnalysis,
}

/// Run the full pipeline over a record.
pub fn compute_breakdown(record: &CommercialRecord) -> BreakdownResult {
    let buying = buying_breakdown(&record.buying);
    let selling = selling_breakdown(&record.selling);

    let buying_currency = coerce::currency_code(&record.buying.currency);
    let selling_currency = coerce::currency_code(&record.selling.currency);
    let exchange_rate = if record.needs_conversion() {
        coerce::rate(record.exchange_rate)
    } else {
        Decimal::ONE
    };

    let converted_cost = convert_cost(
        buying.net_value,
        &buying_currency,
        &selling_currency,
        record.exchange_rate,
    );
    let profit = analyze_profit(&selling, converted_cost);

    BreakdownResult {
        buying,
        selling,
        buying_currency,
        selling_currency,
        exchange_rate,
        converted_cost,
        profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commercial::models::ExtraItem;
    use serde_json::json;

    fn scenario_a_buying() -> BuyingTerms {
        BuyingTerms {
            currency: "EUR".to_string(),
            amount: Some(dec!(1000)),
            commissionable: true,
            commission_type: AdjustmentKind::Percentage,
            commission_value: dec!(10),
            vat_included: true,
            vat_percent: dec!(20),
            additional_costs: vec![],
        }
    }

    fn scenario_b_selling() -> SellingTerms {
        SellingTerms {
            currency: "EUR".to_string(),
            price: Some(dec!(1200)),
            incentive: true,
            incentive_type: AdjustmentKind::Percentage,
            incentive_value: dec!(5),
            vat_included: true,
            vat_percent: dec!(20),
            discounts: vec![],
        }
    }

    fn scenario_record() -> CommercialRecord {
        CommercialRecord {
            buying: scenario_a_buying(),
            selling: scenario_b_selling(),
            ..Default::default()
        }
    }

    // ==================== buying_breakdown tests ====================

    #[test]
    fn test_buying_scenario_vat_included_with_percentage_commission() {
        let result = buying_breakdown(&scenario_a_buying());

        assert_eq!(round_money(result.base_amount_without_vat, 2), dec!(833.33));
        assert_eq!(round_money(result.vat_amount, 2), dec!(166.67));
        assert_eq!(round_money(result.commission_amount, 2), dec!(83.33));
        assert_eq!(round_money(result.gross_value, 2), dec!(750.00));
        assert_eq!(result.net_value, dec!(1000));
    }

    #[test]
    fn test_buying_vat_extraction_recovers_amount() {
        for (amount, percent) in [(dec!(1000), dec!(20)), (dec!(99.99), dec!(7)), (dec!(12345.67), dec!(21))] {
            let buying = BuyingTerms {
                amount: Some(amount),
                vat_included: true,
                vat_percent: percent,
                ..Default::default()
            };
            let result = buying_breakdown(&buying);
            let recovered = result.base_amount_without_vat * (Decimal::ONE + percent / HUNDRED);
            assert_eq!(round_money(recovered, 8), amount);
        }
    }

    #[test]
    fn test_buying_vat_excluded_is_informational() {
        let buying = BuyingTerms {
            amount: Some(dec!(500)),
            vat_included: false,
            vat_percent: dec!(10),
            ..Default::default()
        };
        let result = buying_breakdown(&buying);

        assert_eq!(result.base_amount_without_vat, dec!(500));
        assert_eq!(result.vat_amount, dec!(50));
        assert_eq!(result.gross_value, dec!(500));
        assert_eq!(result.net_value, dec!(500));
    }

    #[test]
    fn test_buying_fixed_commission() {
        let buying = BuyingTerms {
            amount: Some(dec!(800)),
            commissionable: true,
            commission_type: AdjustmentKind::Fixed,
            commission_value: dec!(40),
            ..Default::default()
        };
        let result = buying_breakdown(&buying);

        assert_eq!(result.commission_amount, dec!(40));
        assert_eq!(result.gross_value, dec!(760));
        assert_eq!(result.net_value, dec!(800));
    }

    #[test]
    fn test_buying_commission_ignored_when_not_commissionable() {
        let buying = BuyingTerms {
            commissionable: false,
            ..scenario_a_buying()
        };
        let result = buying_breakdown(&buying);

        assert_eq!(result.commission_amount, Decimal::ZERO);
        assert_eq!(round_money(result.gross_value, 2), dec!(833.33));
    }

    #[test]
    fn test_buying_additional_costs_ignore_item_type() {
        // Percentage items on the buying side are summed as plain amounts.
        let buying = BuyingTerms {
            amount: Some(dec!(1000)),
            additional_costs: vec![
                ExtraItem::fixed("Transfer", dec!(50)),
                ExtraItem::percentage("Handling", dec!(10)),
            ],
            ..Default::default()
        };
        let result = buying_breakdown(&buying);

        assert_eq!(result.additional_costs_total, dec!(60));
        assert_eq!(result.gross_value, dec!(1060));
        assert_eq!(result.net_value, dec!(1060));
    }

    // ==================== selling_breakdown tests ====================

    #[test]
    fn test_selling_scenario_vat_included_with_percentage_incentive() {
        let result = selling_breakdown(&scenario_b_selling());

        assert_eq!(round_money(result.base_before_vat, 2), dec!(1000.00));
        assert_eq!(round_money(result.vat_amount, 2), dec!(200.00));
        assert_eq!(round_money(result.incentive_value, 2), dec!(50.00));
        assert_eq!(round_money(result.gross_revenue, 2), dec!(950.00));
        assert_eq!(round_money(result.net_revenue, 2), dec!(1200.00));
    }

    #[test]
    fn test_selling_vat_percent_ignored_when_not_included() {
        let selling = SellingTerms {
            price: Some(dec!(1000)),
            vat_included: false,
            vat_percent: dec!(20),
            ..Default::default()
        };
        let result = selling_breakdown(&selling);

        assert_eq!(result.base_before_vat, dec!(1000));
        assert_eq!(result.vat_amount, Decimal::ZERO);
        assert_eq!(result.net_revenue, dec!(1000));
    }

    #[test]
    fn test_selling_fixed_incentive() {
        let selling = SellingTerms {
            price: Some(dec!(1000)),
            incentive: true,
            incentive_type: AdjustmentKind::Fixed,
            incentive_value: dec!(75),
            ..Default::default()
        };
        let result = selling_breakdown(&selling);

        assert_eq!(result.incentive_value, dec!(75));
        assert_eq!(result.gross_revenue, dec!(925));
        assert_eq!(result.net_revenue, dec!(1000));
    }

    #[test]
    fn test_selling_items_honor_type() {
        let selling = SellingTerms {
            price: Some(dec!(1000)),
            discounts: vec![
                ExtraItem::fixed("Service fee", dec!(30)),
                ExtraItem::percentage("Tourist tax", dec!(5)),
            ],
            ..Default::default()
        };
        let result = selling_breakdown(&selling);

        assert_eq!(result.additional_total, dec!(80)); // 30 + 5% of 1000
        assert_eq!(result.gross_revenue, dec!(1080));
        assert_eq!(result.net_revenue, dec!(1080));
    }

    #[test]
    fn test_incentive_never_changes_net_revenue() {
        let mut selling = scenario_b_selling();
        let baseline = selling_breakdown(&selling);

        for value in [dec!(0), dec!(1), dec!(12.5), dec!(50), dec!(100)] {
            selling.incentive_value = value;
            let result = selling_breakdown(&selling);
            assert_eq!(result.net_revenue, baseline.net_revenue);
        }

        selling.incentive_value = dec!(10);
        let ten = selling_breakdown(&selling);
        assert_ne!(ten.gross_revenue, baseline.gross_revenue);
    }

    #[test]
    fn test_item_type_asymmetry_between_sides() {
        // Same item list, different treatment: buying sums raw amounts,
        // selling applies percentage items to the pre-VAT base.
        let items = vec![ExtraItem::percentage("Extra", dec!(10))];

        let buying = buying_breakdown(&BuyingTerms {
            amount: Some(dec!(2000)),
            additional_costs: items.clone(),
            ..Default::default()
        });
        let selling = selling_breakdown(&SellingTerms {
            price: Some(dec!(2000)),
            discounts: items,
            ..Default::default()
        });

        assert_eq!(buying.additional_costs_total, dec!(10));
        assert_eq!(selling.additional_total, dec!(200));
    }

    // ==================== convert_cost tests ====================

    #[test]
    fn test_convert_cost_same_currency_ignores_rate() {
        for rate in [dec!(0), dec!(0.85), dec!(3), dec!(-2)] {
            assert_eq!(convert_cost(dec!(1000), "EUR", "eur", rate), dec!(1000));
        }
    }

    #[test]
    fn test_convert_cost_applies_rate() {
        assert_eq!(convert_cost(dec!(1000), "USD", "EUR", dec!(0.85)), dec!(850));
    }

    #[test]
    fn test_convert_cost_invalid_rate_falls_back_to_one() {
        assert_eq!(convert_cost(dec!(1000), "USD", "EUR", dec!(0)), dec!(1000));
    }

    // ==================== analyze_profit tests ====================

    #[test]
    fn test_profit_scenario_same_currency() {
        let result = compute_breakdown(&scenario_record());

        assert_eq!(result.converted_cost, dec!(1000));
        assert_eq!(round_money(result.profit.profit, 2), dec!(200.00));
        assert_eq!(round_money(result.profit.profit_margin_percent, 2), dec!(16.67));
        assert_eq!(round_money(result.profit.markup_percent, 2), dec!(20.00));
        assert_eq!(result.exchange_rate, Decimal::ONE);
    }

    #[test]
    fn test_profit_scenario_converted_cost() {
        let mut record = scenario_record();
        record.buying.currency = "USD".to_string();
        record.exchange_rate = dec!(0.85);

        let result = compute_breakdown(&record);

        assert_eq!(result.converted_cost, dec!(850));
        assert_eq!(round_money(result.profit.profit, 2), dec!(350.00));
        assert_eq!(round_money(result.profit.profit_margin_percent, 2), dec!(29.17));
        assert_eq!(round_money(result.profit.markup_percent, 2), dec!(41.18));
        assert_eq!(result.exchange_rate, dec!(0.85));
    }

    #[test]
    fn test_profit_zero_denominators() {
        let selling = SellingBreakdown::default();
        let result = analyze_profit(&selling, Decimal::ZERO);

        assert_eq!(result.profit, Decimal::ZERO);
        assert_eq!(result.profit_margin_percent, Decimal::ZERO);
        assert_eq!(result.markup_percent, Decimal::ZERO);
    }

    #[test]
    fn test_profit_loss_has_negative_margin() {
        let selling = SellingBreakdown {
            net_revenue: dec!(800),
            ..Default::default()
        };
        let result = analyze_profit(&selling, dec!(1000));

        assert_eq!(result.profit, dec!(-200));
        assert_eq!(result.profit_margin_percent, dec!(-25));
        assert_eq!(result.markup_percent, dec!(-20));
    }

    #[test]
    fn test_profit_tiny_revenue_does_not_overflow() {
        let selling = SellingBreakdown {
            net_revenue: dec!(0.0000000000000000000000000001),
            ..Default::default()
        };
        let result = analyze_profit(&selling, coerce::MAX_AMOUNT);

        assert_eq!(result.profit_margin_percent, Decimal::ZERO);
    }

    // ==================== compute_breakdown tests ====================

    #[test]
    fn test_empty_record_is_all_zero() {
        let result = compute_breakdown(&CommercialRecord::default());

        assert_eq!(result.buying, BuyingBreakdown::default());
        assert_eq!(result.selling, SellingBreakdown::default());
        assert_eq!(result.converted_cost, Decimal::ZERO);
        assert_eq!(result.profit, ProfitAnalysis::default());
    }

    #[test]
    fn test_blank_form_payload_is_all_zero() {
        let record: CommercialRecord = serde_json::from_value(json!({
            "buying": {"currency": "", "amount": "", "commissionValue": "", "vatPercent": ""},
            "selling": {"currency": "", "price": "", "incentiveValue": "", "vatPercent": ""},
            "exchangeRate": ""
        }))
        .unwrap();
        let result = compute_breakdown(&record);

        assert_eq!(result.buying.gross_value, Decimal::ZERO);
        assert_eq!(result.buying.net_value, Decimal::ZERO);
        assert_eq!(result.selling.gross_revenue, Decimal::ZERO);
        assert_eq!(result.selling.net_revenue, Decimal::ZERO);
        assert_eq!(result.profit, ProfitAnalysis::default());
    }

    #[test]
    fn test_identity_without_adjustments() {
        let record = CommercialRecord {
            buying: BuyingTerms {
                currency: "EUR".to_string(),
                amount: Some(dec!(742.18)),
                ..Default::default()
            },
            selling: SellingTerms {
                currency: "EUR".to_string(),
                price: Some(dec!(905.40)),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = compute_breakdown(&record);

        assert_eq!(result.buying.net_value, dec!(742.18));
        assert_eq!(result.selling.net_revenue, dec!(905.40));
    }

    #[test]
    fn test_negative_and_out_of_range_inputs_are_coerced() {
        let record: CommercialRecord = serde_json::from_value(json!({
            "buying": {
                "currency": "USD",
                "amount": -100,
                "commissionable": true,
                "commissionType": "percentage",
                "commissionValue": 250,
                "vatIncluded": true,
                "vatPercent": -100,
                "additionalCosts": [{"amount": -40, "type": "fixed"}]
            },
            "selling": {
                "currency": "EUR",
                "price": "1e20",
                "incentive": true,
                "incentiveType": "percentage",
                "incentiveValue": -5,
                "vatIncluded": true,
                "vatPercent": 500,
                "discounts": [{"amount": 1000, "type": "percentage"}]
            },
            "exchangeRate": -3
        }))
        .unwrap();
        let result = compute_breakdown(&record);

        assert_eq!(result.buying.net_value, Decimal::ZERO);
        assert_eq!(result.buying.gross_value, Decimal::ZERO);
        assert_eq!(result.exchange_rate, Decimal::ONE);
        // price capped, VAT capped at 100%, percentage discount capped at 100%
        assert_eq!(result.selling.base_before_vat, coerce::MAX_AMOUNT / dec!(2));
        assert_eq!(result.selling.incentive_value, Decimal::ZERO);
        assert_eq!(result.selling.net_revenue, coerce::MAX_AMOUNT * dec!(1.5));
    }
}
