//! Database queries for commercial records.

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{kind_label, CommercialRecord, CommercialRecordRow};

const RECORD_COLUMNS: &str = r#"
    id, booking_id,
    buying_currency, buying_amount, commissionable, commission_type, commission_value,
    buying_vat_included, buying_vat_percent, additional_costs,
    selling_currency, selling_price, incentive, incentive_type, incentive_value,
    selling_vat_included, selling_vat_percent, discounts,
    exchange_rate, auto_calculate_rate, version, updated_at
"#;

/// Get the commercial record of a booking, if any
pub async fn find_by_booking(
    pool: &PgPool,
    booking_id: Uuid,
) -> Result<Option<CommercialRecordRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM commercial_records WHERE booking_id = $1",
        RECORD_COLUMNS
    );
    sqlx::query_as::<_, CommercialRecordRow>(&sql)
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

/// Current version of a record, if it still exists
pub async fn current_version(pool: &PgPool, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT version FROM commercial_records WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert a new record at version 1
pub async fn insert_record(
    pool: &PgPool,
    id: Uuid,
    booking_id: Uuid,
    record: &CommercialRecord,
    additional_costs: &str,
    discounts: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO commercial_records (
            id, booking_id,
            buying_currency, buying_amount, commissionable, commission_type, commission_value,
            buying_vat_included, buying_vat_percent, additional_costs,
            selling_currency, selling_price, incentive, incentive_type, incentive_value,
            selling_vat_included, selling_vat_percent, discounts,
            exchange_rate, auto_calculate_rate, version, updated_at
        )
        VALUES (
            $1, $2,
            $3, $4, $5, $6, $7,
            $8, $9, $10,
            $11, $12, $13, $14, $15,
            $16, $17, $18,
            $19, $20, 1, now()
        )
        "#,
    )
    .bind(id)
    .bind(booking_id)
    .bind(&record.buying.currency)
    .bind(record.buying.amount)
    .bind(record.buying.commissionable)
    .bind(kind_label(record.buying.commission_type))
    .bind(record.buying.commission_value)
    .bind(record.buying.vat_included)
    .bind(record.buying.vat_percent)
    .bind(additional_costs)
    .bind(&record.selling.currency)
    .bind(record.selling.price)
    .bind(record.selling.incentive)
    .bind(kind_label(record.selling.incentive_type))
    .bind(record.selling.incentive_value)
    .bind(record.selling.vat_included)
    .bind(record.selling.vat_percent)
    .bind(discounts)
    .bind(record.exchange_rate)
    .bind(record.auto_calculate_rate)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a record if it is still at `expected_version`.
///
/// Returns the new version, or `None` when the version did not match (or
/// the record is gone).
pub async fn update_record(
    pool: &PgPool,
    id: Uuid,
    expected_version: i32,
    record: &CommercialRecord,
    additional_costs: &str,
    discounts: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE commercial_records
        SET buying_currency = $3,
            buying_amount = $4,
            commissionable = $5,
            commission_type = $6,
            commission_value = $7,
            buying_vat_included = $8,
            buying_vat_percent = $9,
            additional_costs = $10,
            selling_currency = $11,
            selling_price = $12,
            incentive = $13,
            incentive_type = $14,
            incentive_value = $15,
            selling_vat_included = $16,
            selling_vat_percent = $17,
            discounts = $18,
            exchange_rate = $19,
            auto_calculate_rate = $20,
            version = version + 1,
            updated_at = now()
        WHERE id = $1
          AND version = $2
        RETURNING version
        "#,
    )
    .bind(id)
    .bind(expected_version)
    .bind(&record.buying.currency)
    .bind(record.buying.amount)
    .bind(record.buying.commissionable)
    .bind(kind_label(record.buying.commission_type))
    .bind(record.buying.commission_value)
    .bind(record.buying.vat_included)
    .bind(record.buying.vat_percent)
    .bind(additional_costs)
    .bind(&record.selling.currency)
    .bind(record.selling.price)
    .bind(record.selling.incentive)
    .bind(kind_label(record.selling.incentive_type))
    .bind(record.selling.incentive_value)
    .bind(record.selling.vat_included)
    .bind(record.selling.vat_percent)
    .bind(discounts)
    .bind(record.exchange_rate)
    .bind(record.auto_calculate_rate)
    .fetch_optional(pool)
    .await
}

/// Point a booking at its commercial record. Returns the number of bookings
/// touched (0 when the booking does not exist).
pub async fn link_booking(
    pool: &PgPool,
    record_id: Uuid,
    booking_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET commercial_record_id = $1
        WHERE id = $2
        "#,
    )
    .bind(record_id)
    .bind(booking_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
