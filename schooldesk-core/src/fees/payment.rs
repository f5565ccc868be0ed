use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::fee_record::{FeeAdjustment, PaymentDetails};
use crate::models::{FeeRecord, FeeStatus};
use crate::store::FeeRecordStore;

/// Overrides the discount and additional charges of a fee.
///
/// Both amounts are absolute, so repeating the same adjustment is a no-op.
/// Paid fees may still be adjusted.
pub async fn adjust_fee<S: FeeRecordStore>(
    store: &S,
    id: Uuid,
    adjustment: FeeAdjustment,
) -> AppResult<FeeRecord> {
    let fee = store
        .find_fee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    adjustment.validate_for(fee.base_fee_amount)?;

    let updated = store
        .update_adjustment(id, &adjustment)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    info!(
        fee_id = %id,
        base = %updated.base_fee_amount,
        discount = %updated.total_discount,
        charges = %updated.additional_charges,
        final_amount = %updated.final_amount,
        "Adjusted fee"
    );
    Ok(updated)
}

/// Records the payment of a fee.
///
/// # Errors
///
/// * [`AppError::NotFound`] if the fee does not exist
/// * [`AppError::AlreadyPaid`] if it was paid before, including by a
///   concurrent request that won the conditional update
/// * [`AppError::Validation`] if the fee was cancelled
pub async fn record_payment<S: FeeRecordStore>(
    store: &S,
    id: Uuid,
    payment: PaymentDetails,
) -> AppResult<FeeRecord> {
    let fee = store
        .find_fee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    if fee.is_paid {
        return Err(AppError::AlreadyPaid);
    }
    if fee.status == FeeStatus::Cancelled {
        return Err(AppError::Validation(
            "Cannot record a payment for a cancelled fee".into(),
        ));
    }

    let paid = match store.record_payment(id, &payment, Utc::now()).await? {
        Some(fee) => fee,
        None => {
            warn!(fee_id = %id, "Fee was paid concurrently");
            return Err(AppError::AlreadyPaid);
        }
    };

    info!(
        fee_id = %id,
        invoice_number = %paid.invoice_number,
        method = %payment.method,
        "Recorded payment"
    );
    Ok(paid)
}
