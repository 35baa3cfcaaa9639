use shared::protocol::PayCommandInput;

use crate::error::ValidationError;

/// Smallest amount accepted for tokens that are not fee-exempt.
pub const MIN_PAYMENT_AMOUNT: f64 = 0.1;

pub fn validate_payment(input: &PayCommandInput) -> Result<(), ValidationError> {
    if !input.token_symbol.is_fee_exempt() && input.amount < MIN_PAYMENT_AMOUNT {
        return Err(ValidationError::AmountBelowMinimum {
            token: input.token_symbol.as_str().to_string(),
            amount: input.amount,
            minimum: MIN_PAYMENT_AMOUNT,
        });
    }
    Ok(())
}
