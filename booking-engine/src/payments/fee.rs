/// Basis points in one whole
const BPS_DENOMINATOR: i128 = 10_000;

/// Platform fee in cents: `floor(amount_cents * fee_bps / 10000)`
///
/// Integer arithmetic only. The i128 intermediate cannot overflow for any
/// i64 amount and u32 rate; division truncates toward zero, which equals
/// floor for the non-negative amounts the engine accepts.
pub fn compute_fee(amount_cents: i64, fee_bps: u32) -> i64 {
    let fee = i128::from(amount_cents) * i128::from(fee_bps) / BPS_DENOMINATOR;
    i64::try_from(fee).unwrap_or(if fee > 0 { i64::MAX } else { i64::MIN })
}
