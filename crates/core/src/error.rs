#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Amount is not a finite number: {0}")]
    NonFiniteAmount(f64),

    #[error("Amount does not fit in minor units: {0}")]
    AmountOutOfRange(f64),
}
