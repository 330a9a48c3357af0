use thiserror::Error;

use crate::{pricing::PriceResolutionError, provider_types::PayloadError, traits::PaymentGatewayError};

#[derive(Debug, Clone, Error)]
pub enum EventFlowError {
    #[error("Database error. {0}")]
    Database(#[from] PaymentGatewayError),
    #[error("Price resolution failed. {0}")]
    PriceResolution(#[from] PriceResolutionError),
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),
}
