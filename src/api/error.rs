//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::aggregates::{OrderError, PricingError, ProductError};
use crate::Error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

macro_rules! via_domain {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ApiError {
            fn from(err: $ty) -> Self { Self::Domain(err.into()) }
        })*
    };
}

via_domain!(PricingError, ProductError, OrderError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self { Self::BadRequest(message.into()) }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(err) => match err {
                Error::StoreNotFound | Error::ProductNotFound | Error::OrderNotFound | Error::GatewayNotFound => StatusCode::NOT_FOUND,
                Error::FeatureNotAvailable { .. } => StatusCode::PAYMENT_REQUIRED,
                Error::UsageLimitReached { .. } | Error::GatewayLimitReached => StatusCode::TOO_MANY_REQUESTS,
                Error::InsufficientStock => StatusCode::CONFLICT,
                Error::InvalidQuantity | Error::Validation(_) | Error::Pricing(_) | Error::Product(_) | Error::Order(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                Error::InvalidData(_) | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_failed",
            Self::Domain(err) => match err {
                Error::StoreNotFound | Error::ProductNotFound | Error::OrderNotFound | Error::GatewayNotFound => "not_found",
                Error::FeatureNotAvailable { .. } | Error::UsageLimitReached { .. } | Error::GatewayLimitReached => "upgrade_required",
                Error::InsufficientStock => "insufficient_stock",
                Error::InvalidData(_) | Error::Storage(_) => "internal_error",
                _ => "invalid_request",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": self.code(), "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{BenefitKey, DenialReason, FeatureType};
    use crate::domain::value_objects::LimitValue;

    fn status(err: impl Into<ApiError>) -> StatusCode { err.into().into_response().status() }

    #[test]
    fn test_status_codes() {
        assert_eq!(status(Error::ProductNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(Error::FeatureNotAvailable { benefit: BenefitKey::CustomDomain, reason: DenialReason::BenefitMissing }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status(Error::UsageLimitReached { feature: FeatureType::ImageUpload, used: 10, limit: LimitValue::Count(10) }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status(Error::GatewayLimitReached), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(Error::Pricing(PricingError::Empty)), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(Error::InvalidData("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(ApiError::bad_request("nope")), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_limits_ask_for_upgrade() {
        let response = ApiError::from(Error::UsageLimitReached {
            feature: FeatureType::ImageUpload,
            used: 10,
            limit: LimitValue::Count(10),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "upgrade_required");

        let response = ApiError::from(Error::GatewayLimitReached).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "upgrade_required");
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let response = ApiError::from(Error::InvalidData("benefit banners: bad limit".into())).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "Internal server error");
    }
}
