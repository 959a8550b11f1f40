use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::BridgeError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl BridgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::LineValidation { .. } | Self::InvalidRequest(_) | Self::UnknownStatus(_) | Self::Csv(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::VendorNotFound(_)
            | Self::NoLocationAvailable
            | Self::PurchaseOrderNotFound(_)
            | Self::LineNotFound(_) => StatusCode::NOT_FOUND,
            Self::ExternalApi { .. } | Self::MissingLocationHeader(_) => StatusCode::BAD_GATEWAY,
            Self::ExternalTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self, status: StatusCode) {
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, retryable = self.is_retryable(), "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log(status);
        let (index, field) = match &self {
            Self::LineValidation { index, field } => (Some(*index), Some(field.as_str())),
            _ => (None, None),
        };
        let body = ErrorBody {
            error: self.to_string(),
            index,
            field,
        };
        (status, Json(body)).into_response()
    }
}

/// Failure for the CSV upload endpoints, which answer in plain text.
#[derive(Debug)]
pub struct UploadError(pub BridgeError);

impl From<BridgeError> for UploadError {
    fn from(e: BridgeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        self.0.log(status);
        (status, format!("Failed to import CSV: {}", self.0)).into_response()
    }
}
