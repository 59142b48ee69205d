use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::Error;

/// API错误类型
pub struct AppError(pub StatusCode, pub anyhow::Error);

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    pub fn unauthorized() -> Self {
        Self(StatusCode::UNAUTHORIZED, anyhow::anyhow!("token 无效"))
    }

    pub fn bad_request(err: anyhow::Error) -> Self {
        Self(StatusCode::BAD_REQUEST, err)
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self(StatusCode::NOT_FOUND, anyhow::anyhow!("{what} 不存在"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, format!("Something went wrong: {}", self.1)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        // 请求本身有问题的错误返回 400
        let status = match err.downcast_ref::<Error>() {
            Some(Error::MissingBoundingBox(_) | Error::Dimension { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, err)
    }
}
