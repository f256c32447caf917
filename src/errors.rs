use thiserror::Error;

use crate::mcp::rpc::{
    RpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    RESOURCE_NOT_FOUND,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("File not found: {0}")]
    ResourceNotFound(String),
    #[error("Server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound(message.into())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::ResourceNotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        if let AppError::Internal(message) = &err {
            tracing::error!(error = %message, "request failed with internal error");
        }

        RpcError::new(err.code(), err.to_string())
    }
}
