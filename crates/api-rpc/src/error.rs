//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use entitle_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::json;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const UNKNOWN_JOB_KEY: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
///
/// Validation errors carry the offending argument name and constraint
/// rejections carry the conflicting job ids as `data`.
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let msg = err.to_string();
    match err {
        AppError::ConfigValidation(e) => match e.argument() {
            Some(argument) => ErrorObjectOwned::owned(
                code::VALIDATION_ERROR,
                msg,
                Some(json!({ "argument": argument })),
            ),
            None => ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>),
        },
        AppError::ArgumentConversion(_) | AppError::Serialization(_) | AppError::Domain(_) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(_) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::ConstraintRejected(violation) => ErrorObjectOwned::owned(
            code::CONFLICT,
            msg,
            Some(json!({ "conflicting_job_ids": violation.conflicting })),
        ),
        AppError::InvalidState(_) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::UnknownJobKey(_) => {
            ErrorObjectOwned::owned(code::UNKNOWN_JOB_KEY, msg, None::<()>)
        }
        AppError::Database(_) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>)
        }
    }
}
