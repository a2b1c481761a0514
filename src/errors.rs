use thiserror::Error;

pub struct ErrorCode;

impl ErrorCode {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SERVER_ERROR_MIN: i64 = -32099;
    pub const SERVER_ERROR_MAX: i64 = -32000;

    pub fn default_message(code: i64) -> &'static str {
        match code {
            Self::PARSE_ERROR => "Parse error",
            Self::INVALID_REQUEST => "Invalid Request",
            Self::METHOD_NOT_FOUND => "Method not found",
            Self::INVALID_PARAMS => "Invalid params",
            Self::INTERNAL_ERROR => "Internal error",
            -32099..=-32000 => "Server error",
            _ => "Unknown error",
        }
    }
}

/// Local errors from registry and handle management. These never appear
/// inside a JSON-RPC envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("handle not initialized")]
    HandleNotInitialized,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("method not found: {0}")]
    NotFound(String),
    #[error("allocation failed")]
    AllocationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    OkNotification,
    HandleNotInitialized,
    InvalidArgument,
    NotFound,
    AllocationFailed,
    ParseFailed,
    EmptyRequest,
    NotObjectOrArray,
    IdTypeError,
    VersionError,
    NoMethodMember,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::OkNotification)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::OkNotification => "ok_notification",
            Self::HandleNotInitialized => "handle_not_initialized",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AllocationFailed => "allocation_failed",
            Self::ParseFailed => "parse_failed",
            Self::EmptyRequest => "empty_request",
            Self::NotObjectOrArray => "not_object_or_array",
            Self::IdTypeError => "id_type_error",
            Self::VersionError => "version_error",
            Self::NoMethodMember => "no_method_member",
        }
    }
}

impl From<&RpcError> for Status {
    fn from(err: &RpcError) -> Self {
        match err {
            RpcError::HandleNotInitialized => Self::HandleNotInitialized,
            RpcError::InvalidArgument(_) => Self::InvalidArgument,
            RpcError::NotFound(_) => Self::NotFound,
            RpcError::AllocationFailed => Self::AllocationFailed,
        }
    }
}

impl From<Result<(), RpcError>> for Status {
    fn from(result: Result<(), RpcError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(err) => Self::from(&err),
        }
    }
}
