//! # Reply
//!
//! Classification of control channel replies by their first digit

use suppaftp::types::Response;
use suppaftp::{FtpError, FtpResult, Status};

/// Reply class, as defined in RFC 959 section 4.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1xx
    Preliminary,
    /// 2xx
    Completion,
    /// 3xx
    Intermediate,
    /// 4xx
    TransientNegative,
    /// 5xx
    PermanentNegative,
    /// Code the client library could not map
    Unknown,
}

impl From<Status> for ReplyClass {
    fn from(status: Status) -> Self {
        match status.code() / 100 {
            1 => Self::Preliminary,
            2 => Self::Completion,
            3 => Self::Intermediate,
            4 => Self::TransientNegative,
            5 => Self::PermanentNegative,
            _ => Self::Unknown,
        }
    }
}

impl ReplyClass {
    pub fn of(response: &Response) -> Self {
        Self::from(response.status)
    }
}

/// Turn the outcome of a raw command into the reply the server sent.
///
/// The client library reports a reply outside of the expected codes as [`FtpError::UnexpectedResponse`];
/// here that reply is handed back so the caller can judge it by class.
pub fn reply_of(result: FtpResult<Response>) -> FtpResult<Response> {
    match result {
        Ok(response) => Ok(response),
        Err(FtpError::UnexpectedResponse(response)) => Ok(response),
        Err(err) => Err(err),
    }
}
