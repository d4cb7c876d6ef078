//! Why a connection ended.

use std::fmt;

/// Close status sent by the server, grouped the way the client reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: orderly shutdown.
    Normal,
    /// 1001: the server is going away.
    GoingAway,
    /// 1002: the server saw a protocol violation.
    ProtocolError,
    /// 1008: the server rejected the client, e.g. bad credentials.
    PolicyViolation,
    /// 1011: the server hit an internal error.
    InternalError,
    /// 1012: the service is restarting.
    ServiceRestart,
    /// 1013: the server is overloaded.
    TryAgainLater,
    /// 4000-4999: defined by the event service.
    Application(u16),
    /// Anything else.
    Other(u16),
}

impl CloseCode {
    /// The numeric status code.
    pub fn as_u16(&self) -> u16 {
        match *self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::PolicyViolation => 1008,
            Self::InternalError => 1011,
            Self::ServiceRestart => 1012,
            Self::TryAgainLater => 1013,
            Self::Application(code) | Self::Other(code) => code,
        }
    }

    /// Classify a numeric status code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1008 => Self::PolicyViolation,
            1011 => Self::InternalError,
            1012 => Self::ServiceRestart,
            1013 => Self::TryAgainLater,
            4000..=4999 => Self::Application(code),
            _ => Self::Other(code),
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::GoingAway => "going away",
            Self::ProtocolError => "protocol error",
            Self::PolicyViolation => "policy violation",
            Self::InternalError => "internal error",
            Self::ServiceRestart => "service restart",
            Self::TryAgainLater => "try again later",
            Self::Application(_) => "application",
            Self::Other(_) => "other",
        };
        write!(f, "{} {name}", self.as_u16())
    }
}

/// The close frame a connection ended with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// Status code.
    pub code: CloseCode,
    /// Text the server attached, if any.
    pub reason: Option<String>,
}

impl CloseReason {
    /// A close with no text.
    pub fn new(code: CloseCode) -> Self {
        Self { code, reason: None }
    }

    /// A close with attached text. Empty text is treated as none.
    pub fn with_reason(code: CloseCode, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            code,
            reason: (!reason.is_empty()).then_some(reason),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1008), CloseCode::PolicyViolation);
        assert_eq!(CloseCode::from_u16(4403), CloseCode::Application(4403));
        assert_eq!(CloseCode::from_u16(1006), CloseCode::Other(1006));
        assert_eq!(CloseCode::Application(4403).as_u16(), 4403);
    }

    #[test]
    fn test_display() {
        assert_eq!(CloseReason::new(CloseCode::GoingAway).to_string(), "1001 going away");
        assert_eq!(
            CloseReason::with_reason(CloseCode::ServiceRestart, "deploy").to_string(),
            "1012 service restart: deploy"
        );
        assert_eq!(CloseReason::with_reason(CloseCode::Normal, ""), CloseReason::new(CloseCode::Normal));
    }
}
