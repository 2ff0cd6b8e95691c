//! Server response status codes.
//!
//! A RESPONSE frame carries one of these in its length field. Codes the
//! catalogue does not name map to [`ResponseCode::Unknown`].

use std::fmt;

/// Status code carried by a RESPONSE frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ok,
    QuotaLimit,
    IllegalCommand,
    UserNotRegistered,
    UserAlreadyRegistered,
    UserNotAuthenticated,
    NotAllowed,
    DeviceNotInNetwork,
    NoActiveDashboard,
    InvalidToken,
    IllegalCommandBody,
    NoData,
    ServerError,
    EnergyLimit,
    FacebookUserLoginWithPass,
    /// Any integer the catalogue does not name.
    Unknown(u32),
}

impl ResponseCode {
    pub fn from_u32(code: u32) -> Self {
        use ResponseCode::*;
        match code {
            200 => Ok,
            1 => QuotaLimit,
            2 => IllegalCommand,
            3 => UserNotRegistered,
            4 => UserAlreadyRegistered,
            5 => UserNotAuthenticated,
            6 => NotAllowed,
            7 => DeviceNotInNetwork,
            8 => NoActiveDashboard,
            9 => InvalidToken,
            11 => IllegalCommandBody,
            17 => NoData,
            19 => ServerError,
            21 => EnergyLimit,
            22 => FacebookUserLoginWithPass,
            other => Unknown(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        use ResponseCode::*;
        match self {
            Ok => 200,
            QuotaLimit => 1,
            IllegalCommand => 2,
            UserNotRegistered => 3,
            UserAlreadyRegistered => 4,
            UserNotAuthenticated => 5,
            NotAllowed => 6,
            DeviceNotInNetwork => 7,
            NoActiveDashboard => 8,
            InvalidToken => 9,
            IllegalCommandBody => 11,
            NoData => 17,
            ServerError => 19,
            EnergyLimit => 21,
            FacebookUserLoginWithPass => 22,
            Unknown(other) => other,
        }
    }

    /// True for the 200/OK code.
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Unknown(code) => write!(f, "unknown status {code}"),
            other => write!(f, "{other:?} ({})", other.as_u32()),
        }
    }
}
