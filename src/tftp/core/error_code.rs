use std::fmt;

/// Standard TFTP error codes (RFC 1350, section 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    /// Convert a wire value to a known error code
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileExists),
            7 => Some(Self::NoSuchUser),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// The RFC 1350 message for this code
    pub fn message(self) -> &'static str {
        match self {
            Self::NotDefined => "Not defined, see error message (if any).",
            Self::FileNotFound => "File not found.",
            Self::AccessViolation => "Access violation.",
            Self::DiskFull => "Disk full or allocation exceeded.",
            Self::IllegalOperation => "Illegal TFTP operation.",
            Self::UnknownTransferId => "Unknown transfer ID.",
            Self::FileExists => "File already exists.",
            Self::NoSuchUser => "No such user.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Describe a raw error code received from the wire
///
/// Codes outside the RFC 1350 table are reported as unknown.
pub fn describe(code: u16) -> &'static str {
    ErrorCode::from_u16(code)
        .map(ErrorCode::message)
        .unwrap_or("Unknown error code.")
}
