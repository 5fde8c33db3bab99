use std::fmt;

use super::status_mapper;

/// What became of one record, or of a whole batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionResult {
    Success,
    /// Stored with a caveat
    Warning { code: u16, meaning: String },
    /// Refused by the destination, or a session that could not be used
    Failure { code: u16, meaning: String },
    /// A status outside every known band, or none reported for the record
    Unknown { code: Option<u16> },
    /// The destination never answered
    NoResponse,
}

impl TransmissionResult {
    /// Classify a raw DIMSE status
    pub fn from_status(code: u16) -> Self {
        match code {
            0x0000 => TransmissionResult::Success,
            0xB000..=0xBFFF | 0x0001 | 0x0107 | 0x0116 => TransmissionResult::Warning {
                code,
                meaning: status_meaning(code).to_string(),
            },
            0xC000..=0xFFFF => TransmissionResult::Failure {
                code,
                meaning: status_meaning(code).to_string(),
            },
            _ if is_known_failure(code) => TransmissionResult::Failure {
                code,
                meaning: status_meaning(code).to_string(),
            },
            _ => TransmissionResult::Unknown { code: Some(code) },
        }
    }

    pub fn failure(code: u16, meaning: impl Into<String>) -> Self {
        TransmissionResult::Failure {
            code,
            meaning: meaning.into(),
        }
    }

    /// Stored, with or without a warning
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            TransmissionResult::Success | TransmissionResult::Warning { .. }
        )
    }

    /// Worth another attempt by the caller
    pub fn is_retriable(&self) -> bool {
        match self {
            TransmissionResult::NoResponse => true,
            TransmissionResult::Failure { code, .. } => status_mapper::is_retriable_code(*code),
            _ => false,
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            TransmissionResult::Success => Some(0x0000),
            TransmissionResult::Warning { code, .. } | TransmissionResult::Failure { code, .. } => {
                Some(*code)
            }
            TransmissionResult::Unknown { code } => *code,
            TransmissionResult::NoResponse => None,
        }
    }
}

impl fmt::Display for TransmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmissionResult::Success => write!(f, "Success"),
            TransmissionResult::Warning { code, meaning } => {
                write!(f, "Warning 0x{:04X}: {}", code, meaning)
            }
            TransmissionResult::Failure { code, meaning } => {
                write!(f, "Failure 0x{:04X}: {}", code, meaning)
            }
            TransmissionResult::Unknown { code: Some(code) } => write!(f, "Unknown status 0x{:04X}", code),
            TransmissionResult::Unknown { code: None } => write!(f, "No status reported"),
            TransmissionResult::NoResponse => write!(f, "No response"),
        }
    }
}

fn is_known_failure(code: u16) -> bool {
    matches!(
        code,
        0x0105
            | 0x0106
            | 0x0110..=0x0112
            | 0x0117..=0x0119
            | 0x0122
            | 0x0124
            | 0x0210..=0x0212
            | 0xA700..=0xA7FF
            | 0xA801
            | 0xA900..=0xA9FF
    )
}

/// Human readable meaning of a C-STORE status (PS3.4 B.2.3, PS3.7 C)
pub fn status_meaning(code: u16) -> &'static str {
    match code {
        0x0000 => "Success",
        0x0001 => "Warning",
        0x0105 => "No such attribute",
        0x0106 => "Invalid attribute value",
        0x0107 => "Attribute list error",
        0x0110 => "Processing failure",
        0x0111 => "Duplicate SOP instance",
        0x0112 => "No such SOP instance",
        0x0116 => "Attribute value out of range",
        0x0117 => "Invalid SOP instance",
        0x0118 => "No such SOP class",
        0x0119 => "Class-instance conflict",
        0x0122 => "SOP class not supported",
        0x0124 => "Not authorized",
        0x0210 => "Duplicate invocation",
        0x0211 => "Unrecognized operation",
        0x0212 => "Mistyped argument",
        0xA700..=0xA7FF => "Refused: Out of resources",
        0xA801 => "Refused: No such object instance",
        0xA900..=0xA9FF => "Error: Data set does not match SOP class",
        0xB000 => "Coercion of data elements",
        0xB006 => "Elements discarded",
        0xB007 => "Data set does not match SOP class",
        0xB001..=0xBFFF => "Warning",
        0xC000..=0xCFFF => "Error: Cannot understand",
        0xFE00 => "Cancel",
        0xFF00 | 0xFF01 => "Pending",
        _ => "Unknown status",
    }
}
