//! HTTP to DIMSE status mapping
//!
//! A STOW-RS request that fails as a whole carries only an HTTP status. It
//! is folded into the DIMSE status space here so both protocols report
//! through the same [`TransmissionResult`](super::TransmissionResult).
//!
//! - `0x0124`: Not authorized
//! - `0xA801`: No such object instance (404-like)
//! - `0xA700-0xA702`: Resource limitations
//! - `0xC000`: Cannot understand (400-like)
//! - `0x0110`: Processing failure (500-like)

use dimse::DimseStatus;

/// Maps an HTTP status code to a DIMSE status
pub fn http_status_to_dimse(http_status: u16) -> DimseStatus {
    match http_status {
        200..=299 => DimseStatus::Success,

        400 => DimseStatus::Failure(0xC000), // Cannot understand
        401 | 403 => DimseStatus::Failure(0x0124), // Not authorized
        404 | 410 => DimseStatus::Failure(0xA801), // No such object instance
        405 => DimseStatus::Failure(0x0111), // Duplicate SOP instance
        408 => DimseStatus::Failure(0x0122), // SOP class not supported
        409 => DimseStatus::Failure(0x0119), // Class-instance conflict
        413 | 507 => DimseStatus::Failure(0xA700), // Out of resources
        415 => DimseStatus::Failure(0xA900), // Data set does not match SOP class
        429 => DimseStatus::Failure(0xA702), // Resource limitation

        500 => DimseStatus::Failure(0x0110), // Processing failure
        501 => DimseStatus::Failure(0x0112), // No such SOP instance
        502..=504 => DimseStatus::Failure(0xA701), // Unable to process

        _ if (400..500).contains(&http_status) => DimseStatus::Failure(0xC000),
        _ => DimseStatus::Failure(0x0110),
    }
}

/// Failures that may clear up on their own
pub fn is_retriable_code(code: u16) -> bool {
    matches!(code, 0xA700 | 0xA701 | 0xA702 | 0x0122)
}
