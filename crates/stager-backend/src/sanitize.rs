use stager_schema::StagingError;

pub const STAGING_ERROR_ID: &str = "StagingError";
pub const INSUFFICIENT_RESOURCES_ID: &str = "InsufficientResources";
pub const NO_COMPATIBLE_CELL_ID: &str = "NoCompatibleCell";

const INSUFFICIENT_RESOURCES_MESSAGE: &str = "insufficient resources";
const NO_COMPATIBLE_CELL_MESSAGE: &str = "found no compatible cell";
const MISSING_APP_BITS_MESSAGE: &str = "missing app bits download uri";
const GENERIC_MESSAGE: &str = "staging failed";

/// Default sanitizer: known placement and request failures keep their
/// message, everything else collapses to a generic "staging failed".
pub fn sanitize_error_message(message: &str) -> StagingError {
    let normalized = message.trim().to_lowercase();
    if normalized == INSUFFICIENT_RESOURCES_MESSAGE {
        StagingError::new(INSUFFICIENT_RESOURCES_ID, message.trim())
    } else if normalized == NO_COMPATIBLE_CELL_MESSAGE {
        StagingError::new(NO_COMPATIBLE_CELL_ID, message.trim())
    } else if normalized.ends_with(MISSING_APP_BITS_MESSAGE) {
        StagingError::new(STAGING_ERROR_ID, message.trim())
    } else {
        StagingError::new(STAGING_ERROR_ID, GENERIC_MESSAGE)
    }
}
