use std::fmt;
use tracing::warn;

use crate::oracle::Oracle;
use crate::types::{ImprovementFeedback, ImprovementRequest, ValidationError};

#[derive(Debug)]
pub enum ImprovementError {
    Invalid(ValidationError),
    Submission(anyhow::Error),
}

impl fmt::Display for ImprovementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImprovementError::Invalid(err) => write!(f, "{}", err),
            ImprovementError::Submission(_) => {
                f.write_str("Failed to submit translation improvement.")
            }
        }
    }
}

impl std::error::Error for ImprovementError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImprovementError::Invalid(err) => Some(err),
            ImprovementError::Submission(err) => Some(&**err),
        }
    }
}

/// Validates a correction triple and forwards it to the oracle.
pub async fn submit_improvement(
    oracle: &dyn Oracle,
    request: &ImprovementRequest,
) -> Result<ImprovementFeedback, ImprovementError> {
    request.validate().map_err(ImprovementError::Invalid)?;
    oracle.improve_translation(request).await.map_err(|err| {
        warn!("improvement submission failed: {:#}", err);
        ImprovementError::Submission(err)
    })
}
