use thiserror::Error;

use tickhaul_core::{LicenseDenial, PipelineError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("all symbols failed to download ({failed} failures)")]
    Download { failed: usize },

    #[error("failed to write output: {0}")]
    Output(String),

    #[error(transparent)]
    License(#[from] LicenseDenial),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Download { .. } => 3,
            Self::Output(_) => 4,
            Self::License(_) => 5,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Validation(inner) => Self::Validation(inner),
            PipelineError::License(inner) => Self::License(inner),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Output(error.to_string())
    }
}

impl From<csv::Error> for CliError {
    fn from(error: csv::Error) -> Self {
        Self::Output(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_cli_contract() {
        assert_eq!(
            CliError::Validation(ValidationError::EmptySymbolSet).exit_code(),
            2
        );
        assert_eq!(CliError::Download { failed: 3 }.exit_code(), 3);
        assert_eq!(CliError::Output(String::from("disk full")).exit_code(), 4);
    }
}
