use thiserror::Error;

/// Application-level error carrying the process exit code.
///
/// The numerical engine never returns this type: it reports problems through
/// readiness flags and logging. Only file I/O, exports and argument handling
/// surface as `AppError`.
///
/// Exit codes:
/// - `2`: input/argument/IO problems
/// - `3`: no usable data after loading/validation
/// - `4`: numerical failure (estimation or fit did not become ready)
#[derive(Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message_only() {
        let err = AppError::new(3, "No usable observations.");
        assert_eq!(err.to_string(), "No usable observations.");
        assert_eq!(err.exit_code(), 3);
    }
}
