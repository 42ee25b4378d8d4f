use crate::SessionError;

/// Code presented by a caller to unlock mutating operations.
#[derive(Clone, Debug, Default)]
pub struct AccessCode(String);

impl AccessCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Option<String>> for AccessCode {
    fn from(code: Option<String>) -> Self {
        code.map(AccessCode::new).unwrap_or_default()
    }
}

/// With an expected code configured, the caller's code must match it.
/// Without one, any non-empty code unlocks.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    expected: Option<String>,
}

impl AccessPolicy {
    pub fn new(expected: Option<String>) -> Self {
        let expected = expected
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());
        Self { expected }
    }

    pub fn check(&self, code: &AccessCode, operation: &str) -> Result<(), SessionError> {
        if code.is_empty() {
            return Err(SessionError::Unauthorized(format!(
                "an access code is required to {operation}"
            )));
        }
        match &self.expected {
            Some(expected) if *expected != code.0 => Err(SessionError::Unauthorized(format!(
                "wrong access code for {operation}"
            ))),
            _ => Ok(()),
        }
    }
}
