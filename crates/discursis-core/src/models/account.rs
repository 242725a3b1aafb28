use serde::Deserialize;

/// Outcome of checking or consuming a password reset token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTokenStatus {
    Valid,
    Invalid,
    Expired,
}

/// Body of a 401 from the reset endpoints, e.g. `{"expired": true}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResetTokenRejection {
    #[serde(default)]
    pub expired: bool,
}

impl ResetTokenStatus {
    pub(crate) fn from_rejection(body: &str) -> Self {
        match serde_json::from_str::<ResetTokenRejection>(body) {
            Ok(rejection) if rejection.expired => ResetTokenStatus::Expired,
            _ => ResetTokenStatus::Invalid,
        }
    }
}

/// Token issued by `/login/` and `/register/`
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rejection() {
        assert_eq!(ResetTokenStatus::from_rejection(r#"{"expired": true}"#), ResetTokenStatus::Expired);
        assert_eq!(ResetTokenStatus::from_rejection(r#"{"invalid": true}"#), ResetTokenStatus::Invalid);
        assert_eq!(ResetTokenStatus::from_rejection(r#"{"error": true}"#), ResetTokenStatus::Invalid);
        assert_eq!(ResetTokenStatus::from_rejection("<html>"), ResetTokenStatus::Invalid);
    }
}
