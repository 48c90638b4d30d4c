use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::fmt;
use shelf_storage::secure_eq;

const SCHEME: &str = "Basic";

#[shelf_derive::shelf_error]
pub enum SecurityError {
    #[error("Malformed credentials{}: {message}", format_context(.context))]
    Malformed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl SecurityError {
    fn malformed(message: &'static str) -> Self {
        Self::Malformed { message: message.into(), context: None }
    }
}

/// A decoded `Authorization: Basic` pair.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    /// Parses the full header value, e.g. `Basic YWxpY2U6czNjcmV0`.
    ///
    /// The scheme is matched case-insensitively. The password is everything after the first
    /// `:`, so it may itself contain colons.
    ///
    /// # Errors
    /// Returns [`SecurityError::Malformed`] for another scheme, invalid base64, non-UTF-8
    /// payloads or a payload without `:`.
    pub fn from_header(value: &str) -> Result<Self, SecurityError> {
        let (scheme, encoded) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| SecurityError::malformed("missing authorization scheme"))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(SecurityError::malformed("authorization scheme is not Basic"));
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SecurityError::malformed("credentials are not valid base64"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| SecurityError::malformed("credentials are not UTF-8"))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| SecurityError::malformed("credentials lack a ':' separator"))?;

        Ok(Self { username: username.to_owned(), password: password.to_owned() })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Compares both halves in constant time; both comparisons always run.
    #[must_use]
    #[allow(clippy::needless_bitwise_bool)]
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = secure_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = secure_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_header() {
        let creds = BasicCredentials::from_header("Basic YWxpY2U6czNjcmV0").unwrap();
        assert_eq!(creds.username(), "alice");
        assert_eq!(creds.password(), "s3cret");

        let lower = BasicCredentials::from_header("basic YWRtaW46YWRtaW4=").unwrap();
        assert!(lower.matches("admin", "admin"));
    }

    #[test]
    fn password_keeps_later_colons_and_may_be_empty() {
        let creds = BasicCredentials::from_header("Basic Ym9iOnBhOnNz").unwrap();
        assert_eq!(creds.password(), "pa:ss");

        let empty = BasicCredentials::from_header("Basic YWxpY2U6").unwrap();
        assert_eq!(empty.password(), "");
    }

    #[test]
    fn rejects_malformed_headers() {
        for value in ["", "Basic", "Bearer YWxpY2U6czNjcmV0", "Basic !!!", "Basic bm9jb2xvbg=="] {
            assert!(BasicCredentials::from_header(value).is_err(), "{value:?} should be rejected");
        }
    }

    #[test]
    fn debug_redacts_password() {
        let creds = BasicCredentials::from_header("Basic YWxpY2U6czNjcmV0").unwrap();
        assert!(!format!("{creds:?}").contains("s3cret"));
    }
}
