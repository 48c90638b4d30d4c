use std::fmt;
use subtle::ConstantTimeEq;

/// File name of the per-owner shared secret, relative to `root/<owner>/`.
pub const MACHINE_ID_FILE: &str = "machine-id";

/// Constant-time byte comparison. A length mismatch still runs a dummy comparison of the same
/// cost, so timing does not reveal the expected length.
#[must_use]
pub fn secure_eq(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    expected.ct_eq(presented).into()
}

/// Per-owner upload secret stored at `root/<owner>/machine-id`.
///
/// Created once on registration and never rotated. Custom `Debug` redacts the value to keep it
/// out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineCredential(String);

impl MachineCredential {
    /// A fresh random credential (UUID v4 text).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps a stored value, trimming surrounding whitespace and the trailing newline.
    #[must_use]
    pub fn from_stored(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// On-disk representation: the value followed by a newline.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        format!("{}\n", self.0)
    }

    /// Constant-time comparison against a presented secret.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        secure_eq(self.0.as_bytes(), presented.as_bytes())
    }
}

impl fmt::Debug for MachineCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MachineCredential").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_value_is_trimmed() {
        let cred = MachineCredential::from_stored("  3f2c\n");
        assert_eq!(cred.expose(), "3f2c");
        assert_eq!(cred.to_file_contents(), "3f2c\n");
    }

    #[test]
    fn matches_only_exact_secret() {
        let cred = MachineCredential::from_stored("secret-value");
        assert!(cred.matches("secret-value"));
        assert!(!cred.matches("secret-valuE"));
        assert!(!cred.matches("secret"));
        assert!(!cred.matches(""));
    }

    #[test]
    fn secure_eq_compares_whole_input() {
        assert!(secure_eq(b"machine-id", b"machine-id"));
        assert!(!secure_eq(b"machine-id", b"machine-iD"));
        assert!(!secure_eq(b"machine-id", b"machine"));
        assert!(!secure_eq(b"", b"x"));
    }

    #[test]
    fn debug_is_redacted() {
        let cred = MachineCredential::generate();
        assert!(!format!("{cred:?}").contains(cred.expose()));
        assert_eq!(cred.expose().len(), 36);
    }
}
