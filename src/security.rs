//! C2: access permissions — comparing an attribute's access requirements against a link's current
//! security snapshot.
//!
//! The Security Manager itself (pairing, bonding, key exchange) is out of scope for this crate;
//! only the resulting security level and a couple of link properties are consumed here.

use crate::error::ErrorCode;

/// The security ladder a link can be at, monotonically increasing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoSecurity,
    Encrypted,
    Authenticated,
}

/// A snapshot of the current link's security state, as reported by the Security Manager /
/// L2CAP layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkSecurity {
    pub level: SecurityLevel,
    /// Encryption key size in bytes, meaningless unless `level >= Encrypted`.
    pub enc_key_size: u8,
}

impl LinkSecurity {
    pub fn unencrypted() -> Self {
        LinkSecurity { level: SecurityLevel::NoSecurity, enc_key_size: 0 }
    }
}

impl Default for LinkSecurity {
    fn default() -> Self {
        Self::unencrypted()
    }
}

/// An attribute's access requirements for one operation (read or write).
///
/// The default denies access, matching the spec's "default value denies access" invariant: a
/// freshly constructed `AccessRequirements` lets nothing through until explicitly relaxed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRequirements {
    pub allowed: bool,
    pub encryption_required: bool,
    pub authentication_required: bool,
    pub authorization_required: bool,
    pub min_encryption_key_size: u8,
}

impl Default for AccessRequirements {
    fn default() -> Self {
        AccessRequirements {
            allowed: false,
            encryption_required: false,
            authentication_required: false,
            authorization_required: false,
            min_encryption_key_size: 0,
        }
    }
}

impl AccessRequirements {
    /// No security required, simply allowed. Used for group declaration attributes.
    pub fn open() -> Self {
        AccessRequirements { allowed: true, ..Default::default() }
    }

    pub fn denied() -> Self {
        Self::default()
    }
}

/// Which operation is being checked, so the "not permitted" error can be named correctly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Check `reqs` against `link_security` for `op`. Returns `None` when access is permitted, or
/// `Some(code)` with the ATT error code to report otherwise.
///
/// This is C2 from the specification; the five numbered steps below correspond 1:1 to §4.2.
pub fn check(reqs: &AccessRequirements, link_security: LinkSecurity, op: Operation) -> Option<ErrorCode> {
    // 1.
    if !reqs.allowed {
        return Some(match op {
            Operation::Read => ErrorCode::ReadNotPermitted,
            Operation::Write => ErrorCode::WriteNotPermitted,
        });
    }

    // 2. Insufficient-encryption (bonded-but-unencrypted) is not distinguished from
    // insufficient-authentication by this implementation; both map to InsufficientAuthentication.
    if reqs.encryption_required && link_security.level < SecurityLevel::Encrypted {
        return Some(ErrorCode::InsufficientAuthentication);
    }

    // 3.
    if (reqs.authentication_required || reqs.authorization_required)
        && link_security.level < SecurityLevel::Authenticated
    {
        return Some(ErrorCode::InsufficientAuthentication);
    }

    // 4.
    if reqs.encryption_required && link_security.enc_key_size < reqs.min_encryption_key_size {
        return Some(ErrorCode::InsufficientEncryptionKeySize);
    }

    // 5.
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_denies_access() {
        assert_eq!(AccessRequirements::default(), AccessRequirements::denied());
        let link = LinkSecurity { level: SecurityLevel::Authenticated, enc_key_size: 16 };
        assert_eq!(check(&AccessRequirements::denied(), link, Operation::Read), Some(ErrorCode::ReadNotPermitted));
    }

    #[test]
    fn open_access_on_unencrypted_link_succeeds() {
        let link = LinkSecurity::unencrypted();
        assert_eq!(check(&AccessRequirements::open(), link, Operation::Read), None);
    }

    #[test]
    fn encryption_required_on_unencrypted_link_fails() {
        let reqs = AccessRequirements { allowed: true, encryption_required: true, ..Default::default() };
        let link = LinkSecurity::unencrypted();
        assert_eq!(check(&reqs, link, Operation::Write), Some(ErrorCode::InsufficientAuthentication));
    }

    #[test]
    fn authentication_required_needs_authenticated_link() {
        let reqs = AccessRequirements { allowed: true, authentication_required: true, ..Default::default() };
        let encrypted = LinkSecurity { level: SecurityLevel::Encrypted, enc_key_size: 16 };
        assert_eq!(check(&reqs, encrypted, Operation::Read), Some(ErrorCode::InsufficientAuthentication));

        let authenticated = LinkSecurity { level: SecurityLevel::Authenticated, enc_key_size: 16 };
        assert_eq!(check(&reqs, authenticated, Operation::Read), None);
    }

    #[test]
    fn min_key_size_checked_after_security_level() {
        let reqs = AccessRequirements {
            allowed: true,
            encryption_required: true,
            min_encryption_key_size: 16,
            ..Default::default()
        };
        let weak = LinkSecurity { level: SecurityLevel::Encrypted, enc_key_size: 7 };
        assert_eq!(check(&reqs, weak, Operation::Write), Some(ErrorCode::InsufficientEncryptionKeySize));

        let strong = LinkSecurity { level: SecurityLevel::Encrypted, enc_key_size: 16 };
        assert_eq!(check(&reqs, strong, Operation::Write), None);
    }

    #[test]
    fn security_ladder_is_ordered() {
        assert!(SecurityLevel::NoSecurity < SecurityLevel::Encrypted);
        assert!(SecurityLevel::Encrypted < SecurityLevel::Authenticated);
    }
}
