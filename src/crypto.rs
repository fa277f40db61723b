//! Constant-time comparison primitives.
//!
//! Credential verification must not reveal, through timing, where a
//! candidate digest diverges from the stored one. Equality checks on secret
//! material therefore go through the `subtle` crate instead of `==`.

use subtle::ConstantTimeEq;

/// Compares two byte slices in constant time.
///
/// `==` on slices short-circuits at the first mismatching byte, which lets a
/// caller measure response times and recover a secret one byte at a time.
/// `subtle`'s comparison touches every byte regardless of where (or whether)
/// the inputs differ. Inputs of different lengths compare unequal, also in
/// time independent of content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time equality for strings.
///
/// Convenience wrapper over [`constant_time_eq`] for textual secrets.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_inputs_match() {
        assert!(constant_time_eq(b"digest-bytes", b"digest-bytes"));
        assert!(constant_time_str_eq("token", "token"));
    }

    #[test]
    fn different_inputs_do_not_match() {
        assert!(!constant_time_eq(b"digest-bytes", b"digest-bytez"));
        assert!(!constant_time_str_eq("token", "nekot"));
    }

    #[test]
    fn length_mismatch_is_unequal() {
        assert!(!constant_time_eq(b"short", b"much longer input"));
    }

    #[test]
    fn empty_inputs_are_equal() {
        assert!(constant_time_eq(b"", b""));
    }
}
