//! Permission sets.
//!
//! Permissions are single letter codes, e.g. `r`ead, `w`rite, `c`reate, `d`elete, `s`earch and
//! e`x`ecute. Which letters carry which meaning is up to the deployment, the only requirement is
//! that they are ASCII letters. A set is stored as a bitmask with one bit per letter.

use log::warn;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A set of single letter permission codes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PermissionSet(u64);

impl PermissionSet {

    /// The empty set. Every set covers it.
    pub const EMPTY: PermissionSet = PermissionSet(0);

    fn bit(c: char) -> Result<u64, Error> {
        match c {
            'a'..='z' => Ok(1 << (c as u32 - 'a' as u32)),
            'A'..='Z' => Ok(1 << (26 + c as u32 - 'A' as u32)),
            _         => {
                warn!("invalid permission code: {:?}", c);
                Err(Error::InvalidPermission(c))
            }, // _
        } // match
    } // bit

    /// Parses a string of permission letters. Duplicates are ignored, any non letter is an error.
    pub fn parse(codes: &str) -> Result<Self, Error> {
        let mut mask = 0;

        for c in codes.chars() {
            mask |= Self::bit(c)?;
        } // for
        Ok(PermissionSet(mask))
    } // parse

    /// Returns true if `code` is part of this set.
    pub fn contains(&self, code: char) -> bool {
        Self::bit(code).map(|b| self.0 & b == b).unwrap_or(false)
    } // contains

    /// Returns true if every permission in `requested` is also in this set.
    #[inline]
    pub fn covers(&self, requested: &PermissionSet) -> bool {
        self.0 & requested.0 == requested.0
    } // covers

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    } // is_empty

    /// Iterates the contained codes, lower case letters first, each group alphabetically.
    pub fn codes(&self) -> impl Iterator<Item = char> + '_ {
        (b'a'..=b'z').chain(b'A'..=b'Z')
            .map(char::from)
            .filter(move |c| self.contains(*c))
    } // codes

} // impl PermissionSet

/// Returns true if `requested` is a subset of `granted`.
#[inline]
pub fn contains_all(requested: &PermissionSet, granted: &PermissionSet) -> bool {
    granted.covers(requested)
} // contains_all

impl FromStr for PermissionSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionSet::parse(s)
    } // from_str

} // impl FromStr for PermissionSet

impl fmt::Display for PermissionSet {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.codes() {
            write!(f, "{}", c)?;
        } // for
        Ok(())
    } // fmt

} // impl fmt::Display for PermissionSet


#[cfg(test)]
mod tests {

    use super::*;
    use test_env_log::test;

    #[test]
    fn parse() {
        let p = PermissionSet::parse("rwx").unwrap();

        assert!(p.contains('r'));
        assert!(p.contains('w'));
        assert!(p.contains('x'));
        assert!(!p.contains('d'));
        assert_eq!(PermissionSet::parse("rrw").unwrap(), PermissionSet::parse("wr").unwrap());
        assert_eq!(PermissionSet::parse("r-w"), Err(Error::InvalidPermission('-')));
    } // parse

    #[test]
    fn covers() {
        let granted = PermissionSet::parse("rwcds").unwrap();

        assert!(contains_all(&PermissionSet::parse("r").unwrap(), &granted));
        assert!(contains_all(&PermissionSet::parse("rwcds").unwrap(), &granted));
        assert!(contains_all(&PermissionSet::EMPTY, &granted));
        // no partial credit
        assert!(!contains_all(&PermissionSet::parse("rx").unwrap(), &granted));
        // case matters
        assert!(!contains_all(&PermissionSet::parse("R").unwrap(), &granted));
    } // covers

    #[test]
    fn display_is_canonical() {
        assert_eq!(PermissionSet::parse("xwr").unwrap().to_string(), "rwx");
        assert_eq!(PermissionSet::parse("Rr").unwrap().to_string(), "rR");
        assert_eq!(PermissionSet::EMPTY.to_string(), "");
    } // display_is_canonical

} // mod tests
