//! Scope-aware access control lists for hierarchical, directory-shaped namespaces.
//!
//! The crate answers a single question: *may user U perform action A, with permissions P and
//! options O, at location L?* Locations are comma separated paths, most specific component first,
//! like LDAP distinguished names (`dc=a,dc=gonicus,dc=de`). Rules are anchored at locations and
//! the [`Resolver`] walks from the queried location up to a configured base to find them.
//!
//! # Introduction
//!
//! In the sense of this implementation:
//! * a *location* is a node in the tree to which access is controlled.
//! * an *action* is a dot separated capability name such as `com.gosa.factory`, not an HTTP verb.
//! * a *permission* is a single letter, e.g. `r`ead, `w`rite, `c`reate, `d`elete, `s`earch or
//!   e`x`ecute. Requests name the letters they need and a rule must grant all of them.
//! * a *member* is a user name or a regular expression matched against the start of user names.
//! * a *role* is a named list of rules which rules and sets can refer to instead of repeating it.
//!
//! ## Rules
//!
//! A [`Rule`] lists its members and one or more action entries. Each entry names an action
//! pattern, the granted permissions and optionally options the request has to carry. Action
//! patterns know two wildcards: `#` matches within one segment, `*` matches across segments.
//!
//! Every rule has a [`Scope`] which defines how far it reaches from its location:
//!
//! <table>
//! <tr><th>Scope</th>  <th>Effect</th></tr>
//! <tr><td>one</td>    <td>Grants at the anchor location only.</td></tr>
//! <tr><td>sub</td>    <td>Grants at the anchor and below, unless reset further down.</td></tr>
//! <tr><td>psub</td>   <td>Grants at the anchor and below. Resets do not apply.</td></tr>
//! <tr><td>reset</td>  <td>Grants nothing, but hides matching sub and one grants above it.</td></tr>
//! </table>
//!
//! ## Sets and priorities
//!
//! Rules are collected in an [`AclSet`] per location. Within a set rules are evaluated in order of
//! ascending priority. A rule added without a priority gets the number of rules already in the
//! set, so the first rule gets 0, the second 1 and so on. Rules with equal priorities are evaluated
//! in the order they were added.
//!
//! ## Denied by default
//!
//! Until a matching grant is found on the way from the queried location up to the base, access is
//! denied.
//!
//! # Example
//!
//! ```rust
//! # extern crate dn_acl;
//! use dn_acl::{Options, Resolver, Rule, Scope};
//!
//! let mut resolver = Resolver::new("dc=gonicus,dc=de");
//! let mut rule     = Rule::new(Scope::Sub);
//!
//! rule.add_member("tester1")?;
//! rule.add_action("com.gosa.factory", "rwx", Options::new())?;
//! resolver.add_acl_to_location("dc=a,dc=gonicus,dc=de", rule);
//!
//! let options = Options::new();
//!
//! // at the anchor and below
//! assert!(resolver.check("tester1", "com.gosa.factory", "r", &options, "dc=a,dc=gonicus,dc=de")?);
//! assert!(resolver.check("tester1", "com.gosa.factory", "r", &options, "dc=c,dc=b,dc=a,dc=gonicus,dc=de")?);
//!
//! // but not above
//! assert!(!resolver.check("tester1", "com.gosa.factory", "r", &options, "dc=gonicus,dc=de")?);
//! # Ok::<(), dn_acl::Error>(())
//! ```
//!
//! # Roles
//!
//! A rule may refer to an [`AclRole`] instead of listing actions itself. The role's rules are then
//! evaluated in its place, for the members of the referring rule. Roles may refer to other roles.
//! References are resolved when checking, so a role may be referred to before it is added; an
//! unknown role or a cycle between roles makes the check fail rather than deny.
//!
//! ```rust
//! # extern crate dn_acl;
//! use dn_acl::{AclRole, Error, Options, Resolver, Rule, Scope};
//!
//! let mut resolver = Resolver::new("dc=gonicus,dc=de");
//! let mut role     = AclRole::new("rolle1");
//! let mut entry    = Rule::new(Scope::Sub);
//!
//! entry.add_action("com.wurstpelle.de", "rwcds", Options::new())?;
//! role.add(entry);
//! resolver.add_acl_role(role)?;
//!
//! let mut peter = Rule::with_role("rolle1");
//!
//! peter.add_member("peter")?;
//! resolver.add_acl_to_location("dc=gonicus,dc=de", peter);
//!
//! assert!(resolver.check("peter", "com.wurstpelle.de", "r", &Options::new(), "dc=1,dc=gonicus,dc=de")?);
//!
//! // the set at the base still refers to the role
//! assert_eq!(resolver.remove_role("rolle1").unwrap_err(), Error::RoleInUse(String::from("rolle1")));
//! # Ok::<(), dn_acl::Error>(())
//! ```
//!
//! # Persistence
//!
//! The resolver itself never touches storage. [`Resolver::snapshot`] and [`Resolver::restore`]
//! exchange the complete state with a [`Store`], such as the [`JsonFileStore`].

pub mod action;
pub mod permission;
pub mod resolver;
pub mod rule;
pub mod set;
pub mod store;

use std::fmt;

pub use action::ActionPattern;
pub use permission::PermissionSet;
pub use resolver::{Resolver, SharedResolver};
pub use rule::{ActionEntry, MemberPattern, OptionValue, Options, Rule, Scope};
pub use set::{AclRole, AclSet};
pub use store::{JsonFileStore, MemoryStore, ResolverConfig, Snapshot, Store};


// Error //////////////////////////////////////////////////////////////////////////////////////////


#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidScope(String),
    InvalidMember(String),
    InvalidPermission(char),
    Compile{pattern: String, reason: String},
    UnknownRole(String),
    RoleCycle(String),
    RoleInUse(String),
    DuplicateRole(String),
    MissingLocation(String),
    Store(String),
} // enum Error

impl fmt::Display for Error {

    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::InvalidScope(s) =>
                write!(f, "Invalid scope: {}", s),
            Error::InvalidMember(s) =>
                write!(f, "Invalid member: {:?}", s),
            Error::InvalidPermission(c) =>
                write!(f, "Invalid permission: {:?}", c),
            Error::Compile{pattern, reason} =>
                write!(f, "Cannot compile pattern {:?}: {}", pattern, reason),
            Error::UnknownRole(s) =>
                write!(f, "Unknown role: {}", s),
            Error::RoleCycle(s) =>
                write!(f, "Role refers to itself: {}", s),
            Error::RoleInUse(s) =>
                write!(f, "Role still in use: {}", s),
            Error::DuplicateRole(s) =>
                write!(f, "Duplicate role: {}", s),
            Error::MissingLocation(s) =>
                write!(f, "No acl set at: {}", s),
            Error::Store(s) =>
                write!(f, "Store failure: {}", s),
        } // match
    } // fmt

} // impl fmt::Display for Error

impl std::error::Error for Error {}

pub type Result<T, E = Error> = std::result::Result<T, E>;


// Tests //////////////////////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {

    use super::*;
    use test_env_log::test;

    #[test]
    fn display() {
        assert_eq!(Error::UnknownRole(String::from("ghost")).to_string(), "Unknown role: ghost");
        assert_eq!(Error::InvalidPermission('?').to_string(), "Invalid permission: '?'");
        assert_eq!(
            Error::Compile{pattern: String::from("a..b"), reason: String::from("empty segment")}.to_string(),
            "Cannot compile pattern \"a..b\": empty segment"
        );
    } // display

    #[test]
    fn defaults() {
        let resolver = Resolver::new("dc=gonicus,dc=de");

        assert!(!resolver.check("anyone", "com.gosa.factory", "", &Options::new(), "dc=gonicus,dc=de").unwrap());

        let parsed: Result<PermissionSet> = "r?".parse();

        assert_eq!(parsed, Err(Error::InvalidPermission('?')));
    } // defaults

} // mod tests
