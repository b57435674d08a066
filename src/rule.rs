//! Rules.
//!
//! A [`Rule`] grants (or, with [`Scope::Reset`], revokes) a set of actions to a set of members.
//! Alternatively a rule may refer to an [`AclRole`](crate::AclRole) by name, in which case the
//! rules of that role are evaluated in its place for the rule's members.

use log::{trace, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::action::ActionPattern;
use crate::permission::PermissionSet;
use crate::Error;


// Scope //////////////////////////////////////////////////////////////////////////////////////////


/// Defines how far a rule reaches from the location it is anchored at.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scope {
    /// Only the anchor location itself.
    One,
    /// The anchor location and its subtree, unless a reset is found on the way up.
    Sub,
    /// Like `Sub`, but resets do not apply.
    PermanentSub,
    /// Revokes matching `Sub` and `One` grants found further up the tree.
    Reset,
} // enum Scope

impl Scope {

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::One          => "one",
            Scope::Sub          => "sub",
            Scope::PermanentSub => "psub",
            Scope::Reset        => "reset",
        } // match
    } // as_str

} // impl Scope

impl Default for Scope {

    fn default() -> Self {
        Scope::Sub
    } // default

} // impl Default for Scope

impl FromStr for Scope {
    type Err = Error;

    /// Accepts the names `one`, `sub`, `psub` and `reset` in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "one"   => Ok(Scope::One),
            "sub"   => Ok(Scope::Sub),
            "psub"  => Ok(Scope::PermanentSub),
            "reset" => Ok(Scope::Reset),
            _       => {
                warn!("invalid scope: {}", s);
                Err(Error::InvalidScope(String::from(s)))
            }, // _
        } // match
    } // from_str

} // impl FromStr for Scope

impl fmt::Display for Scope {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    } // fmt

} // impl fmt::Display for Scope


// Patterns ///////////////////////////////////////////////////////////////////////////////////////


/// Compiles `pattern` into a regex anchored at the start only, so `tester` also accepts
/// `tester1`. This is the matching behaviour members and textual options have always had.
fn prefix_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})", pattern))
} // prefix_regex

/// A member of a rule: a user name or a regular expression matched against the start of a user
/// name.
#[derive(Clone)]
pub struct MemberPattern {
    source: String,
    regex:  Regex,
} // struct MemberPattern

impl MemberPattern {

    pub fn new(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            warn!("rejecting empty member pattern");
            return Err(Error::InvalidMember(String::new()));
        } // if
        match prefix_regex(pattern) {
            Ok(regex) => Ok(MemberPattern{source: String::from(pattern), regex}),
            Err(e)    => {
                warn!("invalid member pattern {}: {}", pattern, e);
                Err(Error::InvalidMember(String::from(pattern)))
            }, // Err
        } // match
    } // new

    #[inline]
    pub fn matches(&self, user: &str) -> bool {
        self.source == user || self.regex.is_match(user)
    } // matches

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    } // as_str

} // impl MemberPattern

impl fmt::Debug for MemberPattern {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberPattern({:?})", self.source)
    } // fmt

} // impl fmt::Debug for MemberPattern

impl PartialEq for MemberPattern {

    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    } // eq

} // impl PartialEq for MemberPattern


// Options ////////////////////////////////////////////////////////////////////////////////////////


/// The value of a request option, or the value an action entry expects for it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
} // enum OptionValue

impl From<&str> for OptionValue {

    fn from(s: &str) -> Self {
        OptionValue::Text(String::from(s))
    } // from

} // impl From<&str> for OptionValue

impl From<String> for OptionValue {

    fn from(s: String) -> Self {
        OptionValue::Text(s)
    } // from

} // impl From<String> for OptionValue

impl From<i64> for OptionValue {

    fn from(i: i64) -> Self {
        OptionValue::Integer(i)
    } // from

} // impl From<i64> for OptionValue

impl From<bool> for OptionValue {

    fn from(b: bool) -> Self {
        OptionValue::Boolean(b)
    } // from

} // impl From<bool> for OptionValue

/// Options passed along with a request, and expected by action entries.
pub type Options = BTreeMap<String, OptionValue>;

/// What an action entry expects for a single option.
#[derive(Clone)]
pub enum OptionMatcher {
    /// Textual expectations are patterns, matched like member patterns.
    Pattern(String, Regex),
    /// Everything else compares by equality.
    Exact(OptionValue),
} // enum OptionMatcher

impl OptionMatcher {

    pub fn new(name: &str, expected: OptionValue) -> Result<Self, Error> {
        match expected {
            OptionValue::Text(pattern) => {
                let regex = prefix_regex(&pattern).map_err(|e| {
                    warn!("invalid pattern for option {}: {}", name, e);
                    Error::Compile{pattern: pattern.clone(), reason: e.to_string()}
                })?;
                Ok(OptionMatcher::Pattern(pattern, regex))
            }, // Text
            other => Ok(OptionMatcher::Exact(other)),
        } // match
    } // new

    pub fn matches(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (OptionMatcher::Pattern(_, regex), OptionValue::Text(s)) => regex.is_match(s),
            (OptionMatcher::Pattern(..), _)                         => false,
            (OptionMatcher::Exact(expected), value)                 => expected == value,
        } // match
    } // matches

    /// The expectation as it was given.
    pub fn expected(&self) -> OptionValue {
        match self {
            OptionMatcher::Pattern(source, _) => OptionValue::Text(source.clone()),
            OptionMatcher::Exact(value)       => value.clone(),
        } // match
    } // expected

} // impl OptionMatcher

impl fmt::Debug for OptionMatcher {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionMatcher::Pattern(source, _) => write!(f, "Pattern({:?})", source),
            OptionMatcher::Exact(value)       => write!(f, "Exact({:?})", value),
        } // match
    } // fmt

} // impl fmt::Debug for OptionMatcher


// ActionEntry ////////////////////////////////////////////////////////////////////////////////////


/// One action granted by a rule: which actions, with which permissions, under which options.
#[derive(Clone, Debug)]
pub struct ActionEntry {
    target:      ActionPattern,
    permissions: PermissionSet,
    options:     BTreeMap<String, OptionMatcher>,
} // struct ActionEntry

impl ActionEntry {

    pub fn new(target: &str, permissions: &str, options: Options) -> Result<Self, Error> {
        let target      = ActionPattern::compile(target)?;
        let permissions = PermissionSet::parse(permissions)?;
        let mut matchers = BTreeMap::new();

        for (name, expected) in options {
            let matcher = OptionMatcher::new(&name, expected)?;
            matchers.insert(name, matcher);
        } // for
        Ok(ActionEntry{target, permissions, options: matchers})
    } // new

    #[inline]
    pub fn target(&self) -> &ActionPattern {
        &self.target
    } // target

    #[inline]
    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    } // permissions

    pub fn options(&self) -> &BTreeMap<String, OptionMatcher> {
        &self.options
    } // options

    /// An entry applies if its target matches, it covers the requested permissions and every
    /// option it expects is present in `options` with a matching value.
    pub fn matches(&self, action: &str, requested: &PermissionSet, options: &Options) -> bool {
        if !self.target.matches(action) {
            return false;
        } // if
        if !self.permissions.covers(requested) {
            trace!("    {} does not cover {}", self.permissions, requested);
            return false;
        } // if
        for (name, matcher) in &self.options {
            match options.get(name) {
                None        => {
                    trace!("    option {} missing, skipping entry {}", name, self.target);
                    return false;
                }, // None
                Some(value) => if !matcher.matches(value) {
                    trace!("    option {} mismatch, skipping entry {}", name, self.target);
                    return false;
                }, // Some
            } // match
        } // for
        true
    } // matches

} // impl ActionEntry


// Rule ///////////////////////////////////////////////////////////////////////////////////////////


/// A single access rule.
///
/// A rule is either action based or role based. Switching between the two does not discard
/// anything: [`use_role`](Rule::use_role) keeps the actions around and
/// [`add_action`](Rule::add_action) keeps the role name, so switching back restores the previous
/// behaviour. Existing rule stores rely on this.
#[derive(Clone, Debug)]
pub struct Rule {
    scope:     Scope,
    priority:  Option<i64>,
    members:   Vec<MemberPattern>,
    actions:   Vec<ActionEntry>,
    role:      Option<String>,
    uses_role: bool,
} // struct Rule

impl Rule {

    /// Creates an empty action based rule without a priority. The container it is added to
    /// assigns one.
    pub fn new(scope: Scope) -> Self {
        Rule{scope, priority: None, members: vec![], actions: vec![], role: None, uses_role: false}
    } // new

    /// Creates a rule that refers to the role `name`.
    pub fn with_role(name: &str) -> Self {
        let mut rule = Rule::new(Scope::default());

        rule.use_role(name);
        rule
    } // with_role

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    } // with_priority

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    } // scope

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    } // set_scope

    #[inline]
    pub fn priority(&self) -> Option<i64> {
        self.priority
    } // priority

    pub fn set_priority(&mut self, priority: i64) {
        self.priority = Some(priority);
    } // set_priority

    pub fn add_member(&mut self, pattern: &str) -> Result<(), Error> {
        trace!("adding member {}", pattern);
        self.members.push(MemberPattern::new(pattern)?);
        Ok(())
    } // add_member

    /// Adds all `patterns`. Nothing is added if one of them is invalid.
    pub fn add_members<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<(), Error> {
        let members = patterns.iter()
            .map(|p| MemberPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        self.members.extend(members);
        Ok(())
    } // add_members

    /// Removes every member written exactly as `pattern`. Returns true if one was removed.
    pub fn remove_member(&mut self, pattern: &str) -> bool {
        let before = self.members.len();

        self.members.retain(|m| m.as_str() != pattern);
        self.members.len() != before
    } // remove_member

    pub fn clear_members(&mut self) {
        self.members.clear();
    } // clear_members

    #[inline]
    pub fn members(&self) -> &[MemberPattern] {
        &self.members
    } // members

    /// Returns true if `user` matches at least one member.
    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m.matches(user))
    } // has_member

    /// Adds an action entry and switches the rule to action mode.
    pub fn add_action(&mut self, target: &str, permissions: &str, options: Options) -> Result<(), Error> {
        trace!("adding action {} with {:?}", target, permissions);
        let entry = ActionEntry::new(target, permissions, options)?;

        self.uses_role = false;
        self.actions.push(entry);
        Ok(())
    } // add_action

    #[inline]
    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    } // actions

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    } // clear_actions

    /// Switches the rule to role mode, referring to the role `name`.
    pub fn use_role(&mut self, name: &str) {
        trace!("rule now uses role {}", name);
        self.role      = Some(String::from(name));
        self.uses_role = true;
    } // use_role

    /// The stored role name, whether or not the rule is currently in role mode.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    } // role

    #[inline]
    pub fn uses_role(&self) -> bool {
        self.uses_role
    } // uses_role

    /// The role to evaluate in place of this rule, if it is in role mode.
    pub fn role_ref(&self) -> Option<&str> {
        if self.uses_role { self.role() } else { None }
    } // role_ref

    /// Returns true if one of the action entries applies. Always false in role mode.
    pub fn matches_action(&self, action: &str, requested: &PermissionSet, options: &Options) -> bool {
        !self.uses_role && self.actions.iter().any(|e| e.matches(action, requested, options))
    } // matches_action

    /// Returns true if `user` is a member and one of the action entries applies.
    pub fn matches(&self, user: &str, action: &str, requested: &PermissionSet, options: &Options) -> bool {
        self.has_member(user) && self.matches_action(action, requested, options)
    } // matches

    pub(crate) fn set_role_state(&mut self, role: Option<String>, uses_role: bool) {
        self.uses_role = uses_role && role.is_some();
        self.role      = role;
    } // set_role_state

} // impl Rule


// Tests //////////////////////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {

    use super::*;
    use test_env_log::test;

    fn perms(s: &str) -> PermissionSet {
        PermissionSet::parse(s).unwrap()
    } // perms

    fn opts(pairs: &[(&str, OptionValue)]) -> Options {
        pairs.iter().map(|(k, v)| (String::from(*k), v.clone())).collect()
    } // opts

    #[test]
    fn scopes() {
        assert_eq!("one".parse::<Scope>().unwrap(), Scope::One);
        assert_eq!("SUB".parse::<Scope>().unwrap(), Scope::Sub);
        assert_eq!("psub".parse::<Scope>().unwrap(), Scope::PermanentSub);
        assert_eq!("reset".parse::<Scope>().unwrap(), Scope::Reset);
        assert_eq!("all".parse::<Scope>(), Err(Error::InvalidScope(String::from("all"))));
        assert_eq!(Scope::PermanentSub.to_string(), "psub");
    } // scopes

    #[test]
    fn members() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("tester1").unwrap();
        rule.add_members(&["admin.*", "peter"]).unwrap();

        assert!(rule.has_member("tester1"));
        assert!(rule.has_member("administrator"));
        assert!(rule.has_member("peter"));
        // anchored at the start only
        assert!(rule.has_member("peterpan"));
        assert!(!rule.has_member("xpeter"));
        assert!(!rule.has_member("tester2"));

        assert!(rule.remove_member("peter"));
        assert!(!rule.remove_member("peter"));
        assert!(!rule.has_member("peter"));
    } // members

    #[test]
    fn literal_members_with_metacharacters() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("a+b").unwrap();
        assert!(rule.has_member("a+b"));
    } // literal_members_with_metacharacters

    #[test]
    fn invalid_members() {
        let mut rule = Rule::new(Scope::Sub);

        assert_eq!(rule.add_member(""), Err(Error::InvalidMember(String::new())));
        assert_eq!(rule.add_member("user("), Err(Error::InvalidMember(String::from("user("))));
        // all or nothing
        assert!(rule.add_members(&["ok", "bad("]).is_err());
        assert!(rule.members().is_empty());
    } // invalid_members

    #[test]
    fn actions() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("tester1").unwrap();
        rule.add_action("com.gosa.factory", "rwx", Options::new()).unwrap();

        assert!( rule.matches("tester1", "com.gosa.factory", &perms("r"), &Options::new()));
        assert!( rule.matches("tester1", "com.gosa.factory", &perms("rwx"), &Options::new()));
        assert!(!rule.matches("tester1", "com.gosa.factory", &perms("rd"), &Options::new()));
        assert!(!rule.matches("tester1", "com.gosa.other", &perms("r"), &Options::new()));
        assert!(!rule.matches("peter", "com.gosa.factory", &perms("r"), &Options::new()));
    } // actions

    #[test]
    fn malformed_action_is_rejected_at_add_time() {
        let mut rule = Rule::new(Scope::Sub);

        assert!(matches!(rule.add_action("com..x", "r", Options::new()), Err(Error::Compile{..})));
        assert_eq!(rule.add_action("com.x", "r!", Options::new()), Err(Error::InvalidPermission('!')));
        assert!(rule.actions().is_empty());
    } // malformed_action_is_rejected_at_add_time

    #[test]
    fn options() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("tester1").unwrap();
        rule.add_action("com.gosa.factory", "rwx", opts(&[
            ("uid", "^te.*".into()),
            ("level", 3i64.into()),
        ])).unwrap();

        let r = perms("r");

        assert!( rule.matches("tester1", "com.gosa.factory", &r, &opts(&[("uid", "tester".into()), ("level", 3i64.into())])));
        assert!(!rule.matches("tester1", "com.gosa.factory", &r, &opts(&[("uid", "peter".into()), ("level", 3i64.into())])));
        assert!(!rule.matches("tester1", "com.gosa.factory", &r, &opts(&[("uid", "tester".into()), ("level", 4i64.into())])));
        // textual expectations never match other kinds
        assert!(!rule.matches("tester1", "com.gosa.factory", &r, &opts(&[("uid", 1i64.into()), ("level", 3i64.into())])));
        // missing option
        assert!(!rule.matches("tester1", "com.gosa.factory", &r, &opts(&[("level", 3i64.into())])));
    } // options

    #[test]
    fn missing_option_skips_only_that_entry() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("tester1").unwrap();
        rule.add_action("com.gosa.factory", "rwx", opts(&[("uid", "tester".into())])).unwrap();
        rule.add_action("com.gosa.factory", "r", Options::new()).unwrap();

        assert!( rule.matches("tester1", "com.gosa.factory", &perms("r"), &Options::new()));
        assert!(!rule.matches("tester1", "com.gosa.factory", &perms("w"), &Options::new()));
        assert!( rule.matches("tester1", "com.gosa.factory", &perms("w"), &opts(&[("uid", "tester".into())])));
    } // missing_option_skips_only_that_entry

    #[test]
    fn role_toggle_keeps_both_sides() {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member("peter").unwrap();
        rule.add_action("com.gosa.factory", "r", Options::new()).unwrap();
        rule.use_role("rolle1");

        assert!(rule.uses_role());
        assert_eq!(rule.role_ref(), Some("rolle1"));
        assert!(!rule.matches("peter", "com.gosa.factory", &perms("r"), &Options::new()));

        rule.add_action("com.gosa.other", "r", Options::new()).unwrap();

        assert!(!rule.uses_role());
        assert_eq!(rule.role_ref(), None);
        assert_eq!(rule.role(), Some("rolle1"));
        assert_eq!(rule.actions().len(), 2);
        assert!(rule.matches("peter", "com.gosa.factory", &perms("r"), &Options::new()));
    } // role_toggle_keeps_both_sides

} // mod tests
