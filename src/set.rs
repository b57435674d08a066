//! Rule containers.
//!
//! Both containers keep their rules ordered by ascending priority. A rule added without a
//! priority gets the current number of rules as its priority, so rules added one after another
//! are evaluated in insertion order. Rules sharing a priority keep their insertion order.

use log::trace;
use std::slice::Iter;

use crate::rule::Rule;


// RuleList ///////////////////////////////////////////////////////////////////////////////////////


#[derive(Clone, Debug, Default)]
struct RuleList {
    rules: Vec<Rule>,
} // struct RuleList

impl RuleList {

    fn add(&mut self, mut rule: Rule) {
        if rule.priority().is_none() {
            rule.set_priority(self.rules.len() as i64);
        } // if
        self.rules.push(rule);
        // stable, ties keep insertion order
        self.rules.sort_by_key(|r| r.priority().unwrap_or_default());
    } // add

    fn remove(&mut self, index: usize) -> Option<Rule> {
        if index < self.rules.len() {
            Some(self.rules.remove(index))
        } else {
            None
        } // else
    } // remove

    fn remove_for_user(&mut self, user: &str) -> usize {
        let before = self.rules.len();

        self.rules.retain(|r| !r.members().iter().any(|m| m.as_str() == user));
        before - self.rules.len()
    } // remove_for_user

    fn refers_to(&self, role: &str) -> bool {
        self.rules.iter().any(|r| r.role() == Some(role))
    } // refers_to

} // impl RuleList


// AclSet /////////////////////////////////////////////////////////////////////////////////////////


/// The rules anchored at one location.
///
/// Instead of its own rules a set may evaluate the rules of a role. Like
/// [`Rule::use_role`], switching modes keeps the data of the inactive mode.
#[derive(Clone, Debug)]
pub struct AclSet {
    location:  String,
    rules:     RuleList,
    role:      Option<String>,
    uses_role: bool,
} // struct AclSet

impl AclSet {

    pub fn new(location: &str) -> Self {
        trace!("creating acl set for {}", location);
        AclSet{location: String::from(location), rules: RuleList::default(), role: None, uses_role: false}
    } // new

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    } // location

    /// Adds `rule` and switches the set back to its own rules.
    pub fn add(&mut self, rule: Rule) {
        trace!("adding rule with priority {:?} to {}", rule.priority(), self.location);
        self.uses_role = false;
        self.rules.add(rule);
    } // add

    /// Removes the rule at `index` in evaluation order.
    pub fn remove(&mut self, index: usize) -> Option<Rule> {
        trace!("removing rule {} from {}", index, self.location);
        self.rules.remove(index)
    } // remove

    /// Removes every rule listing `user` literally as a member. Returns the number removed.
    pub fn remove_acls_for_user(&mut self, user: &str) -> usize {
        self.rules.remove_for_user(user)
    } // remove_acls_for_user

    /// Switches the set to evaluate the rules of role `name`.
    pub fn use_role(&mut self, name: &str) {
        trace!("acl set for {} now uses role {}", self.location, name);
        self.role      = Some(String::from(name));
        self.uses_role = true;
    } // use_role

    /// The stored role name, whether or not the set is currently in role mode.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    } // role

    #[inline]
    pub fn uses_role(&self) -> bool {
        self.uses_role
    } // uses_role

    /// The role to evaluate in place of the set's own rules, if any.
    pub fn role_ref(&self) -> Option<&str> {
        if self.uses_role { self.role() } else { None }
    } // role_ref

    /// The set's own rules in evaluation order, even while the set is in role mode.
    pub fn iter(&self) -> Iter<'_, Rule> {
        self.rules.rules.iter()
    } // iter

    pub fn len(&self) -> usize {
        self.rules.rules.len()
    } // len

    pub fn is_empty(&self) -> bool {
        self.rules.rules.is_empty()
    } // is_empty

    /// Returns true if the set or one of its rules refers to `role`, active or not.
    pub fn refers_to(&self, role: &str) -> bool {
        self.role() == Some(role) || self.rules.refers_to(role)
    } // refers_to

    pub(crate) fn set_role_state(&mut self, role: Option<String>, uses_role: bool) {
        self.uses_role = uses_role && role.is_some();
        self.role      = role;
    } // set_role_state

} // impl AclSet

impl<'a> IntoIterator for &'a AclSet {
    type Item = &'a Rule;
    type IntoIter = Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    } // into_iter

} // impl IntoIterator for &AclSet


// AclRole ////////////////////////////////////////////////////////////////////////////////////////


/// A named, reusable list of rules. Roles are not anchored anywhere, they only take effect
/// through a rule or set referring to them.
#[derive(Clone, Debug)]
pub struct AclRole {
    name:  String,
    rules: RuleList,
} // struct AclRole

impl AclRole {

    pub fn new(name: &str) -> Self {
        trace!("creating role {}", name);
        AclRole{name: String::from(name), rules: RuleList::default()}
    } // new

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    } // name

    pub fn add(&mut self, rule: Rule) {
        trace!("adding rule with priority {:?} to role {}", rule.priority(), self.name);
        self.rules.add(rule);
    } // add

    pub fn remove(&mut self, index: usize) -> Option<Rule> {
        trace!("removing rule {} from role {}", index, self.name);
        self.rules.remove(index)
    } // remove

    pub fn iter(&self) -> Iter<'_, Rule> {
        self.rules.rules.iter()
    } // iter

    pub fn len(&self) -> usize {
        self.rules.rules.len()
    } // len

    pub fn is_empty(&self) -> bool {
        self.rules.rules.is_empty()
    } // is_empty

    /// Returns true if one of the role's rules refers to `role`, active or not.
    pub fn refers_to(&self, role: &str) -> bool {
        self.rules.refers_to(role)
    } // refers_to

} // impl AclRole

impl<'a> IntoIterator for &'a AclRole {
    type Item = &'a Rule;
    type IntoIter = Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    } // into_iter

} // impl IntoIterator for &AclRole


// Tests //////////////////////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {

    use super::*;
    use crate::rule::{Options, Scope};
    use test_env_log::test;

    fn rule(member: &str) -> Rule {
        let mut rule = Rule::new(Scope::Sub);

        rule.add_member(member).unwrap();
        rule.add_action("com.gosa.factory", "r", Options::new()).unwrap();
        rule
    } // rule

    fn order(set: &AclSet) -> Vec<(String, Option<i64>)> {
        set.iter().map(|r| (String::from(r.members()[0].as_str()), r.priority())).collect()
    } // order

    #[test]
    fn auto_priority() {
        let mut set = AclSet::new("dc=gonicus,dc=de");

        set.add(rule("a"));
        set.add(rule("b"));
        set.add(rule("c"));

        assert_eq!(order(&set), vec![
            (String::from("a"), Some(0)),
            (String::from("b"), Some(1)),
            (String::from("c"), Some(2)),
        ]);
    } // auto_priority

    #[test]
    fn explicit_priority() {
        let mut set = AclSet::new("dc=gonicus,dc=de");

        set.add(rule("a").with_priority(10));
        set.add(rule("b").with_priority(-1));
        set.add(rule("c"));

        assert_eq!(order(&set), vec![
            (String::from("b"), Some(-1)),
            (String::from("c"), Some(2)),
            (String::from("a"), Some(10)),
        ]);
    } // explicit_priority

    #[test]
    fn duplicate_priorities_keep_insertion_order() {
        let mut set = AclSet::new("dc=gonicus,dc=de");

        set.add(rule("a"));
        set.add(rule("b"));
        assert!(set.remove(0).is_some());
        // one rule left, so "c" gets priority 1 again, just like "b"
        set.add(rule("c"));
        set.add(rule("d").with_priority(1));

        assert_eq!(order(&set), vec![
            (String::from("b"), Some(1)),
            (String::from("c"), Some(1)),
            (String::from("d"), Some(1)),
        ]);
    } // duplicate_priorities_keep_insertion_order

    #[test]
    fn role_toggle_is_non_destructive() {
        let mut set = AclSet::new("dc=gonicus,dc=de");

        set.add(rule("a"));
        set.use_role("rolle1");

        assert!(set.uses_role());
        assert_eq!(set.role_ref(), Some("rolle1"));
        assert_eq!(set.len(), 1);

        set.add(rule("b"));

        assert!(!set.uses_role());
        assert_eq!(set.role_ref(), None);
        assert_eq!(set.role(), Some("rolle1"));
        assert_eq!(set.len(), 2);
        assert!(set.refers_to("rolle1"));
    } // role_toggle_is_non_destructive

    #[test]
    fn remove_for_user() {
        let mut set = AclSet::new("dc=gonicus,dc=de");

        set.add(rule("a"));
        set.add(rule("b"));
        set.add(rule("a"));

        assert_eq!(set.remove_acls_for_user("a"), 2);
        assert_eq!(set.remove_acls_for_user("a"), 0);
        assert_eq!(set.len(), 1);
        assert!(set.remove(1).is_none());
    } // remove_for_user

    #[test]
    fn role_references() {
        let mut role = AclRole::new("role1");

        role.add(Rule::with_role("role2"));

        assert_eq!(role.name(), "role1");
        assert!(role.refers_to("role2"));
        assert!(!role.refers_to("role3"));
    } // role_references

} // mod tests
