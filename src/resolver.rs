//! The resolver answers the question "may `user` perform `action` with `permissions` at
//! `location`?" by walking from the queried location up to the configured base.
//!
//! At each level every set anchored exactly there is consulted, its rules (or the rules of the
//! role it uses) in priority order. The first matching rule decides the walk as follows:
//!
//! * `reset` grants nothing, but every `sub` and `one` grant found from here on is ignored.
//! * `psub` grants access, resets or not.
//! * `sub` grants access unless a reset was seen.
//! * `one` grants access unless a reset was seen, and only at the queried location itself.
//!
//! If the walk passes the base without a grant, access is denied.

use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::slice::Iter;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::permission::PermissionSet;
use crate::rule::{MemberPattern, Options, Rule, Scope};
use crate::set::{AclRole, AclSet};
use crate::Error;


// Locations //////////////////////////////////////////////////////////////////////////////////////


/// Returns the location above `location`, i.e. `location` without its leftmost component.
pub fn parent(location: &str) -> Option<&str> {
    location.split_once(',').map(|(_, rest)| rest)
} // parent

/// Returns true if `location` is `base` or lies below it.
pub fn is_within(location: &str, base: &str) -> bool {
    if base.is_empty() || location == base {
        return true;
    } // if
    location.len() > base.len()
        && location.ends_with(base)
        && location[..location.len() - base.len()].ends_with(',')
} // is_within


// Candidates /////////////////////////////////////////////////////////////////////////////////////


/// A rule reached while expanding a set, together with the members of every rule that referred
/// to a role on the way to it.
struct Candidate<'a> {
    rule:  &'a Rule,
    gates: Vec<&'a [MemberPattern]>,
} // struct Candidate

impl<'a> Candidate<'a> {

    /// Every non empty member list on the way must admit `user`, and there must be at least one.
    fn admits(&self, user: &str) -> bool {
        let mut gated = false;

        for members in self.gates.iter().copied().chain(std::iter::once(self.rule.members())) {
            if members.is_empty() {
                continue;
            } // if
            if !members.iter().any(|m| m.matches(user)) {
                return false;
            } // if
            gated = true;
        } // for
        gated
    } // admits

} // impl Candidate


// Resolver ///////////////////////////////////////////////////////////////////////////////////////


/// Owns all sets, indexed by location, and all roles, indexed by name.
///
/// All mutators work in memory only, persisting is left to a [`Store`](crate::Store). Role
/// references are not validated when they are made; an unknown role or a cycle between roles is
/// reported by [`check`](Resolver::check) instead.
#[derive(Clone, Debug)]
pub struct Resolver {
    base:  String,
    sets:  BTreeMap<String, Vec<AclSet>>,
    roles: BTreeMap<String, AclRole>,
} // struct Resolver

impl Resolver {

    pub fn new(base: &str) -> Self {
        trace!("creating resolver for base {}", base);
        Resolver{base: String::from(base), sets: BTreeMap::new(), roles: BTreeMap::new()}
    } // new

    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    } // base

    /// Drops all sets and roles. The base is kept.
    pub fn clear(&mut self) {
        trace!("clearing resolver");
        self.sets.clear();
        self.roles.clear();
    } // clear

    // Sets ///////////////////////////////////////////////////////////////////////////////////////

    /// Adds `set` at its location. More than one set may share a location, they are consulted
    /// in the order they were added.
    pub fn add_acl_set(&mut self, set: AclSet) {
        trace!("adding acl set for {}", set.location());
        self.sets.entry(String::from(set.location())).or_insert_with(Vec::new).push(set);
    } // add_acl_set

    /// Adds `rule` to the first set at `location`, creating that set if there is none.
    pub fn add_acl_to_location(&mut self, location: &str, rule: Rule) {
        trace!("adding rule to {}", location);
        let sets = self.sets.entry(String::from(location)).or_insert_with(Vec::new);

        if sets.is_empty() {
            sets.push(AclSet::new(location));
        } // if
        sets[0].add(rule);
    } // add_acl_to_location

    /// The sets anchored exactly at `location`.
    pub fn acl_sets(&self, location: &str) -> &[AclSet] {
        self.sets.get(location).map(Vec::as_slice).unwrap_or(&[])
    } // acl_sets

    /// All locations with at least one set.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    } // locations

    /// Edits the set at `index` of `location` in place.
    pub fn update_acl_set<T, F>(&mut self, location: &str, index: usize, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut AclSet) -> Result<T, Error>,
    {
        trace!("updating acl set {} of {}", index, location);
        match self.sets.get_mut(location).and_then(|sets| sets.get_mut(index)) {
            Some(set) => f(set),
            None      => {
                warn!("no acl set {} at {}", index, location);
                Err(Error::MissingLocation(String::from(location)))
            }, // None
        } // match
    } // update_acl_set

    /// Removes the set at `index` of `location`.
    pub fn remove_acl_set(&mut self, location: &str, index: usize) -> Option<AclSet> {
        trace!("removing acl set {} of {}", index, location);
        let sets = self.sets.get_mut(location)?;

        if index >= sets.len() {
            return None;
        } // if

        let set = sets.remove(index);

        if sets.is_empty() {
            self.sets.remove(location);
        } // if
        Some(set)
    } // remove_acl_set

    /// Removes all sets at `location`. Returns true if there were any.
    pub fn remove_aclset_by_base(&mut self, location: &str) -> bool {
        trace!("removing acl sets of {}", location);
        self.sets.remove(location).is_some()
    } // remove_aclset_by_base

    /// Removes every rule, in every set, that lists `user` literally as a member. Returns the
    /// number of rules removed.
    pub fn remove_acls_for_user(&mut self, user: &str) -> usize {
        trace!("removing acls for user {}", user);
        self.sets.values_mut()
            .flat_map(|sets| sets.iter_mut())
            .map(|set| set.remove_acls_for_user(user))
            .sum()
    } // remove_acls_for_user

    // Roles //////////////////////////////////////////////////////////////////////////////////////

    /// Adds `role`. Returns an error if a role with the same name exists.
    pub fn add_acl_role(&mut self, role: AclRole) -> Result<(), Error> {
        trace!("adding role {}", role.name());
        if self.roles.contains_key(role.name()) {
            warn!("adding duplicate role: {}", role.name());
            return Err(Error::DuplicateRole(String::from(role.name())));
        } // if
        self.roles.insert(String::from(role.name()), role);
        Ok(())
    } // add_acl_role

    #[inline]
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    } // has_role

    pub fn role(&self, name: &str) -> Option<&AclRole> {
        self.roles.get(name)
    } // role

    pub fn roles(&self) -> impl Iterator<Item = &AclRole> {
        self.roles.values()
    } // roles

    /// Edits the role `name` in place.
    pub fn update_role<T, F>(&mut self, name: &str, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut AclRole) -> Result<T, Error>,
    {
        trace!("updating role {}", name);
        match self.roles.get_mut(name) {
            Some(role) => f(role),
            None       => {
                warn!("updating missing role: {}", name);
                Err(Error::UnknownRole(String::from(name)))
            }, // None
        } // match
    } // update_role

    /// Returns true if another role or any set refers to `name`. Inactive references count as
    /// well, since toggling them back on would leave them dangling.
    pub fn is_role_used(&self, name: &str) -> bool {
        self.roles.values().any(|r| r.name() != name && r.refers_to(name))
            || self.sets.values().flatten().any(|s| s.refers_to(name))
    } // is_role_used

    /// Removes the role `name`. Fails if it is unknown or still referred to.
    pub fn remove_role(&mut self, name: &str) -> Result<AclRole, Error> {
        trace!("removing role {}", name);
        if !self.roles.contains_key(name) {
            warn!("removing missing role: {}", name);
            return Err(Error::UnknownRole(String::from(name)));
        } // if
        if self.is_role_used(name) {
            warn!("removing role still in use: {}", name);
            return Err(Error::RoleInUse(String::from(name)));
        } // if
        self.roles.remove(name).ok_or_else(|| Error::UnknownRole(String::from(name)))
    } // remove_role

    // Resolution /////////////////////////////////////////////////////////////////////////////////

    fn expand<'a>(
        &'a self,
        rules: Iter<'a, Rule>,
        gates: &[&'a [MemberPattern]],
        path:  &mut Vec<&'a str>,
        out:   &mut Vec<Candidate<'a>>,
    ) -> Result<(), Error> {
        for rule in rules {
            match rule.role_ref() {
                Some(name) => {
                    let mut inner = gates.to_vec();

                    inner.push(rule.members());
                    self.expand_role(name, &inner, path, out)?;
                }, // Some
                None => out.push(Candidate{rule, gates: gates.to_vec()}),
            } // match
        } // for
        Ok(())
    } // expand

    fn expand_role<'a>(
        &'a self,
        name:  &'a str,
        gates: &[&'a [MemberPattern]],
        path:  &mut Vec<&'a str>,
        out:   &mut Vec<Candidate<'a>>,
    ) -> Result<(), Error> {
        if path.contains(&name) {
            warn!("role cycle: {} -> {}", path.join(" -> "), name);
            return Err(Error::RoleCycle(String::from(name)));
        } // if

        let role = match self.roles.get(name) {
            Some(role) => role,
            None       => {
                warn!("reference to unknown role: {}", name);
                return Err(Error::UnknownRole(String::from(name)));
            }, // None
        }; // match

        path.push(name);
        self.expand(role.iter(), gates, path, out)?;
        path.pop();
        Ok(())
    } // expand_role

    /// Returns the rules of role `name` in evaluation order, with nested role references
    /// replaced by the rules of the referenced roles.
    pub fn resolve_role(&self, name: &str) -> Result<Vec<&Rule>, Error> {
        trace!("resolving role {}", name);
        let name = match self.roles.get_key_value(name) {
            Some((key, _)) => key.as_str(),
            None           => {
                warn!("resolving unknown role: {}", name);
                return Err(Error::UnknownRole(String::from(name)));
            }, // None
        }; // match
        let mut out = Vec::new();

        self.expand_role(name, &[], &mut Vec::new(), &mut out)?;
        Ok(out.into_iter().map(|c| c.rule).collect())
    } // resolve_role

    fn effective<'a>(&'a self, set: &'a AclSet) -> Result<Vec<Candidate<'a>>, Error> {
        let mut out  = Vec::new();
        let mut path = Vec::new();

        match set.role_ref() {
            Some(name) => self.expand_role(name, &[], &mut path, &mut out)?,
            None       => self.expand(set.iter(), &[], &mut path, &mut out)?,
        } // match
        Ok(out)
    } // effective

    /// Returns true if `user` may perform `action` with the `requested` permission letters at
    /// `location`. Locations outside the base are always denied.
    ///
    /// Fails on invalid permission letters, references to unknown roles and role cycles; a
    /// broken configuration is never treated as a plain deny.
    pub fn check(
        &self,
        user:      &str,
        action:    &str,
        requested: &str,
        options:   &Options,
        location:  &str,
    ) -> Result<bool, Error> {
        trace!("checking {} for {} with {:?} at {}", action, user, requested, location);
        let requested   = PermissionSet::parse(requested)?;
        let mut current = location;
        let mut reset   = false;

        while is_within(current, &self.base) {
            for set in self.acl_sets(current) {
                for candidate in self.effective(set)? {
                    if !candidate.admits(user) || !candidate.rule.matches_action(action, &requested, options) {
                        continue;
                    } // if
                    match candidate.rule.scope() {
                        Scope::Reset        => {
                            trace!("    reset at {}", current);
                            reset = true;
                        }, // Reset
                        Scope::PermanentSub => {
                            debug!("{} granted {} at {} by psub at {}", user, action, location, current);
                            return Ok(true);
                        }, // PermanentSub
                        Scope::Sub          => {
                            if !reset {
                                debug!("{} granted {} at {} by sub at {}", user, action, location, current);
                                return Ok(true);
                            } // if
                            trace!("    sub at {} revoked by reset", current);
                        }, // Sub
                        Scope::One          => {
                            if current == location && !reset {
                                debug!("{} granted {} at {} by one", user, action, location);
                                return Ok(true);
                            } // if
                        }, // One
                    } // match
                } // for
            } // for
            if current == self.base {
                break;
            } // if
            match parent(current) {
                Some(p) => current = p,
                None    => break,
            } // match
        } // while

        debug!("{} denied {} at {}", user, action, location);
        Ok(false)
    } // check

} // impl Resolver


// SharedResolver /////////////////////////////////////////////////////////////////////////////////


/// A resolver shared between threads. Checks take the read lock, mutations the write lock, so
/// any number of checks may run at once while mutations are exclusive.
#[derive(Clone, Debug)]
pub struct SharedResolver {
    inner: Arc<RwLock<Resolver>>,
} // struct SharedResolver

impl SharedResolver {

    pub fn new(resolver: Resolver) -> Self {
        SharedResolver{inner: Arc::new(RwLock::new(resolver))}
    } // new

    // a panic while holding the lock cannot leave the maps half edited, so poisoning is ignored
    fn read_guard(&self) -> RwLockReadGuard<'_, Resolver> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    } // read_guard

    fn write_guard(&self) -> RwLockWriteGuard<'_, Resolver> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    } // write_guard

    /// See [`Resolver::check`].
    pub fn check(
        &self,
        user:      &str,
        action:    &str,
        requested: &str,
        options:   &Options,
        location:  &str,
    ) -> Result<bool, Error> {
        self.read_guard().check(user, action, requested, options, location)
    } // check

    /// Runs `f` under the read lock.
    pub fn read<T, F: FnOnce(&Resolver) -> Result<T, Error>>(&self, f: F) -> Result<T, Error> {
        f(&self.read_guard())
    } // read

    /// Runs `f` under the write lock.
    pub fn write<T, F: FnOnce(&mut Resolver) -> Result<T, Error>>(&self, f: F) -> Result<T, Error> {
        f(&mut self.write_guard())
    } // write

} // impl SharedResolver


// Tests //////////////////////////////////////////////////////////////////////////////////////////


// mod tests
