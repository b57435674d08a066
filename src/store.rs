//! Persistence and configuration.
//!
//! The resolver state is exchanged with stores as a [`Snapshot`], which serializes to JSON:
//!
//! ```json
//! {
//!   "roles": {
//!     "rolle1": { "acls": [ { "scope": "sub", "priority": 0,
//!                             "actions": [ { "target": "com.wurstpelle.de", "acls": "cdrsw" } ] } ] }
//!   },
//!   "acl": {
//!     "dc=gonicus,dc=de": [
//!       { "acls": [ { "scope": "sub", "priority": 0, "members": ["peter"], "role": "rolle1" } ] },
//!       { "role": "rolle1" }
//!     ]
//!   }
//! }
//! ```
//!
//! A role may also be stored as a single rule object, `{"scope": .., "members": [..],
//! "actions": [..]}`. Unknown keys are rejected.
//!
//! A rule or set with a `role` is in role mode unless `mode` is `"acls"`, which marks a role
//! name that is kept while the own rules are active. Loading validates everything the same way
//! building the state by hand does.

use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::resolver::Resolver;
use crate::rule::{ActionEntry, Options, Rule, Scope};
use crate::set::{AclRole, AclSet};
use crate::{Error, Result};

fn store_err<E: std::error::Error>(e: E) -> Error {
    warn!("store failure: {}", e);
    Error::Store(e.to_string())
} // store_err


// Snapshot ///////////////////////////////////////////////////////////////////////////////////////


/// Which side of a rule or set is active when a role name is stored.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Role,
    Acls,
} // enum Mode

fn mode_of(role: Option<&str>, uses_role: bool) -> Option<Mode> {
    match (role, uses_role) {
        (Some(_), false) => Some(Mode::Acls),
        _                => None,
    } // match
} // mode_of

fn uses_role(role: &Option<String>, mode: Option<Mode>) -> bool {
    role.is_some() && mode != Some(Mode::Acls)
} // uses_role

fn default_scope() -> Value {
    Value::from(Scope::default().as_str())
} // default_scope

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoredAction {
    pub target: String,
    pub acls:   String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
} // struct StoredAction

impl From<&ActionEntry> for StoredAction {

    fn from(entry: &ActionEntry) -> Self {
        StoredAction{
            target:  String::from(entry.target().as_str()),
            acls:    entry.permissions().to_string(),
            options: entry.options().iter().map(|(k, m)| (k.clone(), m.expected())).collect(),
        }
    } // from

} // impl From<&ActionEntry> for StoredAction

/// Members and scope are kept as raw JSON values so that a wrongly typed value is reported as
/// an invalid member or scope rather than as a parse error.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoredRule {
    #[serde(default = "default_scope")]
    pub scope: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<StoredAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
} // struct StoredRule

impl From<&Rule> for StoredRule {

    fn from(rule: &Rule) -> Self {
        StoredRule{
            scope:    Value::from(rule.scope().as_str()),
            priority: rule.priority(),
            members:  rule.members().iter().map(|m| Value::from(m.as_str())).collect(),
            actions:  rule.actions().iter().map(StoredAction::from).collect(),
            role:     rule.role().map(String::from),
            mode:     mode_of(rule.role(), rule.uses_role()),
        }
    } // from

} // impl From<&Rule> for StoredRule

impl TryFrom<StoredRule> for Rule {
    type Error = Error;

    fn try_from(stored: StoredRule) -> Result<Self, Self::Error> {
        let scope = match &stored.scope {
            Value::String(s) => s.parse::<Scope>()?,
            other            => {
                warn!("invalid scope: {}", other);
                return Err(Error::InvalidScope(other.to_string()));
            }, // other
        }; // match
        let mut rule = Rule::new(scope);

        if let Some(priority) = stored.priority {
            rule.set_priority(priority);
        } // if
        for member in &stored.members {
            match member {
                Value::String(s) => rule.add_member(s)?,
                other            => {
                    warn!("invalid member: {}", other);
                    return Err(Error::InvalidMember(other.to_string()));
                }, // other
            } // match
        } // for
        for action in stored.actions {
            rule.add_action(&action.target, &action.acls, action.options)?;
        } // for

        let active = uses_role(&stored.role, stored.mode);

        rule.set_role_state(stored.role, active);
        Ok(rule)
    } // try_from

} // impl TryFrom<StoredRule> for Rule

/// A role is either a list of rules or, in the older layout, a single rule object.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRole {
    Rules(StoredRules),
    Entry(StoredRule),
} // enum StoredRole

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoredRules {
    pub acls: Vec<StoredRule>,
} // struct StoredRules

impl StoredRole {

    pub fn into_rules(self) -> Vec<StoredRule> {
        match self {
            StoredRole::Rules(rules) => rules.acls,
            StoredRole::Entry(rule)  => vec![rule],
        } // match
    } // into_rules

} // impl StoredRole

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoredSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<StoredRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
} // struct StoredSet

/// The complete, serializable state of a resolver, apart from its base.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    #[serde(default)]
    pub roles: BTreeMap<String, StoredRole>,
    #[serde(default)]
    pub acl: BTreeMap<String, Vec<StoredSet>>,
} // struct Snapshot

impl Snapshot {

    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(store_err)
    } // from_json

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(store_err)
    } // to_json

} // impl Snapshot

impl Resolver {

    /// Captures every set and role, including the inactive side of toggled rules and sets.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for role in self.roles() {
            snapshot.roles.insert(String::from(role.name()), StoredRole::Rules(StoredRules{
                acls: role.iter().map(StoredRule::from).collect(),
            }));
        } // for
        for location in self.locations() {
            let sets = self.acl_sets(location).iter().map(|set| StoredSet{
                acls: set.iter().map(StoredRule::from).collect(),
                role: set.role().map(String::from),
                mode: mode_of(set.role(), set.uses_role()),
            }).collect();

            snapshot.acl.insert(String::from(location), sets);
        } // for
        snapshot
    } // snapshot

    /// Replaces all sets and roles with those of `snapshot`. On error the resolver is left as
    /// it was.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), Error> {
        trace!("restoring {} roles and {} locations", snapshot.roles.len(), snapshot.acl.len());
        let mut restored = Resolver::new(self.base());

        for (name, stored) in snapshot.roles {
            let mut role = AclRole::new(&name);

            for rule in stored.into_rules() {
                role.add(Rule::try_from(rule)?);
            } // for
            restored.add_acl_role(role)?;
        } // for
        for (location, sets) in snapshot.acl {
            for stored in sets {
                let mut set    = AclSet::new(&location);
                let active     = uses_role(&stored.role, stored.mode);

                for rule in stored.acls {
                    set.add(Rule::try_from(rule)?);
                } // for
                set.set_role_state(stored.role, active);
                restored.add_acl_set(set);
            } // for
        } // for

        *self = restored;
        Ok(())
    } // restore

    pub fn load_from(&mut self, store: &dyn Store) -> Result<(), Error> {
        let snapshot = store.load()?;

        self.restore(snapshot)
    } // load_from

    pub fn save_to(&self, store: &dyn Store) -> Result<(), Error> {
        store.save(&self.snapshot())
    } // save_to

    /// Creates a resolver for the configured base, loading the configured store if its file
    /// exists.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, Error> {
        let mut resolver = Resolver::new(&config.base);

        if let Some(path) = &config.store {
            resolver.load_from(&JsonFileStore::new(path))?;
        } // if
        Ok(resolver)
    } // from_config

} // impl Resolver


// Stores /////////////////////////////////////////////////////////////////////////////////////////


/// Somewhere snapshots can be loaded from and saved to.
pub trait Store {
    fn load(&self) -> Result<Snapshot>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
} // trait Store

/// Keeps the snapshot as JSON in a file. A missing file loads as an empty snapshot. Saving
/// writes a sibling temporary file first and renames it over the target.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
} // struct JsonFileStore

impl JsonFileStore {

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonFileStore{path: path.as_ref().to_path_buf()}
    } // new

    pub fn path(&self) -> &Path {
        &self.path
    } // path

} // impl JsonFileStore

impl Store for JsonFileStore {

    fn load(&self) -> Result<Snapshot> {
        trace!("loading acls from {}", self.path.display());
        if !self.path.exists() {
            trace!("    {} missing, starting empty", self.path.display());
            return Ok(Snapshot::default());
        } // if
        Snapshot::from_json(&fs::read_to_string(&self.path).map_err(store_err)?)
    } // load

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        trace!("saving acls to {}", self.path.display());
        let mut tmp = OsString::from(self.path.as_os_str());

        tmp.push(".tmp");
        fs::write(&tmp, snapshot.to_json()?).map_err(store_err)?;
        fs::rename(&tmp, &self.path).map_err(store_err)
    } // save

} // impl Store for JsonFileStore

/// Keeps the snapshot as JSON in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: Mutex<Option<String>>,
} // struct MemoryStore

impl MemoryStore {

    pub fn new() -> Self {
        MemoryStore::default()
    } // new

    /// The JSON saved last, if any.
    pub fn contents(&self) -> Option<String> {
        self.json.lock().unwrap_or_else(|p| p.into_inner()).clone()
    } // contents

} // impl MemoryStore

impl Store for MemoryStore {

    fn load(&self) -> Result<Snapshot> {
        match self.contents() {
            Some(json) => Snapshot::from_json(&json),
            None       => Ok(Snapshot::default()),
        } // match
    } // load

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot.to_json()?;

        *self.json.lock().unwrap_or_else(|p| p.into_inner()) = Some(json);
        Ok(())
    } // save

} // impl Store for MemoryStore


// Configuration //////////////////////////////////////////////////////////////////////////////////


/// Resolver settings, usually read from a JSON file:
///
/// ```json
/// { "base": "dc=gonicus,dc=de", "store": "/var/lib/acl/acls.json" }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Walks never go above this location.
    pub base:  String,
    /// Where rules and roles are persisted, if anywhere.
    pub store: Option<PathBuf>,
} // struct ResolverConfig

impl Default for ResolverConfig {

    fn default() -> Self {
        ResolverConfig{base: String::from("dc=example,dc=com"), store: None}
    } // default

} // impl Default for ResolverConfig

impl ResolverConfig {

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        trace!("reading config from {}", path.as_ref().display());
        fs::read_to_string(path).map_err(store_err)?.parse()
    } // from_file

} // impl ResolverConfig

impl FromStr for ResolverConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(store_err)
    } // from_str

} // impl FromStr for ResolverConfig


// Tests //////////////////////////////////////////////////////////////////////////////////////////


// mod tests
