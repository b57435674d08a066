//! Action patterns.
//!
//! An action is a dot separated capability name such as `com.gosa.factory`. Rules refer to
//! actions through patterns which may contain two kinds of wildcards:
//!
//! * `*` matches any run of characters, dots included. `com.*.factory` therefore matches
//!   `com.gosa.factory` as well as `com.gonicus.gosa.factory`.
//! * `#` matches any run of characters except the dot and so never crosses a segment boundary.
//!   `com.#.factory` matches `com.gosa.factory` but not `com.gonicus.gosa.factory`.
//!
//! Patterns are always anchored at both ends, partial matches never succeed.

use log::{trace, warn};
use regex::Regex;
use std::fmt;

use crate::Error;


// Tokens /////////////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, PartialEq)]
enum Token<'a> {
    Literal(&'a str),
    Star,
    Hash,
} // enum Token

fn tokenize(pattern: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start  = 0;

    for (i, c) in pattern.char_indices() {
        if c == '*' || c == '#' {
            if start < i {
                tokens.push(Token::Literal(&pattern[start..i]));
            } // if
            tokens.push(if c == '*' { Token::Star } else { Token::Hash });
            start = i + 1;
        } // if
    } // for
    if start < pattern.len() {
        tokens.push(Token::Literal(&pattern[start..]));
    } // if
    tokens
} // tokenize


// ActionPattern //////////////////////////////////////////////////////////////////////////////////


/// A compiled action pattern. Compilation happens once, at construction, so a malformed pattern
/// is rejected before it can reach a rule.
#[derive(Clone)]
pub struct ActionPattern {
    source: String,
    regex:  Regex,
} // struct ActionPattern

impl ActionPattern {

    /// Compiles `pattern`. Empty patterns and patterns with empty segments (`com..factory`,
    /// `.com`, `com.`) are rejected with [`Error::Compile`].
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        trace!("compiling action pattern {}", pattern);
        if pattern.is_empty() {
            warn!("rejecting empty action pattern");
            return Err(Error::Compile{pattern: String::new(), reason: String::from("empty pattern")});
        } // if
        if pattern.split('.').any(str::is_empty) {
            warn!("rejecting action pattern with empty segment: {}", pattern);
            return Err(Error::Compile{
                pattern: String::from(pattern),
                reason:  String::from("empty segment"),
            });
        } // if

        let mut expr = String::with_capacity(pattern.len() * 2 + 2);

        expr.push('^');
        for token in tokenize(pattern) {
            match token {
                Token::Literal(s) => expr.push_str(&regex::escape(s)),
                Token::Star       => expr.push_str(".*"),
                Token::Hash       => expr.push_str("[^.]*"),
            } // match
        } // for
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            warn!("failed to compile action pattern {}: {}", pattern, e);
            Error::Compile{pattern: String::from(pattern), reason: e.to_string()}
        })?;

        Ok(ActionPattern{source: String::from(pattern), regex})
    } // compile

    /// Returns true if `action` is matched by this pattern as a whole.
    #[inline]
    pub fn matches(&self, action: &str) -> bool {
        self.regex.is_match(action)
    } // matches

    /// The pattern as it was written.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    } // as_str

} // impl ActionPattern

impl fmt::Debug for ActionPattern {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionPattern({:?})", self.source)
    } // fmt

} // impl fmt::Debug for ActionPattern

impl fmt::Display for ActionPattern {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    } // fmt

} // impl fmt::Display for ActionPattern

impl PartialEq for ActionPattern {

    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    } // eq

} // impl PartialEq for ActionPattern


// Tests //////////////////////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {

    use super::*;
    use test_env_log::test;

    #[test]
    fn tokens() {
        assert_eq!(tokenize("com.gosa"), vec![Token::Literal("com.gosa")]);
        assert_eq!(
            tokenize("com.*.#"),
            vec![Token::Literal("com."), Token::Star, Token::Literal("."), Token::Hash]
        );
        assert_eq!(tokenize("*"), vec![Token::Star]);
    } // tokens

    #[test]
    fn literal() {
        let p = ActionPattern::compile("com.gosa.factory").unwrap();

        assert!( p.matches("com.gosa.factory"));
        assert!(!p.matches("com.gosa.factoryx"));
        assert!(!p.matches("xcom.gosa.factory"));
        // dots are literal, not regex wildcards
        assert!(!p.matches("comXgosa.factory"));
    } // literal

    #[test]
    fn hash_stays_within_segment() {
        let p = ActionPattern::compile("com.#.factory").unwrap();

        assert!( p.matches("com.gosa.factory"));
        assert!( p.matches("com.gonicus.factory"));
        assert!(!p.matches("com.gonicus.gosa.factory"));
    } // hash_stays_within_segment

    #[test]
    fn star_crosses_segments() {
        let p = ActionPattern::compile("com.*.factory").unwrap();

        assert!( p.matches("com.gosa.factory"));
        assert!( p.matches("com.gonicus.factory"));
        assert!( p.matches("com.gonicus.gosa.factory"));
        assert!(!p.matches("org.gosa.factory"));
    } // star_crosses_segments

    #[test]
    fn wildcard_inside_segment() {
        let p = ActionPattern::compile("com.go#.factory").unwrap();

        assert!( p.matches("com.gosa.factory"));
        assert!( p.matches("com.go.factory"));
        assert!(!p.matches("com.wurst.factory"));
    } // wildcard_inside_segment

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = ActionPattern::compile("com.(gosa)+.x").unwrap();

        assert!( p.matches("com.(gosa)+.x"));
        assert!(!p.matches("com.gosagosa.x"));
    } // regex_metacharacters_are_literal

    #[test]
    fn malformed() {
        assert!(matches!(ActionPattern::compile(""), Err(Error::Compile{..})));
        assert!(matches!(ActionPattern::compile("com..factory"), Err(Error::Compile{..})));
        assert!(matches!(ActionPattern::compile(".com"), Err(Error::Compile{..})));
        assert!(matches!(ActionPattern::compile("com."), Err(Error::Compile{..})));
    } // malformed

} // mod tests
