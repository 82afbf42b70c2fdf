//! Newtype wrappers for improved type safety and domain modeling.

use std::{borrow::Borrow, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical, text-safe key for a game state.
///
/// Produced by [`crate::codec::encode`]. Two structurally equal states always
/// map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Get the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the encoded key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for StateKey {
    fn from(value: String) -> Self {
        StateKey(value)
    }
}

impl From<&str> for StateKey {
    fn from(value: &str) -> Self {
        StateKey(value.to_string())
    }
}

impl Borrow<str> for StateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text form of a whole value-table snapshot, as written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot(String);

impl EncodedSnapshot {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Size of the encoded snapshot in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for EncodedSnapshot {
    fn from(value: String) -> Self {
        EncodedSnapshot(value)
    }
}

/// An action, identified by its index in an [`ActionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action(usize);

impl Action {
    /// Index of the action inside its action set.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed, ordered set of action tokens the agent may emit.
///
/// Cloning is cheap; the tokens are shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ActionSet {
    tokens: Arc<[String]>,
}

impl ActionSet {
    /// Create an action set from its tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidActionSet`] if the set is empty, a token is
    /// blank, or a token appears twice.
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(Error::InvalidActionSet {
                reason: "at least one action is required".to_string(),
            });
        }
        for (i, token) in tokens.iter().enumerate() {
            if token.trim().is_empty() {
                return Err(Error::InvalidActionSet {
                    reason: format!("action {i} has a blank token"),
                });
            }
            if tokens[..i].contains(token) {
                return Err(Error::InvalidActionSet {
                    reason: format!("duplicate action token '{token}'"),
                });
            }
        }
        Ok(Self {
            tokens: tokens.into(),
        })
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate over all actions in order.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        (0..self.tokens.len()).map(Action)
    }

    /// Action at `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<Action> {
        (index < self.tokens.len()).then_some(Action(index))
    }

    /// Action at `index`, clamped to the last action of the set.
    pub(crate) fn action_at(&self, index: usize) -> Action {
        Action(index.min(self.tokens.len().saturating_sub(1)))
    }

    /// Wire token for an action.
    ///
    /// Actions from a different, larger set render as `"?"`.
    pub fn token(&self, action: Action) -> &str {
        self.tokens.get(action.0).map(String::as_str).unwrap_or("?")
    }

    /// Look up an action by its token.
    pub fn parse(&self, token: &str) -> Option<Action> {
        self.tokens.iter().position(|t| t == token).map(Action)
    }

    /// Like [`ActionSet::parse`] but reports the expected tokens on failure.
    pub fn parse_strict(&self, token: &str) -> Result<Action> {
        self.parse(token).ok_or_else(|| Error::UnknownAction {
            token: token.to_string(),
            expected: self.tokens.join(", "),
        })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl Default for ActionSet {
    /// Movement tokens understood by the game bridge.
    fn default() -> Self {
        Self {
            tokens: ["up", "down", "left", "right"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
                .into(),
        }
    }
}

impl TryFrom<Vec<String>> for ActionSet {
    type Error = Error;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        ActionSet::new(tokens)
    }
}

impl From<ActionSet> for Vec<String> {
    fn from(set: ActionSet) -> Self {
        set.tokens.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_action_set_uses_movement_tokens() {
        let set = ActionSet::default();
        assert_eq!(set.len(), 4);
        assert_eq!(set.tokens(), ["up", "down", "left", "right"]);
        let left = set.parse("left").unwrap();
        assert_eq!(left.index(), 2);
        assert_eq!(set.token(left), "left");
    }

    #[test]
    fn action_set_rejects_duplicates_and_blanks() {
        assert!(ActionSet::new(["a", "b", "a"]).is_err());
        assert!(ActionSet::new(["a", " "]).is_err());
        assert!(ActionSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn parse_strict_lists_expected_tokens() {
        let set = ActionSet::default();
        let err = set.parse_strict("jump").unwrap_err();
        assert!(err.to_string().contains("up, down, left, right"));
    }

    #[test]
    fn action_set_serializes_as_token_list() {
        let set = ActionSet::new(["fire", "wait"]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["fire","wait"]"#);
        let back: ActionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<ActionSet>("[]").is_err());
    }

    #[test]
    fn state_key_borrows_as_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(StateKey::from("abc"), 1);
        assert_eq!(map.get("abc"), Some(&1));
    }
}
