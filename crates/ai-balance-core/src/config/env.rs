use std::collections::BTreeMap;

pub const TIMEOUT_ENV: &str = "AI_BALANCE_TIMEOUT_MS";
pub const FORCE_IPV4_ENV: &str = "AI_BALANCE_FORCE_IPV4";

/// Point-in-time copy of the process environment.
///
/// Captured once at start-up and passed around explicitly, so every lookup in
/// a run sees the same values and tests can build one from literal pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Value of `name`, trimmed. Empty or whitespace-only values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// First set variable among `names`, with the name that supplied it.
    pub fn first_of<'a>(&'a self, names: &[&'a str]) -> Option<(&'a str, &'a str)> {
        names
            .iter()
            .find_map(|name| self.get(name).map(|value| (*name, value)))
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    /// Positive integer value of `name`; zero and unparsable values are ignored.
    pub fn positive_u64(&self, name: &str) -> Option<u64> {
        self.get(name)
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.positive_u64(TIMEOUT_ENV)
    }

    pub fn force_ipv4(&self) -> bool {
        self.flag(FORCE_IPV4_ENV)
    }
}
