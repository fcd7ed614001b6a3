use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A key as named in experiment settings (`space`, `escape`, `t`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Space,
    Escape,
    Enter,
    Char(char),
    Named(String),
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty key name".to_string());
        }
        let lower = s.to_lowercase();
        Ok(match lower.as_str() {
            "space" | " " => Key::Space,
            "escape" | "esc" => Key::Escape,
            "return" | "enter" => Key::Enter,
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Named(lower),
                }
            }
        })
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Space => f.write_str("space"),
            Key::Escape => f.write_str("escape"),
            Key::Enter => f.write_str("return"),
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(name) => f.write_str(name),
        }
    }
}

/// A key press (keyboard or scanner trigger) with its timestamp in
/// seconds since experiment start
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub key: Key,
    pub timestamp: f64,
}

impl InputEvent {
    pub fn new(key: Key, timestamp: f64) -> Self {
        Self { key, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_settings_key_names() {
        assert_eq!("space".parse::<Key>().unwrap(), Key::Space);
        assert_eq!("Escape".parse::<Key>().unwrap(), Key::Escape);
        assert_eq!("return".parse::<Key>().unwrap(), Key::Enter);
        assert_eq!("t".parse::<Key>().unwrap(), Key::Char('t'));
        assert_eq!("T".parse::<Key>().unwrap(), Key::Char('t'));
        assert_eq!("f1".parse::<Key>().unwrap(), Key::Named("f1".into()));
        assert!("  ".parse::<Key>().is_err());
    }

    #[test]
    fn display_matches_settings_names() {
        for name in ["space", "escape", "return", "t", "5", "f1"] {
            let key: Key = name.parse().unwrap();
            assert_eq!(key.to_string(), name);
        }
    }
}
