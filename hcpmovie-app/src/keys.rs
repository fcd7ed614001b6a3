use hcpmovie_core::Key;
use winit::keyboard::{Key as LogicalKey, NamedKey};

/// Translates a winit logical key into the names used in settings
pub fn from_logical(key: &LogicalKey) -> Option<Key> {
    match key {
        LogicalKey::Named(NamedKey::Space) => Some(Key::Space),
        LogicalKey::Named(NamedKey::Escape) => Some(Key::Escape),
        LogicalKey::Named(NamedKey::Enter) => Some(Key::Enter),
        LogicalKey::Named(named) => Some(Key::Named(format!("{:?}", named).to_lowercase())),
        LogicalKey::Character(text) => text.as_str().parse().ok(),
        _ => None,
    }
}
