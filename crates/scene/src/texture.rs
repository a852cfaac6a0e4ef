use std::collections::BTreeMap;

use crate::material::TextureId;

/// Capability for requesting textures by URL.
///
/// Loading is asynchronous on real surfaces: a returned id is usable right
/// away and samples as blank until the image arrives.
pub trait TextureLoader {
    /// Empty URLs yield `None`; repeated URLs yield the same id.
    fn load_texture(&mut self, url: &str) -> Option<TextureId>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureState {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone)]
struct TextureEntry {
    url: String,
    state: TextureState,
}

/// URL-deduplicating texture bookkeeping with load-state tracking.
///
/// Ids are dense and issued in request order.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    by_url: BTreeMap<String, TextureId>,
    entries: Vec<TextureEntry>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, url: &str) -> Option<TextureId> {
        if url.is_empty() {
            return None;
        }
        if let Some(id) = self.by_url.get(url) {
            return Some(*id);
        }
        let id = TextureId(self.entries.len() as u32);
        self.entries.push(TextureEntry {
            url: url.to_string(),
            state: TextureState::Pending,
        });
        self.by_url.insert(url.to_string(), id);
        Some(id)
    }

    pub fn mark_loaded(&mut self, id: TextureId) {
        self.set_state(id, TextureState::Loaded);
    }

    pub fn mark_failed(&mut self, id: TextureId) {
        self.set_state(id, TextureState::Failed);
    }

    fn set_state(&mut self, id: TextureId, state: TextureState) {
        if let Some(entry) = self.entries.get_mut(id.0 as usize) {
            entry.state = state;
        }
    }

    pub fn state(&self, id: TextureId) -> Option<TextureState> {
        self.entries.get(id.0 as usize).map(|e| e.state)
    }

    pub fn url(&self, id: TextureId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.url.as_str())
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Loaded or failed.
    pub fn settled(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state != TextureState::Pending)
            .count()
    }

    pub fn pending(&self) -> impl Iterator<Item = (TextureId, &str)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == TextureState::Pending)
            .map(|(i, e)| (TextureId(i as u32), e.url.as_str()))
    }

    pub fn clear(&mut self) {
        self.by_url.clear();
        self.entries.clear();
    }
}

impl TextureLoader for TextureRegistry {
    fn load_texture(&mut self, url: &str) -> Option<TextureId> {
        self.request(url)
    }
}

#[cfg(test)]
mod tests {
    use super::{TextureLoader, TextureRegistry, TextureState};

    #[test]
    fn empty_urls_are_skipped_and_repeats_dedupe() {
        let mut reg = TextureRegistry::new();
        assert_eq!(reg.load_texture(""), None);
        let a = reg.load_texture("a.png").expect("id");
        let b = reg.load_texture("b.png").expect("id");
        assert_eq!(reg.load_texture("a.png"), Some(a));
        assert_ne!(a, b);
        assert_eq!(reg.total(), 2);
    }

    #[test]
    fn tracks_settled_textures() {
        let mut reg = TextureRegistry::new();
        let a = reg.request("a").expect("id");
        let b = reg.request("b").expect("id");
        reg.mark_loaded(a);
        assert_eq!(reg.settled(), 1);
        assert_eq!(reg.pending().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
        reg.mark_failed(b);
        assert_eq!(reg.settled(), 2);
        assert_eq!(reg.state(b), Some(TextureState::Failed));
    }
}
