use scene::NodeId;

use crate::level::Level;

/// Region under the pointer, as tagged on the hit mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HoverTarget<'a> {
    pub region: &'a str,
    pub clickable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverAction {
    Ignore,
    /// Leave whatever is hovered, then raise `region`.
    Enter { region: String },
    Leave,
}

/// The hovered region and the meshes raised for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverState {
    key: Option<String>,
    meshes: Vec<NodeId>,
}

impl HoverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn meshes(&self) -> &[NodeId] {
        &self.meshes
    }

    pub fn is_active(&self) -> bool {
        self.key.is_some()
    }

    /// Dedupe by key; anything that cannot be hovered routes to leave, and
    /// leaving with nothing hovered is ignored.
    pub fn decide(&self, hit: Option<HoverTarget<'_>>, level: Level) -> HoverAction {
        let leave = if self.is_active() {
            HoverAction::Leave
        } else {
            HoverAction::Ignore
        };
        let Some(target) = hit else {
            return leave;
        };
        if !level.is_interactive() || !target.clickable {
            return leave;
        }
        if self.key.as_deref() == Some(target.region) {
            return HoverAction::Ignore;
        }
        HoverAction::Enter {
            region: target.region.to_string(),
        }
    }

    pub fn enter(&mut self, region: String, meshes: Vec<NodeId>) {
        self.key = Some(region);
        self.meshes = meshes;
    }

    /// Clear the state, handing back what was hovered.
    pub fn take(&mut self) -> Option<(String, Vec<NodeId>)> {
        let key = self.key.take()?;
        Some((key, std::mem::take(&mut self.meshes)))
    }
}

#[cfg(test)]
mod tests {
    use super::{HoverAction, HoverState, HoverTarget};
    use crate::level::Level;
    use foundation::handles::Handle;
    use scene::NodeId;

    fn target(region: &str) -> Option<HoverTarget<'_>> {
        Some(HoverTarget {
            region,
            clickable: true,
        })
    }

    #[test]
    fn enter_dedupes_by_region() {
        let mut hover = HoverState::new();
        assert_eq!(
            hover.decide(target("A"), Level::Province),
            HoverAction::Enter { region: "A".into() }
        );
        hover.enter("A".into(), vec![NodeId(Handle::new(1, 0))]);
        assert_eq!(hover.decide(target("A"), Level::Province), HoverAction::Ignore);
        assert_eq!(
            hover.decide(target("B"), Level::City),
            HoverAction::Enter { region: "B".into() }
        );
    }

    #[test]
    fn leave_happens_once() {
        let mut hover = HoverState::new();
        hover.enter("A".into(), Vec::new());
        assert_eq!(hover.decide(None, Level::Province), HoverAction::Leave);
        assert_eq!(hover.take().map(|(k, _)| k), Some("A".to_string()));
        assert_eq!(hover.decide(None, Level::Province), HoverAction::Ignore);
        assert!(hover.take().is_none());
    }

    #[test]
    fn unclickable_and_district_meshes_leave() {
        let mut hover = HoverState::new();
        hover.enter("A".into(), Vec::new());
        let blocked = Some(HoverTarget {
            region: "B",
            clickable: false,
        });
        assert_eq!(hover.decide(blocked, Level::City), HoverAction::Leave);
        assert_eq!(hover.decide(target("B"), Level::District), HoverAction::Leave);
    }
}
