use layers::OverlaySurface;
use scene::{Lighting, NodeId, OrbitCamera, SceneGraph, TextureLoader};

use crate::input::ContainerRect;
use crate::level::Level;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// Textures requested so far and how many finished, loaded or failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TextureStatus {
    pub settled: usize,
    pub total: usize,
}

impl TextureStatus {
    pub fn is_settled(&self) -> bool {
        self.settled >= self.total
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Copy, Clone)]
pub struct RenderFrame<'a> {
    pub graph: &'a SceneGraph,
    pub camera: &'a OrbitCamera,
    pub lighting: &'a Lighting,
}

/// Host capabilities the scene draws through: GPU surface, DOM label
/// overlay and texture loading.
pub trait SceneSurface: OverlaySurface + TextureLoader {
    /// Drawable size in CSS pixels.
    fn viewport(&self) -> (f64, f64);
    fn container_rect(&self) -> ContainerRect;
    fn resize(&mut self, width: f64, height: f64);
    fn set_cursor(&mut self, cursor: Cursor);
    /// Mirrors the level onto the host (a data attribute on the DOM side).
    fn set_level_marker(&mut self, _level: Level) {}
    fn texture_status(&self) -> TextureStatus;
    fn render(&mut self, frame: RenderFrame<'_>);
    /// Free whatever the renderer holds for removed nodes.
    fn release_nodes(&mut self, nodes: &[NodeId]);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, BTreeSet};

    use layers::{LabelPlacement, LabelTemplate, OverlaySurface};
    use scene::{LabelElementId, NodeId, TextureId, TextureLoader, TextureRegistry};

    use super::{Cursor, RenderFrame, SceneSurface, TextureStatus};
    use crate::input::ContainerRect;
    use crate::level::Level;

    /// Label element double: either built-in markup text or a caller tag.
    pub type TestElement = String;

    /// Surface double that records what the scene asked of it.
    #[derive(Debug)]
    pub struct RecordingSurface {
        pub size: (f64, f64),
        pub textures: TextureRegistry,
        next_label: u64,
        pub attached: BTreeMap<u64, TestElement>,
        pub detached: Vec<u64>,
        pub placements: BTreeMap<u64, Option<LabelPlacement>>,
        pub cursor: Cursor,
        pub level_marker: Option<Level>,
        pub frames: usize,
        pub last_node_count: usize,
        pub released: BTreeSet<NodeId>,
        pub resizes: Vec<(f64, f64)>,
    }

    impl Default for RecordingSurface {
        fn default() -> Self {
            Self {
                size: (1200.0, 800.0),
                textures: TextureRegistry::new(),
                next_label: 0,
                attached: BTreeMap::new(),
                detached: Vec::new(),
                placements: BTreeMap::new(),
                cursor: Cursor::Default,
                level_marker: None,
                frames: 0,
                last_node_count: 0,
                released: BTreeSet::new(),
                resizes: Vec::new(),
            }
        }
    }

    impl RecordingSurface {
        pub fn element_id(&self, text: &str) -> Option<LabelElementId> {
            self.attached
                .iter()
                .find(|(_, t)| t.as_str() == text)
                .map(|(id, _)| LabelElementId(*id))
        }

        /// Settle every requested texture as loaded.
        pub fn finish_textures(&mut self) {
            let pending: Vec<TextureId> = self.textures.pending().map(|(id, _)| id).collect();
            for id in pending {
                self.textures.mark_loaded(id);
            }
        }
    }

    impl OverlaySurface for RecordingSurface {
        type Element = TestElement;

        fn create_label(&mut self, template: &LabelTemplate) -> Option<TestElement> {
            Some(template.text.clone())
        }

        fn attach_label(&mut self, element: TestElement) -> LabelElementId {
            self.next_label += 1;
            self.attached.insert(self.next_label, element);
            LabelElementId(self.next_label)
        }

        fn detach_label(&mut self, id: LabelElementId) {
            self.attached.remove(&id.0);
            self.placements.remove(&id.0);
            self.detached.push(id.0);
        }

        fn place_label(&mut self, id: LabelElementId, placement: Option<LabelPlacement>) {
            self.placements.insert(id.0, placement);
        }
    }

    impl TextureLoader for RecordingSurface {
        fn load_texture(&mut self, url: &str) -> Option<TextureId> {
            self.textures.load_texture(url)
        }
    }

    impl SceneSurface for RecordingSurface {
        fn viewport(&self) -> (f64, f64) {
            self.size
        }

        fn container_rect(&self) -> ContainerRect {
            ContainerRect::new(0.0, 0.0, self.size.0, self.size.1)
        }

        fn resize(&mut self, width: f64, height: f64) {
            self.size = (width, height);
            self.resizes.push((width, height));
        }

        fn set_cursor(&mut self, cursor: Cursor) {
            self.cursor = cursor;
        }

        fn set_level_marker(&mut self, level: Level) {
            self.level_marker = Some(level);
        }

        fn texture_status(&self) -> TextureStatus {
            TextureStatus {
                settled: self.textures.settled(),
                total: self.textures.total(),
            }
        }

        fn render(&mut self, frame: RenderFrame<'_>) {
            self.frames += 1;
            self.last_node_count = frame.graph.len();
        }

        fn release_nodes(&mut self, nodes: &[NodeId]) {
            self.released.extend(nodes.iter().copied());
        }
    }
}
