use std::fmt;

use formats::{CityDisplayDatum, DistrictDatum};
use layers::{LabelError, LabelKind};

use crate::level::Level;

/// Notifications produced while the scene is borrowed.
///
/// They are queued on the scene's event bus and dispatched to callbacks
/// once the borrow is released.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Progress(u8),
    Complete,
    LevelChanged {
        level: Level,
        city: Option<String>,
        district: Option<String>,
    },
    CityLabelClicked(CityDisplayDatum),
    DistrictLabelClicked {
        city: String,
        district: String,
        datum: Option<DistrictDatum>,
    },
    CustomLabelClicked {
        id: String,
    },
    CustomLabelHovered {
        id: String,
        hovering: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A city or district renderer returned something other than an
    /// element or a deliberate suppression.
    LabelRenderer {
        kind: LabelKind,
        name: String,
        reason: String,
    },
    CustomLabelRenderer {
        id: String,
        reason: String,
    },
    NotMounted,
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::LabelRenderer { kind, name, reason } => {
                write!(f, "{kind} label renderer failed for {name}: {reason}")
            }
            SceneError::CustomLabelRenderer { id, reason } => {
                write!(f, "custom label renderer failed for {id}: {reason}")
            }
            SceneError::NotMounted => f.write_str("map scene is not mounted"),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<LabelError> for SceneError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::Renderer { kind, name, reason } => {
                SceneError::LabelRenderer { kind, name, reason }
            }
            LabelError::Custom { id, reason } => SceneError::CustomLabelRenderer { id, reason },
        }
    }
}
