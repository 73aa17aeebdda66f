use std::str::FromStr;

use chronicle_core::AppError;
use serde::Serialize;

use super::{AuditEventKind, PropertyChange};
use crate::DashboardState;

/// Property carrying an entity's lifecycle state.
pub const STATE_PROPERTY: &str = "state";

/// Human-readable summary of one history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum HistoryLabel {
    /// Entity was created.
    Created,
    /// Entity was deleted.
    Deleted,
    /// Entity changed without a lifecycle transition.
    Edited,
    /// Dashboard was submitted for publication.
    MovedToPublishQueue,
    /// Dashboard was published.
    Published,
    /// Dashboard was archived.
    Archived,
    /// Dashboard went back to draft.
    ReturnedToDraft,
    /// Dashboard was superseded by a newer version.
    MarkedInactive,
}

impl HistoryLabel {
    /// Returns the display phrase.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Deleted => "Deleted",
            Self::Edited => "Edited",
            Self::MovedToPublishQueue => "Moved to publish queue",
            Self::Published => "Published",
            Self::Archived => "Archived",
            Self::ReturnedToDraft => "Returned to draft",
            Self::MarkedInactive => "Marked inactive",
        }
    }

    /// Derives the label from the event kind and the property changes.
    ///
    /// Create and delete win outright. For updates, a change of
    /// [`STATE_PROPERTY`] to a known state picks the label; when several state
    /// changes are present the last one in property order wins.
    #[must_use]
    pub fn derive(event: AuditEventKind, changes: &[PropertyChange]) -> Self {
        match event {
            AuditEventKind::Create => return Self::Created,
            AuditEventKind::Delete => return Self::Deleted,
            AuditEventKind::Update => {}
        }

        changes
            .iter()
            .rev()
            .filter(|change| change.property() == STATE_PROPERTY)
            .find_map(|change| {
                let state = change.new_value().as_str()?;
                DashboardState::from_str(state).ok()
            })
            .map_or(Self::Edited, Self::for_target_state)
    }

    fn for_target_state(state: DashboardState) -> Self {
        match state {
            DashboardState::Draft => Self::ReturnedToDraft,
            DashboardState::PublishPending => Self::MovedToPublishQueue,
            DashboardState::Published => Self::Published,
            DashboardState::Archived => Self::Archived,
            DashboardState::Inactive => Self::MarkedInactive,
        }
    }
}

impl From<HistoryLabel> for &'static str {
    fn from(value: HistoryLabel) -> Self {
        value.as_str()
    }
}

impl FromStr for HistoryLabel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Created" => Ok(Self::Created),
            "Deleted" => Ok(Self::Deleted),
            "Edited" => Ok(Self::Edited),
            "Moved to publish queue" => Ok(Self::MovedToPublishQueue),
            "Published" => Ok(Self::Published),
            "Archived" => Ok(Self::Archived),
            "Returned to draft" => Ok(Self::ReturnedToDraft),
            "Marked inactive" => Ok(Self::MarkedInactive),
            _ => Err(AppError::Validation(format!(
                "unknown history label '{value}'"
            ))),
        }
    }
}
