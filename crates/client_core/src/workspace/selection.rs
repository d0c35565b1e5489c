use shared::{
    domain::{AssignmentId, TrackId},
    protocol::Assignment,
};

use crate::error::{ClientError, ClientResult};

/// Tag carried by an assignment-list load. Only the most recently issued
/// request for the open track may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentsRequest {
    pub track_id: TrackId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentsApplied {
    Stale,
    Applied { selection_dropped: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Changed {
        previous: Option<AssignmentId>,
        current: Option<AssignmentId>,
    },
}

#[derive(Debug, Default)]
pub struct AssignmentSelection {
    track_id: Option<TrackId>,
    assignments: Vec<Assignment>,
    selected: Option<AssignmentId>,
    generation: u64,
    loaded: bool,
}

impl AssignmentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.track_id
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn selected(&self) -> Option<AssignmentId> {
        self.selected
    }

    pub fn selected_assignment(&self) -> Option<&Assignment> {
        let selected = self.selected?;
        self.assignments.iter().find(|a| a.id == selected)
    }

    /// Whether a list has been applied since the track was opened.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Switches to `track_id`, dropping the previous list and selection.
    pub fn open_track(&mut self, track_id: TrackId) -> AssignmentsRequest {
        self.track_id = Some(track_id);
        self.assignments.clear();
        self.selected = None;
        self.loaded = false;
        self.next_request(track_id)
    }

    pub fn close_track(&mut self) {
        self.track_id = None;
        self.assignments.clear();
        self.selected = None;
        self.loaded = false;
        self.generation += 1;
    }

    /// Issues a fresh load for the open track. Earlier in-flight loads become stale.
    pub fn reload(&mut self) -> Option<AssignmentsRequest> {
        let track_id = self.track_id?;
        Some(self.next_request(track_id))
    }

    fn next_request(&mut self, track_id: TrackId) -> AssignmentsRequest {
        self.generation += 1;
        AssignmentsRequest {
            track_id,
            generation: self.generation,
        }
    }

    pub fn is_current(&self, request: &AssignmentsRequest) -> bool {
        self.track_id == Some(request.track_id) && self.generation == request.generation
    }

    /// Replaces the whole list. A selection that is no longer part of the
    /// new list is dropped.
    pub fn apply_loaded(
        &mut self,
        request: &AssignmentsRequest,
        assignments: Vec<Assignment>,
    ) -> AssignmentsApplied {
        if !self.is_current(request) {
            return AssignmentsApplied::Stale;
        }
        self.assignments = assignments;
        self.loaded = true;
        let selection_dropped = match self.selected {
            Some(selected) if !self.contains(selected) => {
                self.selected = None;
                true
            }
            _ => false,
        };
        AssignmentsApplied::Applied { selection_dropped }
    }

    pub fn select(&mut self, assignment_id: Option<AssignmentId>) -> ClientResult<SelectionChange> {
        if let Some(id) = assignment_id {
            let Some(track_id) = self.track_id else {
                return Err(ClientError::conflict("no track is open"));
            };
            if !self.contains(id) {
                return Err(ClientError::validation(format!(
                    "assignment {id} is not part of track {track_id}"
                )));
            }
        }
        if self.selected == assignment_id {
            return Ok(SelectionChange::Unchanged);
        }
        let previous = self.selected;
        self.selected = assignment_id;
        Ok(SelectionChange::Changed {
            previous,
            current: assignment_id,
        })
    }

    fn contains(&self, assignment_id: AssignmentId) -> bool {
        self.assignments.iter().any(|a| a.id == assignment_id)
    }
}
