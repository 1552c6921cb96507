use crate::{ChangeViewReason, ViewNumber};
use serde::{Deserialize, Serialize};

/// Request to move to `view_number + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeView {
    pub view_number: ViewNumber,
    pub timestamp: u64,
    pub reason: ChangeViewReason,
}

impl ChangeView {
    #[inline]
    pub fn new_view_number(&self) -> ViewNumber {
        self.view_number.saturating_add(1)
    }
}
