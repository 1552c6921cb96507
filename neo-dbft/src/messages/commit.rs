use crate::ViewNumber;
use serde::{Deserialize, Serialize};

/// A validator's signature over the proposed header's sign data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub view_number: ViewNumber,
    pub signature: Vec<u8>,
}
