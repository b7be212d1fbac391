use serde::{Deserialize, Serialize};

/// The cooling unit under test.
///
/// A new row is written for every accepted submission; there is no key
/// that identifies the same physical unit across inspections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
}
