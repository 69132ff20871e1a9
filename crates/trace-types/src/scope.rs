use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;

/// Name + version shared by a run of spans emitted by one library/SDK.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attrs: Vec<(String, AttributeValue)>,
    pub dropped_attributes_count: u32,
}
