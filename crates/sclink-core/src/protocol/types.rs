//! Small typed vocabulary shared by the envelope and the client facade.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to an sc-memory element.
///
/// Zero is the "empty" address the server uses for "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScAddr(pub u64);

impl ScAddr {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for ScAddr {
    fn from(v: u64) -> Self {
        ScAddr(v)
    }
}

impl fmt::Display for ScAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScAddr({})", self.0)
    }
}

/// Request kinds understood by sc-server (`type` field on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    CheckElements,
    CreateElements,
    CreateElementsByScs,
    DeleteElements,
    Content,
    Keynodes,
    SearchTemplate,
    GenerateTemplate,
    Events,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::CheckElements => "check_elements",
            RequestType::CreateElements => "create_elements",
            RequestType::CreateElementsByScs => "create_elements_by_scs",
            RequestType::DeleteElements => "delete_elements",
            RequestType::Content => "content",
            RequestType::Keynodes => "keynodes",
            RequestType::SearchTemplate => "search_template",
            RequestType::GenerateTemplate => "generate_template",
            RequestType::Events => "events",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event filters a subscription can be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScEventType {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "add_outgoing_edge")]
    AddOutgoingEdge,
    #[serde(rename = "add_ingoing_edge")]
    AddIngoingEdge,
    #[serde(rename = "remove_outgoing_edge")]
    RemoveOutgoingEdge,
    #[serde(rename = "remove_ingoing_edge")]
    RemoveIngoingEdge,
    #[serde(rename = "delete_element")]
    RemoveElement,
    #[serde(rename = "content_change")]
    ChangeContent,
}

impl ScEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScEventType::Unknown => "unknown",
            ScEventType::AddOutgoingEdge => "add_outgoing_edge",
            ScEventType::AddIngoingEdge => "add_ingoing_edge",
            ScEventType::RemoveOutgoingEdge => "remove_outgoing_edge",
            ScEventType::RemoveIngoingEdge => "remove_ingoing_edge",
            ScEventType::RemoveElement => "delete_element",
            ScEventType::ChangeContent => "content_change",
        }
    }
}

/// The three element references carried by an event frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTriple(pub ScAddr, pub ScAddr, pub ScAddr);

impl EventTriple {
    pub fn as_array(&self) -> [ScAddr; 3] {
        [self.0, self.1, self.2]
    }
}
