use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Which part of the exchange a data field was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSection {
    ReqPath,
    ReqQuery,
    ReqHeader,
    ReqBody,
    ResHeader,
    ResBody,
}

impl DataSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSection::ReqPath => "reqPath",
            DataSection::ReqQuery => "reqQuery",
            DataSection::ReqHeader => "reqHeader",
            DataSection::ReqBody => "reqBody",
            DataSection::ResHeader => "resHeader",
            DataSection::ResBody => "resBody",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reqPath" => Some(DataSection::ReqPath),
            "reqQuery" => Some(DataSection::ReqQuery),
            "reqHeader" => Some(DataSection::ReqHeader),
            "reqBody" => Some(DataSection::ReqBody),
            "resHeader" => Some(DataSection::ResHeader),
            "resBody" => Some(DataSection::ResBody),
            _ => None,
        }
    }
}

impl fmt::Display for DataSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specific location within request/response data with a detected type and
/// the set of data classes matched there. Identity is
/// (endpoint, section, path); class sets accumulate over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataField {
    pub endpoint_id: Uuid,
    pub data_section: DataSection,
    pub data_path: String,
    pub data_type: String,
    pub data_classes: BTreeSet<String>,
    pub entity: Option<String>,
}

impl DataField {
    /// Dotted location key, e.g. `reqBody.user.email`.
    pub fn location(&self) -> String {
        location_key(self.data_section, &self.data_path)
    }
}

pub fn location_key(section: DataSection, path: &str) -> String {
    if path.is_empty() {
        section.as_str().to_string()
    } else {
        format!("{}.{}", section.as_str(), path)
    }
}
