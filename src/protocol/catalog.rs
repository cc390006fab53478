use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SERVER_NAME: &str = "OMSIF Reference Implementation";

/// Submission modes this server supports
pub const FEATURES: [&str; 3] = ["sync", "async", "streaming_upload"];

/// An output shape a client may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

impl Template {
    fn new(id: &str, name: &str, description: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            capabilities: Vec::new(),
            input_schema: None,
        }
    }
}

/// Templates advertised by discovery and the initialize handshake
pub fn template_catalog() -> Vec<Template> {
    vec![
        Template::new("soap_v1", "SOAP Note", Some("Standard SOAP format")),
        Template::new("referral_v1", "Referral Letter", None),
        Template::new("transcript_v1", "Transcript", Some("Verbatim dictation text")),
        Template::new("problem_list_v1", "Problem List", Some("One entry per coded problem")),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: String,
    pub client_info: ImplementationInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ImplementationInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<HashMap<String, serde_json::Value>>,
    pub templates: Vec<Template>,
}

impl InitializeResult {
    /// Answer a handshake, echoing the client's protocol version
    pub fn for_request(req: &InitializeRequest) -> Self {
        let capabilities = FEATURES
            .iter()
            .map(|f| (f.to_string(), serde_json::Value::Bool(true)))
            .collect();

        Self {
            protocol_version: req.protocol_version.clone(),
            server_info: ImplementationInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: Some(capabilities),
            templates: template_catalog(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub provider: String,
    pub features: Vec<String>,
    pub templates: Vec<Template>,
}

impl Default for CapabilitiesResponse {
    fn default() -> Self {
        Self {
            provider: SERVER_NAME.to_string(),
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            templates: template_catalog(),
        }
    }
}
