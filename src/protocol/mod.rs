//! Wire-level models of the dictation protocol
//!
//! - `request`: the scribe request a client submits (templates, audio, clinical context)
//! - `catalog`: template discovery and the initialize handshake

mod catalog;
mod request;

pub use catalog::{
    template_catalog, CapabilitiesResponse, ImplementationInfo, InitializeRequest,
    InitializeResult, Template, FEATURES, SERVER_NAME,
};
pub use request::{
    AudioConfig, AudioFormat, ContextPayload, EncounterContext, PatientContext, ProviderContext,
    RequestConfig, ScribeRequest,
};
