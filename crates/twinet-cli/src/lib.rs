//! twinet command line support
//!
//! The binary wires configuration, logging and the artifact store together
//! and runs the [`network`] pipeline once per dataset identifier.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod network;

pub use network::{build_pipeline, NetworkArtifacts, PIPELINE};
