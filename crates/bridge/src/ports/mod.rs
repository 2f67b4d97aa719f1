//! Bridge port definitions.
//!
//! The host environment is an external collaborator: these traits describe
//! what the bridge needs from it without tying the crate to a concrete host.

pub mod outbound;
