//! The model collaborator: prompt construction, the API call, and
//! extraction of a change-set document from the model's reply.

pub mod client;
pub mod parse;
pub mod prompts;

pub use client::{ModelError, ModelReply, ModelSettings};
