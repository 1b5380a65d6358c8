//! Two-input audio mixing on top of FFmpeg.
//!
//! A job probes both inputs, attenuates the shorter one, loops it to the
//! length of the other and mixes the pair into one encoded file. Every
//! intermediate file belongs to the job and is gone once it ends; the
//! result lives until the caller confirms delivery.
//!
//! [`Mixer`] is the entry point. Front ends (the `mixdown` CLI, an upload
//! service) only build a [`MixRequest`] and consume the [`MixOutcome`].

pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use orchestrator::{MixOutcome, MixRequest, Mixer};
