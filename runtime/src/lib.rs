// Copyright 2026 llm-web Contributors
// SPDX-License-Identifier: Apache-2.0

//! llm-web runtime library: a fictitious web rendered on demand.
//!
//! Every path below `/` names a virtual URL. Its document is produced by a
//! language model, its links are rewritten to stay inside the virtual web,
//! and the result is cached by URL so a page never changes once seen.

pub mod backend;
pub mod cache;
pub mod config;
pub mod loader;
pub mod pipeline;
pub mod resolver;
pub mod rewrite;
pub mod server;
pub mod synth;
