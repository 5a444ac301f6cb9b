//! # promptbind
//!
//! Fetch versioned prompt templates, bind variables, history and media into them, and format the
//! result for the model provider the template was written for.
//!
//! ## Usage
//! ```toml
//! promptbind = { git = "https://github.com/promptbind/promptbind.git", branch = "main"}
//! ```
//!
//! ## Concepts and Design
//! The pipeline is data-driven and every step is explicit:
//!
//! ```text
//! TemplateResolver -> TemplateDefinition -> bind -> BoundPrompt -> format -> FormattedPrompt
//!                                                                              |
//!                              (your provider call) -> all_messages(completion) -> RecordInfo
//! ```
//!
//! Binding and formatting are synchronous and pure. Only the resolvers and the recording client
//! do I/O.
//!
//! ### Template and Placeholder
//!
//! A template is an ordered list of role-tagged messages. Text parts use mustache syntax:
//!
//! ```text
//! You are a friendly and helpful assistant. Today is {{date}}.
//! ```
//!
//! `{{date}}` is a variable placeholder. Dotted paths (`{{user.name}}`), sections
//! (`{{#items}}...{{/items}}`) and inverted sections (`{{^items}}...{{/items}}`) are supported.
//! A placeholder with no value, and no template default, fails the bind with
//! [BindError::MissingVariable](crate::error::BindError::MissingVariable). Values are inserted
//! verbatim, never HTML-escaped.
//!
//! Messages can also carry media slots, filled from a [MediaInputCollection](crate::media::MediaInputCollection)
//! by name.
//!
//! ### Bind
//!
//! [TemplateDefinition::bind](crate::template::TemplateDefinition::bind) substitutes variables,
//! puts any supplied history in front of the rendered messages and resolves media slots. The
//! result, a [BoundPrompt](crate::bind::BoundPrompt), is provider neutral.
//!
//! ### Format
//!
//! The template's flavor picks one [ProviderAdapter](crate::adapters::ProviderAdapter), which
//! shapes the bound messages into a flat string, a chat array or structured content blocks.
//! [FormattedPrompt::to_wire](crate::formatted::FormattedPrompt::to_wire) gives the provider's JSON.
//!
//! ### Filler
//!
//! Anything that implements [FillPlaceholders](crate::filler::FillPlaceholders) and one of
//! [Fill](crate::filler::Fill), [FillMut](crate::filler::FillMut), [FillWith<CTX>](crate::filler::FillWith)
//! and [FillWithMut<CTX>](crate::filler::FillWithMut) can contribute to a [BindRequest](crate::bind::BindRequest).
//!
//! ### Record
//!
//! After the provider answers, [RecordInfo](crate::recording::RecordInfo) pairs the transcript with
//! timing, session and trace links, and [Recordings](crate::recording::Recordings) posts it.
//! Feedback and metadata can be attached later with [CustomerFeedback](crate::feedback::CustomerFeedback)
//! and [Metadata](crate::feedback::Metadata).
//!
//! ### Test runs
//!
//! [TestRuns](crate::testruns::TestRuns) starts a run over a stored dataset. Each completion test
//! case yields a [BindRequest](crate::bind::BindRequest) to replay, and
//! [TestRun::test_run_info](crate::testruns::TestRun::test_run_info) links the recorded answer back.
//!
//! ## License
//!
//! `promptbind` is licensed under Apache-2.0.

pub mod adapters;
pub mod bind;
pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod filler;
pub mod formatted;
pub mod history;
mod http;
pub mod media;
pub mod message;
pub mod recording;
pub mod resolver;
pub mod session;
pub mod substitution;
pub mod template;
pub mod testruns;
pub mod utils;

pub use bind::{BindRequest, BoundPrompt};
pub use client::{Client, GetFormattedRequest};
pub use error::Error;
pub use formatted::FormattedPrompt;
pub use template::{MessageSpec, PromptInfo, TemplateDefinition};
