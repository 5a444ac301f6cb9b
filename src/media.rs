//! Media inputs and their resolution against the [MediaSlot]s of a template.
//!
//! A [MediaInput] is one descriptor: a content type plus either raw bytes or a reference.
//! Nothing here encodes; base64 and data URLs are produced by [crate::adapters::wire].

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use log::warn;
use url::Url;

use crate::message::ContentBlock;
use crate::template::MediaSlot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// Raw bytes of the attachment.
    Inline(Vec<u8>),
    /// A reference the provider fetches itself.
    Uri(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    pub content_type: String,
    pub payload: MediaPayload,
}

impl MediaInput {
    pub fn bytes(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            payload: MediaPayload::Inline(data.into()),
        }
    }

    pub fn uri(content_type: impl Into<String>, url: Url) -> Self {
        Self {
            content_type: content_type.into(),
            payload: MediaPayload::Uri(url),
        }
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.payload, MediaPayload::Inline(_))
    }
}

/// Named media inputs for one bind. Iterates in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInputCollection {
    inputs: BTreeMap<String, MediaInput>,
}

impl MediaInputCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an input, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, input: MediaInput) -> Option<MediaInput> {
        self.inputs.insert(name.into(), input)
    }

    pub fn with(mut self, name: impl Into<String>, input: MediaInput) -> Self {
        self.insert(name, input);
        self
    }

    pub fn get(&self, name: &str) -> Option<&MediaInput> {
        self.inputs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MediaInput> {
        self.inputs.iter()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, MediaInput)> for MediaInputCollection {
    fn from_iter<T: IntoIterator<Item = (N, MediaInput)>>(iter: T) -> Self {
        Self {
            inputs: iter.into_iter().map(|(name, input)| (name.into(), input)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MediaInputCollection {
    type Item = (&'a String, &'a MediaInput);
    type IntoIter = btree_map::Iter<'a, String, MediaInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.inputs.iter()
    }
}

/// Builds the content block for `slot`, or `None` when no input carries its name.
pub(crate) fn resolve_slot(inputs: Option<&MediaInputCollection>, slot: &MediaSlot) -> Option<ContentBlock> {
    let media = inputs?.get(&slot.placeholder_name)?;
    Some(ContentBlock::Media {
        slot_name: slot.placeholder_name.clone(),
        kind: slot.kind,
        media: media.clone(),
    })
}

/// Names of inputs no slot referenced, in name order. Each one is logged.
pub(crate) fn unused_inputs(inputs: Option<&MediaInputCollection>, referenced: &BTreeSet<&str>) -> Vec<String> {
    let Some(inputs) = inputs else {
        return Vec::new();
    };
    inputs
        .names()
        .filter(|name| !referenced.contains(name))
        .map(|name| {
            warn!("Media input '{}' is not referenced by any media slot of the template, ignoring it", name);
            name.to_string()
        })
        .collect()
}
