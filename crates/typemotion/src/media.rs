//! Media resources and externally visible handles.
//!
//! A [`MediaResource`] is the binary payload plus its content type. Whenever a
//! resource must be reachable from outside the session (rendering, download),
//! it is published through a [`HandleRegistry`], which hands out a
//! [`MediaHandle`]. Every published handle has to be revoked explicitly at the
//! point the resource is superseded or discarded; [`HandleRegistry::live_count`]
//! makes leaks observable.

use crate::error::{TypeMotionError, TypeMotionResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Binary media data tagged with a MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct MediaResource {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl MediaResource {
    /// Wrap bytes with their content type
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decode a `data:<mime>;base64,<payload>` URL.
    ///
    /// A bare base64 payload without the `data:` prefix is accepted as well and
    /// tagged `application/octet-stream`.
    pub fn from_data_url(url: &str) -> TypeMotionResult<Self> {
        let (mime_type, payload) = match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    TypeMotionError::InvalidPayload {
                        message: "data URL has no payload separator".to_string(),
                    }
                })?;
                let mime = header.split(';').next().unwrap_or_default();
                let mime = if mime.is_empty() {
                    "application/octet-stream"
                } else {
                    mime
                };
                (mime.to_string(), payload)
            }
            None => ("application/octet-stream".to_string(), url),
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| TypeMotionError::InvalidPayload {
                message: format!("base64 decode failed: {e}"),
            })?;

        Ok(Self::new(bytes, mime_type))
    }

    /// Raw bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content type, e.g. `video/mp4`
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload encoded as standard base64
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Render as a `data:` URL
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// File extension conventionally used for the content type
    #[must_use]
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for MediaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaResource")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Map a MIME type (parameters ignored) to a file extension
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "image/gif" => "gif",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Opaque, externally visible reference to a published resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(String);

impl MediaHandle {
    fn allocate() -> Self {
        Self(format!("media:{}", Uuid::new_v4()))
    }

    /// Handle as a URL-like string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource together with the handle it was published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMedia {
    /// The underlying resource
    pub resource: MediaResource,
    /// Handle allocated for it
    pub handle: MediaHandle,
}

/// Registry of live handles, shared by everything that publishes media
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<Mutex<HashMap<MediaHandle, MediaResource>>>,
}

impl HandleRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for `resource`
    pub fn publish(&self, resource: MediaResource) -> PublishedMedia {
        let handle = MediaHandle::allocate();
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone(), resource.clone());
        PublishedMedia { resource, handle }
    }

    /// Release a handle. Returns `false` if it was not live.
    pub fn revoke(&self, handle: &MediaHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle)
            .is_some()
    }

    /// Look up the resource behind a live handle
    #[must_use]
    pub fn resolve(&self, handle: &MediaHandle) -> Option<MediaResource> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }

    /// Whether the handle is still live
    #[must_use]
    pub fn is_live(&self, handle: &MediaHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(handle)
    }

    /// Number of handles that have not been revoked
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
