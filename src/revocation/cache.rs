// Copyright 2015 Brian Smith.
//
// Permission to use, copy, modify, and/or distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHORS DISCLAIM ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHORS BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::crl::CertRevocationList;

/// Whether a cached CRL has been verified against the issuer of a
/// certificate that referenced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationState {
    /// Freshly downloaded; the signature and freshness have not been checked.
    Unchecked,
    /// Verified against its issuer.
    Checked,
}

/// A cached CRL with the timestamps that drive refetching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrlInfo {
    /// The parsed list.
    pub crl: Arc<CertRevocationList>,
    /// The origin's Last-Modified time, or the CRL's thisUpdate when the
    /// origin sent none. Used for If-Modified-Since.
    pub last_modified: DateTime<Utc>,
    /// When this entry was last downloaded or revalidated with the origin.
    pub created: DateTime<Utc>,
    /// Verification state of `crl`.
    pub state: VerificationState,
}

impl CrlInfo {
    /// A freshly downloaded, not yet verified entry.
    pub fn unchecked(
        crl: CertRevocationList,
        last_modified: DateTime<Utc>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            crl: Arc::new(crl),
            last_modified,
            created,
            state: VerificationState::Unchecked,
        }
    }

    pub(crate) fn checked(self) -> Self {
        Self {
            state: VerificationState::Checked,
            ..self
        }
    }

    pub(crate) fn revalidated(self, created: DateTime<Utc>) -> Self {
        Self { created, ..self }
    }
}

/// A store of CRLs keyed by distribution point URL.
///
/// Implementations must be safe to share between threads. Concurrent
/// updates of one key resolve as "last update wins". A returned [`CrlInfo`]
/// is a snapshot.
pub trait CrlCache: Send + Sync {
    /// The entry for `url`, if any.
    fn get(&self, url: &str) -> Option<CrlInfo>;

    /// Store `info` under `url` and return it, or remove the entry and
    /// return `None` when `info` is `None`.
    fn update(&self, url: &str, info: Option<CrlInfo>) -> Option<CrlInfo>;

    /// A snapshot of every entry, in no particular order.
    fn entries(&self) -> Vec<(String, CrlInfo)>;

    /// Remove every entry.
    fn clear(&self);
}

/// A process-local [`CrlCache`].
#[derive(Debug, Default)]
pub struct InMemoryCrlCache {
    entries: RwLock<HashMap<String, CrlInfo>>,
}

impl InMemoryCrlCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrlCache for InMemoryCrlCache {
    fn get(&self, url: &str) -> Option<CrlInfo> {
        self.entries.read().get(url).cloned()
    }

    fn update(&self, url: &str, info: Option<CrlInfo>) -> Option<CrlInfo> {
        let mut entries = self.entries.write();
        match info {
            Some(info) => {
                entries.insert(url.to_owned(), info.clone());
                Some(info)
            }
            None => {
                entries.remove(url);
                None
            }
        }
    }

    fn entries(&self) -> Vec<(String, CrlInfo)> {
        self.entries
            .read()
            .iter()
            .map(|(url, info)| (url.clone(), info.clone()))
            .collect()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}
