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

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::cert::Certificate;
use crate::error::PkiError;
use crate::fetch::{FetchError, FetchResponse, HttpFetch};
use crate::retry::RetryPolicy;

/// A store of intermediate CA certificates keyed by their caIssuers URL.
pub trait IntermediateCertificateCache: Send + Sync {
    /// The certificate previously stored for `url`.
    fn get(&self, url: &str) -> Option<Arc<Certificate>>;

    /// Store `cert` under `url`.
    fn put(&self, url: &str, cert: Arc<Certificate>);
}

/// A process-local [`IntermediateCertificateCache`]. Entries live as long as
/// the cache.
#[derive(Debug, Default)]
pub struct InMemoryIntermediateCache {
    certs: RwLock<HashMap<String, Arc<Certificate>>>,
}

impl InMemoryIntermediateCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached certificates.
    pub fn len(&self) -> usize {
        self.certs.read().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.certs.read().is_empty()
    }
}

impl IntermediateCertificateCache for InMemoryIntermediateCache {
    fn get(&self, url: &str) -> Option<Arc<Certificate>> {
        self.certs.read().get(url).cloned()
    }

    fn put(&self, url: &str, cert: Arc<Certificate>) {
        self.certs.write().insert(url.to_owned(), cert);
    }
}

/// Finds the issuing intermediate of a certificate through its
/// authorityInfoAccess caIssuers URL, caching what it downloads.
pub struct IntermediateResolver {
    cache: Arc<dyn IntermediateCertificateCache>,
    fetcher: Arc<dyn HttpFetch>,
    retry: RetryPolicy,
    allowed_prefix: Option<String>,
}

impl IntermediateResolver {
    pub(crate) fn new(
        cache: Arc<dyn IntermediateCertificateCache>,
        fetcher: Arc<dyn HttpFetch>,
        retry: RetryPolicy,
        allowed_prefix: Option<String>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            retry,
            allowed_prefix,
        }
    }

    /// The intermediate named by `cert`'s caIssuers URL, from the cache or
    /// downloaded.
    ///
    /// Nothing here establishes trust in the result, and a downloaded
    /// certificate is not cached. Callers validate it against the root and
    /// then hand it to [`Self::accept`].
    pub fn resolve(&self, cert: &Certificate) -> Result<ResolvedIntermediate, PkiError> {
        let url = cert
            .ca_issuer()
            .ok_or_else(|| PkiError::MissingIssuerLocation {
                subject: cert.subject().to_string(),
            })?;

        if let Some(cached) = self.cache.get(url) {
            debug!("using cached intermediate for {}", url);
            return Ok(ResolvedIntermediate {
                url: url.to_owned(),
                cert: cached,
                cached: true,
            });
        }

        let unavailable = |reason: String| PkiError::IntermediateUnavailable {
            url: url.to_owned(),
            reason,
        };

        if let Some(prefix) = &self.allowed_prefix {
            if !url.starts_with(prefix.as_str()) {
                return Err(unavailable(format!("URL is outside {}", prefix)));
            }
        }

        info!("downloading intermediate certificate from {}", url);
        let body = match self
            .retry
            .run(|| self.fetcher.fetch(url, None), FetchError::is_transient)
        {
            Ok(FetchResponse::Modified { body, .. }) => body,
            Ok(FetchResponse::NotModified) => {
                return Err(unavailable("unexpected 304 Not Modified".to_owned()))
            }
            Err(e) => return Err(unavailable(e.to_string())),
        };

        let intermediate = decode(&body).map_err(|e| unavailable(e.to_string()))?;
        Ok(ResolvedIntermediate {
            url: url.to_owned(),
            cert: Arc::new(intermediate),
            cached: false,
        })
    }

    /// Cache a downloaded intermediate that passed validation.
    pub fn accept(&self, resolved: &ResolvedIntermediate) {
        if !resolved.cached {
            debug!("caching intermediate from {}", resolved.url);
            self.cache.put(&resolved.url, Arc::clone(&resolved.cert));
        }
    }
}

/// An intermediate found through a caIssuers URL.
#[derive(Clone, Debug)]
pub struct ResolvedIntermediate {
    /// The caIssuers URL it came from.
    pub url: String,
    /// The certificate.
    pub cert: Arc<Certificate>,
    /// Whether it was served from the cache rather than downloaded.
    pub cached: bool,
}

impl fmt::Debug for IntermediateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntermediateResolver")
            .field("retry", &self.retry)
            .field("allowed_prefix", &self.allowed_prefix)
            .finish_non_exhaustive()
    }
}

// caIssuers responses are usually DER, sometimes PEM.
fn decode(body: &[u8]) -> Result<Certificate, crate::Error> {
    match Certificate::from_der(body) {
        Ok(cert) => Ok(cert),
        Err(der_error) => match core::str::from_utf8(body) {
            Ok(text) => Certificate::from_base64(text),
            Err(_) => Err(der_error),
        },
    }
}
