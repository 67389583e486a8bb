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

//! Conditional HTTP retrieval of CRLs and intermediate certificates.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;

/// Responses larger than this are refused.
pub const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The result of a successful GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchResponse {
    /// A `200 OK` body and its Last-Modified header, if the origin sent one.
    Modified {
        /// The response body.
        body: Vec<u8>,
        /// Parsed Last-Modified header.
        last_modified: Option<DateTime<Utc>>,
    },
    /// `304 Not Modified`.
    NotModified,
}

/// Why a fetch failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The URL could not be parsed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Only `http` and `https` are fetched.
    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    /// Connecting or reading did not finish within the configured timeouts.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The request could not be completed.
    #[error("request failed: {0}")]
    Transport(String),

    /// The origin answered with a status other than 200 or 304.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body exceeds [`MAX_RESPONSE_SIZE`].
    #[error("response body exceeds {0} bytes")]
    TooLarge(u64),

    /// The body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Whether repeating the request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::Body(_) => true,
            Self::Status(status) => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidUrl { .. } | Self::UnsupportedScheme(_) | Self::TooLarge(_) => false,
        }
    }
}

/// Performs HTTP GETs, optionally conditional on a Last-Modified time.
pub trait HttpFetch: Send + Sync {
    /// GET `url`, sending If-Modified-Since when `if_modified_since` is set.
    fn fetch(
        &self,
        url: &str,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<FetchResponse, FetchError>;
}

/// Connect and read timeouts for [`ReqwestFetcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// Time allowed to establish a connection.
    pub connect: Duration,
    /// Time allowed for the request and the response body.
    pub read: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(3000),
            read: Duration::from_millis(3000),
        }
    }
}

/// The default [`HttpFetch`], backed by a blocking `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: Client,
    max_response_size: u64,
}

impl ReqwestFetcher {
    /// Build a client with the given timeouts.
    pub fn new(timeouts: FetchTimeouts) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.read)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Customize the largest accepted body.
    pub fn with_max_response_size(mut self, max_response_size: u64) -> Self {
        self.max_response_size = max_response_size;
        self
    }
}

impl HttpFetch for ReqwestFetcher {
    fn fetch(
        &self,
        url: &str,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<FetchResponse, FetchError> {
        let url = parse_http_url(url)?;

        let mut request = self.client.get(url.clone());
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, format_http_date(since));
        }

        let response = request.send().map_err(|e| classify(url.as_str(), e))?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified);
        }
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        if matches!(response.content_length(), Some(len) if len > self.max_response_size) {
            return Err(FetchError::TooLarge(self.max_response_size));
        }
        let last_modified = last_modified(response.headers());

        let mut body = Vec::new();
        let read = response
            .take(self.max_response_size + 1)
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Body(e.to_string()))?;
        if u64::try_from(read).map_or(true, |read| read > self.max_response_size) {
            return Err(FetchError::TooLarge(self.max_response_size));
        }

        Ok(FetchResponse::Modified {
            body,
            last_modified,
        })
    }
}

pub(crate) fn parse_http_url(url: &str) -> Result<url::Url, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::UnsupportedScheme(other.to_owned())),
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_owned())
    } else {
        FetchError::Transport(error.to_string())
    }
}

fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let value = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    parse_http_date(value)
}

pub(crate) fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

pub(crate) fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}
