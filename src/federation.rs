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

use std::sync::Arc;

use serde::Deserialize;

use crate::cert::Certificate;
use crate::name::DistinguishedName;

/// Which federation a configuration targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// The production federation.
    #[default]
    Production,
    /// The test federation.
    Test,
}

impl Environment {
    /// Display name of the environment's certification authority.
    pub fn ca_name(self) -> &'static str {
        match self {
            Self::Production => "TRUST2408 OCES Primary CA",
            Self::Test => "TRUST2408 Systemtest Primary CA",
        }
    }

    /// caIssuers namespace intermediates are downloaded from.
    pub fn aia_prefix(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_AIA_PREFIX,
            Self::Test => TEST_AIA_PREFIX,
        }
    }
}

/// The OCES certificate generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    /// The legacy hierarchy. Never accepted.
    Oces1,
    /// The current hierarchy.
    Oces2,
}

/// Issuer organization names that identify each generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationMarkers {
    oces1: Vec<String>,
    oces2: Vec<String>,
}

impl GenerationMarkers {
    /// Markers matched against the organization (O) values of an issuer.
    pub fn new(oces1: Vec<String>, oces2: Vec<String>) -> Self {
        Self { oces1, oces2 }
    }

    /// Classify an issuer. OCES1 markers are checked first.
    pub fn classify(&self, issuer: &DistinguishedName) -> Option<Generation> {
        let matches = |markers: &[String]| {
            issuer
                .organizations()
                .any(|org| markers.iter().any(|marker| org.contains(marker.as_str())))
        };
        if matches(&self.oces1) {
            Some(Generation::Oces1)
        } else if matches(&self.oces2) {
            Some(Generation::Oces2)
        } else {
            None
        }
    }
}

impl Default for GenerationMarkers {
    fn default() -> Self {
        Self::new(vec!["TDC".to_owned()], vec!["TRUST2408".to_owned()])
    }
}

/// caIssuers namespace of the production OCES2 issuing CAs.
pub const PRODUCTION_AIA_PREFIX: &str = "http://m.aia.ica02.trust2408.com/";

/// caIssuers namespace of the system test OCES2 issuing CAs.
pub const TEST_AIA_PREFIX: &str = "http://m.aia.systemtest";

/// Everything that distinguishes one federation's certification authority
/// from another.
#[derive(Clone, Debug)]
pub struct Federation {
    ca_name: String,
    root: Arc<Certificate>,
    markers: GenerationMarkers,
    aia_prefix: Option<String>,
}

impl Federation {
    /// A federation named `ca_name` anchored at `root`.
    pub fn new(ca_name: impl Into<String>, root: Certificate) -> Self {
        Self {
            ca_name: ca_name.into(),
            root: Arc::new(root),
            markers: GenerationMarkers::default(),
            aia_prefix: None,
        }
    }

    /// The production federation anchored at `root`. Intermediates are only
    /// downloaded from [`PRODUCTION_AIA_PREFIX`].
    pub fn production(root: Certificate) -> Self {
        Self::for_environment(Environment::Production, root)
    }

    /// The test federation anchored at `root`. Intermediates are only
    /// downloaded from [`TEST_AIA_PREFIX`].
    pub fn test(root: Certificate) -> Self {
        Self::for_environment(Environment::Test, root)
    }

    /// The federation for `environment`, with its display name and
    /// caIssuers namespace.
    pub fn for_environment(environment: Environment, root: Certificate) -> Self {
        Self::new(environment.ca_name(), root).with_aia_prefix(environment.aia_prefix())
    }

    /// Customize the generation markers.
    pub fn with_markers(mut self, markers: GenerationMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Only download intermediates from caIssuers URLs starting with `prefix`.
    pub fn with_aia_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.aia_prefix = Some(prefix.into());
        self
    }

    /// Download intermediates from any caIssuers URL.
    pub fn without_aia_prefix(mut self) -> Self {
        self.aia_prefix = None;
        self
    }

    /// Display name of the certification authority.
    pub fn ca_name(&self) -> &str {
        &self.ca_name
    }

    /// The root certificate.
    pub fn root(&self) -> &Arc<Certificate> {
        &self.root
    }

    /// The generation markers.
    pub fn markers(&self) -> &GenerationMarkers {
        &self.markers
    }

    /// The intermediate namespace, if restricted.
    pub fn aia_prefix(&self) -> Option<&str> {
        self.aia_prefix.as_deref()
    }
}
