#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, CertifiedIssuer,
    CrlDistributionPoint, CrlIssuingDistributionPoint, CustomExtension, DnType, IsCa, KeyIdMethod,
    KeyPair, KeyUsagePurpose, RevocationReason, RevokedCertParams, SerialNumber,
    SignatureAlgorithm, date_time_ymd,
};
use sosi_pki::{
    AuditEvent, AuditSink, Certificate, CertificationAuthority, Clock, CrlCache, FetchError,
    FetchResponse, Federation, HttpFetch, InMemoryCrlCache, RevocationChecker, RevocationPolicy,
};

pub const ROOT_CRL_URL: &str = "http://crl.oces.test/root.crl";
pub const INTERMEDIATE_CRL_URL: &str = "http://crl.oces.test/issuing.crl";
pub const INTERMEDIATE_AIA_URL: &str = "http://aia.oces.test/issuing.cer";

pub const LEAF_SERIAL: u64 = 0x1001;
pub const REVOKED_LEAF_SERIAL: u64 = 0x2002;
pub const INTERMEDIATE_SERIAL: u64 = 0x0501;

/// The Last-Modified time the fake origin reports.
pub fn origin_last_modified() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
}

/// 2024-01-02, inside every generated validity window and CRL period.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

/// thisUpdate of every generated CRL.
pub fn crl_this_update() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// nextUpdate of every generated CRL.
pub fn crl_next_update() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
}

/// A two level OCES2 style hierarchy: root, issuing intermediate, leaves.
pub struct Pki {
    pub root: CertifiedIssuer<'static, KeyPair>,
    pub intermediate_params: CertificateParams,
    pub intermediate: CertifiedIssuer<'static, KeyPair>,
}

impl Pki {
    pub fn generate() -> Self {
        let mut root_params = ca_params("TRUST2408 Systemtest Root CA", "TRUST2408");
        root_params.serial_number = Some(SerialNumber::from(1u64));
        let root = CertifiedIssuer::self_signed(root_params, key()).unwrap();

        let mut intermediate_params = ca_params("TRUST2408 Systemtest Issuing CA", "TRUST2408");
        intermediate_params.serial_number = Some(SerialNumber::from(INTERMEDIATE_SERIAL));
        intermediate_params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![ROOT_CRL_URL.to_string()],
        }];
        let intermediate =
            CertifiedIssuer::signed_by(intermediate_params.clone(), key(), &root).unwrap();

        Self {
            root,
            intermediate_params,
            intermediate,
        }
    }

    pub fn root_cert(&self) -> Certificate {
        Certificate::from_der(self.root.der()).unwrap()
    }

    pub fn intermediate_cert(&self) -> Certificate {
        Certificate::from_der(self.intermediate.der()).unwrap()
    }

    /// An employee certificate issued by the intermediate, naming it by AIA
    /// and pointing at the intermediate's CRL.
    pub fn leaf(&self, serial: u64) -> Certificate {
        self.leaf_with(serial, |_| {})
    }

    pub fn leaf_with(&self, serial: u64, customize: impl FnOnce(&mut CertificateParams)) -> Certificate {
        let mut params = leaf_params(serial);
        customize(&mut params);
        let cert = params.signed_by(&key(), &self.intermediate).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    /// A leaf with the intermediate's name but signed by an unrelated key.
    pub fn forged_leaf(&self, serial: u64) -> Certificate {
        let impostor = CertifiedIssuer::self_signed(self.intermediate_params.clone(), key()).unwrap();
        let cert = leaf_params(serial).signed_by(&key(), &impostor).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    /// An intermediate with the right name that the root never signed.
    pub fn rogue_intermediate_der(&self) -> Vec<u8> {
        let rogue = CertifiedIssuer::self_signed(self.intermediate_params.clone(), key()).unwrap();
        rogue.der().to_vec()
    }

    pub fn root_crl(&self, revoked: &[u64]) -> Vec<u8> {
        crl_params(revoked, None)
            .signed_by(&self.root)
            .unwrap()
            .der()
            .to_vec()
    }

    pub fn intermediate_crl(&self, revoked: &[u64]) -> Vec<u8> {
        crl_params(revoked, None)
            .signed_by(&self.intermediate)
            .unwrap()
            .der()
            .to_vec()
    }

    /// A CRL naming the intermediate as issuer but signed by another key.
    pub fn intermediate_crl_bad_signature(&self, revoked: &[u64]) -> Vec<u8> {
        let impostor = CertifiedIssuer::self_signed(self.intermediate_params.clone(), key()).unwrap();
        crl_params(revoked, None)
            .signed_by(&impostor)
            .unwrap()
            .der()
            .to_vec()
    }

    /// A CRL that only covers part of the intermediate's certificates.
    pub fn intermediate_crl_partitioned(&self, revoked: &[u64]) -> Vec<u8> {
        let idp = CrlIssuingDistributionPoint {
            distribution_point: CrlDistributionPoint {
                uris: vec![INTERMEDIATE_CRL_URL.to_string()],
            },
            scope: None,
        };
        crl_params(revoked, Some(idp))
            .signed_by(&self.intermediate)
            .unwrap()
            .der()
            .to_vec()
    }

    /// A certificate from an OCES1 style issuer, otherwise well formed.
    pub fn oces1_leaf(&self) -> Certificate {
        let tdc = CertifiedIssuer::self_signed(ca_params("TDC OCES CA", "TDC"), key()).unwrap();
        let cert = leaf_params(0x0c1).signed_by(&key(), &tdc).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    /// A certificate from an issuer belonging to neither generation.
    pub fn foreign_leaf(&self) -> Certificate {
        let other = CertifiedIssuer::self_signed(ca_params("Example CA", "Example Corp"), key()).unwrap();
        let cert = leaf_params(0x0f1).signed_by(&key(), &other).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    /// The test federation, with its caIssuers namespace widened to the
    /// generated hierarchy's AIA host.
    pub fn federation(&self) -> Federation {
        Federation::test(self.root_cert()).with_aia_prefix("http://aia.oces.test/")
    }
}

fn key() -> KeyPair {
    KeyPair::generate_for(RCGEN_SIGNATURE_ALG).unwrap()
}

fn ca_params(common_name: &str, org: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::new()).unwrap();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params.distinguished_name.push(DnType::CountryName, "DK");
    params.distinguished_name.push(DnType::OrganizationName, org);
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2040, 1, 1);
    params
}

fn leaf_params(serial: u64) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::new()).unwrap();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params.distinguished_name.push(DnType::CountryName, "DK");
    params.distinguished_name.push(DnType::OrganizationName, "Region Test // CVR:12345678");
    params.distinguished_name.push(DnType::CommonName, "Test Employee");
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = date_time_ymd(2023, 1, 1);
    params.not_after = date_time_ymd(2026, 1, 1);
    params.crl_distribution_points = vec![CrlDistributionPoint {
        uris: vec![INTERMEDIATE_CRL_URL.to_string()],
    }];
    params.custom_extensions.push(aia_extension(INTERMEDIATE_AIA_URL));
    params
}

/// authorityInfoAccess with a single caIssuers URI.
pub fn aia_extension(uri: &str) -> CustomExtension {
    // id-ad-caIssuers 1.3.6.1.5.5.7.48.2
    let mut access_description = vec![0x06, 0x08, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x02];
    access_description.push(0x86);
    access_description.push(u8::try_from(uri.len()).unwrap());
    access_description.extend_from_slice(uri.as_bytes());

    let mut inner = vec![0x30, u8::try_from(access_description.len()).unwrap()];
    inner.extend(access_description);
    let mut value = vec![0x30, u8::try_from(inner.len()).unwrap()];
    value.extend(inner);

    CustomExtension::from_oid_content(&[1, 3, 6, 1, 5, 5, 7, 1, 1], value)
}

fn crl_params(
    revoked: &[u64],
    issuing_distribution_point: Option<CrlIssuingDistributionPoint>,
) -> CertificateRevocationListParams {
    CertificateRevocationListParams {
        this_update: date_time_ymd(2024, 1, 1),
        next_update: date_time_ymd(2024, 1, 8),
        crl_number: SerialNumber::from(1234u64),
        issuing_distribution_point,
        key_identifier_method: KeyIdMethod::Sha256,
        revoked_certs: revoked
            .iter()
            .map(|serial| RevokedCertParams {
                serial_number: SerialNumber::from(*serial),
                revocation_time: date_time_ymd(2023, 12, 1),
                reason_code: Some(RevocationReason::KeyCompromise),
                invalidity_date: None,
            })
            .collect(),
    }
}

static RCGEN_SIGNATURE_ALG: &SignatureAlgorithm = &rcgen::PKCS_ECDSA_P256_SHA256;

/// What the fake origin does for a URL.
#[derive(Clone)]
pub enum Route {
    /// Always answer 200 with the body.
    Body(Vec<u8>),
    /// Answer 304 to conditional requests, 200 otherwise.
    Conditional(Vec<u8>),
    /// Fail with the given HTTP status.
    Status(u16),
}

/// An in-memory origin server that records every request.
#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, route: Route) {
        self.routes.lock().insert(url.to_string(), route);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(requested, _)| requested == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_if_modified_since(&self, url: &str) -> Option<DateTime<Utc>> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|(requested, _)| requested == url)
            .and_then(|(_, since)| *since)
    }
}

impl HttpFetch for FakeFetcher {
    fn fetch(
        &self,
        url: &str,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<FetchResponse, FetchError> {
        self.requests
            .lock()
            .push((url.to_string(), if_modified_since));
        let route = self.routes.lock().get(url).cloned();
        match route {
            Some(Route::Body(body)) => Ok(FetchResponse::Modified {
                body,
                last_modified: Some(origin_last_modified()),
            }),
            Some(Route::Conditional(_)) if if_modified_since.is_some() => {
                Ok(FetchResponse::NotModified)
            }
            Some(Route::Conditional(body)) => Ok(FetchResponse::Modified {
                body,
                last_modified: Some(origin_last_modified()),
            }),
            Some(Route::Status(status)) => Err(FetchError::Status(status)),
            None => Err(FetchError::Status(404)),
        }
    }
}

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(time: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(time)))
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.0.lock() = time;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Keeps every event it is given.
#[derive(Default)]
pub struct RecordingAuditSink(Mutex<Vec<AuditEvent>>);

impl RecordingAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.0.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.lock().iter().map(AuditEvent::name).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.0.lock().push(event.clone());
    }
}

/// A [`RevocationChecker`] wired to fakes.
pub struct CheckerHarness {
    pub checker: RevocationChecker,
    pub cache: Arc<InMemoryCrlCache>,
    pub fetcher: Arc<FakeFetcher>,
    pub clock: Arc<FixedClock>,
    pub audit: Arc<RecordingAuditSink>,
}

impl CheckerHarness {
    pub fn new(policy: RevocationPolicy) -> Self {
        let cache = Arc::new(InMemoryCrlCache::new());
        let fetcher = FakeFetcher::new();
        let clock = FixedClock::at(now());
        let audit = RecordingAuditSink::new();
        let checker = RevocationChecker::new(
            policy,
            cache.clone(),
            fetcher.clone(),
            clock.clone(),
            audit.clone(),
        );
        Self {
            checker,
            cache,
            fetcher,
            clock,
            audit,
        }
    }

    pub fn cached(&self, url: &str) -> Option<sosi_pki::CrlInfo> {
        self.cache.get(url)
    }
}

/// A [`CertificationAuthority`] for [`Pki`], wired to fakes that serve the
/// intermediate, an empty root CRL and an intermediate CRL revoking
/// [`REVOKED_LEAF_SERIAL`].
pub struct AuthorityHarness {
    pub pki: Pki,
    pub ca: CertificationAuthority,
    pub cache: Arc<InMemoryCrlCache>,
    pub fetcher: Arc<FakeFetcher>,
    pub clock: Arc<FixedClock>,
    pub audit: Arc<RecordingAuditSink>,
}

impl AuthorityHarness {
    pub fn new(policy: RevocationPolicy) -> Self {
        Self::with_federation(policy, |federation| federation)
    }

    pub fn with_federation(
        policy: RevocationPolicy,
        customize: impl FnOnce(Federation) -> Federation,
    ) -> Self {
        let pki = Pki::generate();
        let cache = Arc::new(InMemoryCrlCache::new());
        let fetcher = FakeFetcher::new();
        let clock = FixedClock::at(now());
        let audit = RecordingAuditSink::new();

        fetcher.route(INTERMEDIATE_AIA_URL, Route::Body(pki.intermediate.der().to_vec()));
        fetcher.route(ROOT_CRL_URL, Route::Body(pki.root_crl(&[])));
        fetcher.route(
            INTERMEDIATE_CRL_URL,
            Route::Body(pki.intermediate_crl(&[REVOKED_LEAF_SERIAL])),
        );

        let ca = CertificationAuthority::builder(customize(pki.federation()))
            .with_revocation_policy(policy)
            .with_crl_cache(cache.clone())
            .with_fetcher(fetcher.clone())
            .with_clock(clock.clone())
            .with_audit_sink(audit.clone())
            .build()
            .unwrap();

        Self {
            pki,
            ca,
            cache,
            fetcher,
            clock,
            audit,
        }
    }
}

pub fn strict() -> RevocationPolicy {
    sosi_pki::RevocationPolicyBuilder::new()
        .with_strict(true)
        .build()
        .unwrap()
}

pub fn lenient() -> RevocationPolicy {
    RevocationPolicy::default()
}
