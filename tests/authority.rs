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

use chrono::{Duration, TimeZone, Utc};
use sosi_pki::{
    AuditEvent, Certificate, CertificationAuthority, CrlCache, Federation, PkiError, Severity,
    StatusTimestamp, TEST_AIA_PREFIX,
};

mod common;
use common::*;

#[test]
fn valid_leaf_through_intermediate() {
    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf(LEAF_SERIAL);

    let status = h.ca.certificate_status(&leaf).unwrap();
    assert!(status.is_valid());
    assert_eq!(
        status.timestamp(),
        Some(StatusTimestamp::AsOf(crl_this_update()))
    );
    assert!(h.ca.is_valid(&leaf));

    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 1);
    assert_eq!(h.fetcher.calls(ROOT_CRL_URL), 1);
    assert_eq!(h.fetcher.calls(INTERMEDIATE_CRL_URL), 1);
}

#[test]
fn exactly_one_outcome_event_per_call() {
    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf(LEAF_SERIAL);

    h.ca.certificate_status(&leaf).unwrap();
    assert_eq!(
        h.audit.events(),
        vec![AuditEvent::CertificateValidated {
            subject: leaf.subject().to_string(),
            serial: leaf.serial_hex(),
            valid: true,
            timestamp: Some(StatusTimestamp::AsOf(crl_this_update())),
        }]
    );
    assert_eq!(h.audit.events()[0].severity(), Severity::Info);
}

#[test]
fn expired_and_not_yet_valid_certificates_make_no_requests() {
    let h = AuthorityHarness::new(strict());
    let expired = h.pki.leaf_with(LEAF_SERIAL, |params| {
        params.not_before = rcgen::date_time_ymd(2021, 1, 1);
        params.not_after = rcgen::date_time_ymd(2023, 6, 1);
    });
    let future = h.pki.leaf_with(LEAF_SERIAL, |params| {
        params.not_before = rcgen::date_time_ymd(2025, 1, 1);
    });

    for cert in [&expired, &future] {
        let status = h.ca.certificate_status(cert).unwrap();
        assert!(!status.is_valid());
        assert_eq!(status.timestamp(), None);
    }
    assert_eq!(h.fetcher.total_calls(), 0);
    assert_eq!(
        h.audit.names(),
        vec!["certificate_validated", "certificate_validated"]
    );
    assert!(h
        .audit
        .events()
        .iter()
        .all(|event| event.severity() == Severity::Error));
}

#[test]
fn validity_is_checked_before_generation() {
    let h = AuthorityHarness::new(strict());
    let oces1 = h.pki.oces1_leaf();
    h.clock.set(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

    let status = h.ca.certificate_status(&oces1).unwrap();
    assert!(!status.is_valid());
    assert_eq!(status.timestamp(), None);
}

#[test]
fn oces1_is_always_rejected() {
    for policy in [strict(), lenient()] {
        let h = AuthorityHarness::new(policy);
        let oces1 = h.pki.oces1_leaf();

        let err = h.ca.certificate_status(&oces1).unwrap_err();
        assert!(matches!(err, PkiError::UnsupportedGeneration { .. }));
        assert!(!h.ca.is_valid(&oces1));
        assert_eq!(h.fetcher.total_calls(), 0);
        assert_eq!(
            h.audit.names(),
            vec!["certificate_validation_failed", "certificate_validation_failed"]
        );
    }
}

#[test]
fn unknown_generation_is_rejected() {
    let h = AuthorityHarness::new(lenient());
    let err = h.ca.certificate_status(&h.pki.foreign_leaf()).unwrap_err();
    assert!(matches!(err, PkiError::UnknownGeneration { ref issuer } if issuer.contains("Example Corp")));
}

#[test]
fn revoked_leaf() {
    let h = AuthorityHarness::new(strict());
    let status = h
        .ca
        .certificate_status(&h.pki.leaf(REVOKED_LEAF_SERIAL))
        .unwrap();
    assert!(!status.is_valid());
    assert_eq!(
        status.timestamp(),
        Some(StatusTimestamp::AsOf(crl_this_update()))
    );
    let outcomes: Vec<_> = h
        .audit
        .events()
        .iter()
        .map(|event| (event.name(), event.severity()))
        .collect();
    assert_eq!(outcomes, vec![("certificate_validated", Severity::Error)]);
}

#[test]
fn revoked_intermediate_invalidates_leaf() {
    let h = AuthorityHarness::new(strict());
    h.fetcher.route(
        ROOT_CRL_URL,
        Route::Body(h.pki.root_crl(&[INTERMEDIATE_SERIAL])),
    );

    let err = h
        .ca
        .certificate_status(&h.pki.leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(matches!(err, PkiError::IntermediateRevoked { .. }));
    assert_eq!(h.fetcher.calls(INTERMEDIATE_CRL_URL), 0);
}

#[test]
fn intermediate_not_signed_by_root() {
    let h = AuthorityHarness::new(strict());
    h.fetcher.route(
        INTERMEDIATE_AIA_URL,
        Route::Body(h.pki.rogue_intermediate_der()),
    );

    let err = h
        .ca
        .certificate_status(&h.pki.leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(matches!(err, PkiError::IntermediateNotSignedByRoot { .. }));
}

#[test]
fn rejected_intermediate_is_not_cached() {
    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf(LEAF_SERIAL);
    h.fetcher.route(
        INTERMEDIATE_AIA_URL,
        Route::Body(h.pki.rogue_intermediate_der()),
    );
    let err = h.ca.certificate_status(&leaf).unwrap_err();
    assert!(matches!(err, PkiError::IntermediateNotSignedByRoot { .. }));

    // Once the origin serves the genuine intermediate it is downloaded again.
    h.fetcher.route(
        INTERMEDIATE_AIA_URL,
        Route::Body(h.pki.intermediate_cert().der().to_vec()),
    );
    let status = h.ca.certificate_status(&leaf).unwrap();
    assert!(status.is_valid());
    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 2);

    // Later checks use the cached copy.
    h.ca.certificate_status(&leaf).unwrap();
    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 2);
}

#[test]
fn expired_intermediate() {
    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf_with(LEAF_SERIAL, |params| {
        params.not_after = rcgen::date_time_ymd(2045, 1, 1);
    });
    h.clock.set(Utc.with_ymd_and_hms(2041, 1, 1, 0, 0, 0).unwrap());

    let err = h.ca.certificate_status(&leaf).unwrap_err();
    assert!(matches!(err, PkiError::IntermediateExpired { .. }));
}

#[test]
fn leaf_not_signed_by_intermediate() {
    let h = AuthorityHarness::new(strict());
    let err = h
        .ca
        .certificate_status(&h.pki.forged_leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(matches!(err, PkiError::UntrustedIssuer { .. }));
}

#[test]
fn missing_aia_location() {
    let h = AuthorityHarness::new(strict());
    let leaf = h
        .pki
        .leaf_with(LEAF_SERIAL, |params| params.custom_extensions.clear());
    let err = h.ca.certificate_status(&leaf).unwrap_err();
    assert!(matches!(err, PkiError::MissingIssuerLocation { .. }));
}

#[test]
fn unreachable_intermediate() {
    let h = AuthorityHarness::new(lenient());
    h.fetcher.route(INTERMEDIATE_AIA_URL, Route::Status(404));

    let err = h
        .ca
        .certificate_status(&h.pki.leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(
        matches!(err, PkiError::IntermediateUnavailable { ref url, .. } if url == INTERMEDIATE_AIA_URL)
    );
}

#[test]
fn intermediate_outside_federation_namespace() {
    let h = AuthorityHarness::with_federation(strict(), |federation| {
        federation.with_aia_prefix("http://aia.trust2408.test/")
    });

    let err = h
        .ca
        .certificate_status(&h.pki.leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(matches!(err, PkiError::IntermediateUnavailable { .. }));
    assert_eq!(h.fetcher.total_calls(), 0);
}

#[test]
fn test_profile_only_fetches_from_its_namespace() {
    let h = AuthorityHarness::with_federation(strict(), |federation| {
        Federation::test(federation.root().as_ref().clone())
    });
    assert_eq!(h.ca.validator().federation().aia_prefix(), Some(TEST_AIA_PREFIX));

    let err = h
        .ca
        .certificate_status(&h.pki.leaf(LEAF_SERIAL))
        .unwrap_err();
    assert!(matches!(err, PkiError::IntermediateUnavailable { ref url, .. } if url == INTERMEDIATE_AIA_URL));
    assert_eq!(h.fetcher.total_calls(), 0);
}

#[test]
fn intermediate_is_fetched_once() {
    let h = AuthorityHarness::new(strict());
    for serial in [LEAF_SERIAL, REVOKED_LEAF_SERIAL, 0x3003] {
        h.ca.certificate_status(&h.pki.leaf(serial)).unwrap();
    }
    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 1);
}

#[test]
fn root_and_root_issued_certificates() {
    let h = AuthorityHarness::new(strict());

    let root = h.ca.certificate_status(&h.pki.root_cert()).unwrap();
    assert!(root.is_valid());
    assert_eq!(root.timestamp(), None);
    assert_eq!(h.fetcher.total_calls(), 0);

    let intermediate = h
        .ca
        .certificate_status(&h.pki.intermediate_cert())
        .unwrap();
    assert!(intermediate.is_valid());
    assert!(intermediate.has_revocation_evidence());
    assert_eq!(h.fetcher.calls(ROOT_CRL_URL), 1);
    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 0);
}

#[test]
fn lenient_policy_warns_before_the_outcome() {
    let h = AuthorityHarness::new(lenient());
    h.fetcher.route(INTERMEDIATE_CRL_URL, Route::Status(404));
    let leaf = h.pki.leaf(LEAF_SERIAL);

    let status = h.ca.certificate_status(&leaf).unwrap();
    assert!(status.is_valid());
    assert_eq!(status.timestamp(), Some(StatusTimestamp::Unknown));
    assert_eq!(
        h.audit.names(),
        vec![
            "crl_download_failed",
            "revocation_check_skipped",
            "certificate_validated"
        ]
    );
}

#[test]
fn strict_policy_rejects_missing_evidence() {
    let h = AuthorityHarness::new(strict());
    h.fetcher.route(INTERMEDIATE_CRL_URL, Route::Status(404));
    let leaf = h.pki.leaf(LEAF_SERIAL);

    assert!(matches!(
        h.ca.certificate_status(&leaf),
        Err(PkiError::MissingRevocationEvidence { .. })
    ));
    assert!(!h.ca.is_valid(&leaf));
}

#[test]
fn base64_input() {
    use base64::Engine;

    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf(LEAF_SERIAL);
    let encoded = base64::engine::general_purpose::STANDARD.encode(leaf.der());
    assert!(h.ca.certificate_status_base64(&encoded).unwrap().is_valid());
    assert!(matches!(
        h.ca.certificate_status_base64("%%%"),
        Err(PkiError::Malformed(sosi_pki::Error::BadBase64))
    ));
}

#[test]
fn refresh_happens_after_interval() {
    let h = AuthorityHarness::new(strict());
    let leaf = h.pki.leaf(LEAF_SERIAL);
    h.ca.certificate_status(&leaf).unwrap();
    h.clock.advance(Duration::hours(2));
    h.ca.certificate_status(&leaf).unwrap();
    assert_eq!(h.fetcher.calls(INTERMEDIATE_CRL_URL), 2);
    assert_eq!(h.fetcher.calls(INTERMEDIATE_AIA_URL), 1);
}

#[test]
fn non_ca_root_is_a_configuration_error() {
    let pki = Pki::generate();
    let leaf = pki.leaf(LEAF_SERIAL);
    let result = CertificationAuthority::builder(Federation::test(leaf))
        .with_fetcher(FakeFetcher::new())
        .build();
    assert!(matches!(result, Err(PkiError::Config(_))));
}

#[test]
fn shared_between_threads() {
    let h = AuthorityHarness::new(strict());
    let ca = Arc::new(h.ca);
    let leaves: Vec<Certificate> = (0..4).map(|i| h.pki.leaf(0x4000 + i)).collect();

    std::thread::scope(|scope| {
        for leaf in &leaves {
            let ca = Arc::clone(&ca);
            scope.spawn(move || assert!(ca.is_valid(leaf)));
        }
    });
    assert_eq!(h.cache.entries().len(), 2);
}
