//! Property-based tests for paysign-lib
//!
//! RSA operations are slow enough that the signing properties run with a
//! reduced case count.

mod common;

#[cfg(test)]
mod base_string_properties {
    use paysign_lib::engine::SignatureBaseString;
    use paysign_lib::signer::canonical_path;
    use paysign_lib::HttpMethod;
    use proptest::prelude::*;

    proptest! {
        /// A request base string is the five fields, each newline-terminated.
        #[test]
        fn request_fields_are_newline_terminated(
            path in "/[a-z0-9/_-]{0,40}",
            timestamp in 0i64..4_000_000_000i64,
            nonce in "[A-Za-z0-9]{1,32}",
            body in "[ -~]{0,200}",
        ) {
            let base = SignatureBaseString::request(HttpMethod::Post, &path, timestamp, &nonce, &body);
            let expected = format!("POST\n{path}\n{timestamp}\n{nonce}\n{body}\n");
            prop_assert_eq!(base.as_bytes(), expected.as_bytes());
        }

        /// A response base string is timestamp, nonce and body.
        #[test]
        fn response_fields_are_newline_terminated(
            timestamp in 0i64..4_000_000_000i64,
            nonce in "[A-Za-z0-9]{1,32}",
            body in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let base = SignatureBaseString::response(timestamp, &nonce, &body);
            let mut expected = format!("{timestamp}\n{nonce}\n").into_bytes();
            expected.extend_from_slice(&body);
            expected.push(b'\n');
            prop_assert_eq!(base.as_bytes(), &expected[..]);
        }

        /// The query string is signed exactly as written.
        #[test]
        fn query_is_kept_verbatim(
            path in "/v3/[a-z]{1,12}",
            query in "[A-Za-z0-9=&%._-]{0,40}",
        ) {
            let url = format!("https://api.mch.weixin.qq.com{path}?{query}");
            let expected = format!("{path}?{query}");
            prop_assert_eq!(canonical_path(&url).unwrap(), expected.as_str());
        }

        /// Whitespace anywhere in the path is rejected.
        #[test]
        fn whitespace_in_path_rejected(
            prefix in "/[a-z]{0,10}",
            ws in prop::sample::select(vec![' ', '\t', '\n', '\r']),
            suffix in "[a-z]{0,10}",
        ) {
            let url = format!("{prefix}{ws}{suffix}");
            prop_assert!(canonical_path(&url).is_err());
        }
    }
}

#[cfg(test)]
mod signature_properties {
    use super::common::*;
    use paysign_lib::{
        HttpMethod, PlatformCertificateStore, RequestSigner, ResponseVerifier, VerificationError,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    fn verifier() -> ResponseVerifier {
        ResponseVerifier::new(Arc::new(
            PlatformCertificateStore::with_certificates(vec![platform_certificate()]).unwrap(),
        ))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any body signed by the platform key verifies; flipping any bit breaks it.
        #[test]
        fn response_round_trip_and_bit_flip(
            body in proptest::collection::vec(any::<u8>(), 1..256),
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let ts = now();
            let info = sign_as_platform(&platform_key(), PLATFORM_SERIAL, ts, "prop", &body);
            let verifier = verifier();
            prop_assert_eq!(verifier.verify_response_at(&info, &body, ts), Ok(()));

            let mut tampered = body.clone();
            let i = flip.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert_eq!(
                verifier.verify_response_at(&info, &tampered, ts),
                Err(VerificationError::InvalidSignature)
            );
        }

        /// Timestamps beyond the tolerance are stale, whatever the signature.
        #[test]
        fn outside_window_is_always_stale(offset in 301i64..100_000i64, past in any::<bool>()) {
            let now = 1_760_000_000i64;
            let ts = if past { now - offset } else { now + offset };
            let info = sign_as_platform(&platform_key(), PLATFORM_SERIAL, ts, "prop", b"{}");
            let is_stale = matches!(
                verifier().verify_response_at(&info, b"{}", now),
                Err(VerificationError::StaleSignature { .. })
            );
            prop_assert!(is_stale);
        }

        /// Two authorizations never share a nonce.
        #[test]
        fn nonces_are_fresh(body in "[ -~]{0,64}") {
            let signer = RequestSigner::new(merchant_credentials());
            let a = signer.authorize(HttpMethod::Post, "/v3/refund/domestic/refunds", body.as_bytes()).unwrap();
            let b = signer.authorize(HttpMethod::Post, "/v3/refund/domestic/refunds", body.as_bytes()).unwrap();
            prop_assert_ne!(a.nonce, b.nonce);
        }
    }
}
