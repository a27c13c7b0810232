//! Property tests for bearer authentication.

mod support;

use cam_api::{authenticate, generate_jwt_token, ErrorCode};
use cam_test_utils::generators::arb_caller;
use proptest::prelude::*;
use support::auth_config;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A token minted for a caller authenticates back to the same caller.
    #[test]
    fn prop_token_round_trips_caller(caller in arb_caller()) {
        let config = auth_config();
        let token = generate_jwt_token(
            &config,
            caller.user_id,
            Some(caller.tenant_id),
            caller.roles.iter().cloned().collect(),
        ).unwrap();

        let header = format!("Bearer {}", token);
        let authenticated = authenticate(&config, Some(&header)).unwrap();
        prop_assert_eq!(authenticated, caller);
    }

    /// Anything that is not a signed token is rejected as 401.
    #[test]
    fn prop_garbage_token_is_rejected(garbage in "[A-Za-z0-9._-]{0,64}") {
        let header = format!("Bearer {}", garbage);
        let err = authenticate(&auth_config(), Some(&header)).unwrap_err();
        prop_assert!(matches!(err.code, ErrorCode::InvalidToken | ErrorCode::TokenExpired));
        prop_assert_eq!(err.status_code().as_u16(), 401);
    }

    /// Tokens without a tenant claim never authenticate.
    #[test]
    fn prop_token_without_tenant_is_rejected(caller in arb_caller()) {
        let config = auth_config();
        let token = generate_jwt_token(&config, caller.user_id, None, vec![]).unwrap();
        let header = format!("Bearer {}", token);
        let err = authenticate(&config, Some(&header)).unwrap_err();
        prop_assert_eq!(err.code, ErrorCode::InvalidToken);
    }
}
