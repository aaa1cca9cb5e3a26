//! Wire types, client stub and server skeleton for `oauthservice.OAuthService`.
//!
//! `oauthservice.rs` is regenerated from `proto/oauth_service.proto` by
//! `build.rs` when `protoc` is available; otherwise the checked-in copy is
//! used as is.

#![allow(missing_docs)]

include!("oauthservice.rs");

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_auth_response_without_tokens_decodes_as_absent() {
        let bytes = AuthResponse {
            message: "Waiting for response...".to_string(),
            access_token: None,
            refresh_token: None,
        }
        .encode_to_vec();

        let decoded = AuthResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.message, "Waiting for response...");
        assert!(decoded.access_token.is_none());
        assert!(decoded.refresh_token.is_none());
    }

    #[test]
    fn test_stubs_match_schema() {
        let schema = include_str!("../../proto/oauth_service.proto");

        assert!(schema.contains("package oauthservice;"));
        assert!(schema.contains("service OAuthService {"));
        assert_eq!(o_auth_service_server::SERVICE_NAME, "oauthservice.OAuthService");
        for field in [
            "string message = 1;",
            "optional string access_token = 2;",
            "optional string refresh_token = 3;",
            "bool active = 1;",
            "string info = 1;",
        ] {
            assert!(schema.contains(field), "schema lost `{field}`");
        }
    }

    #[test]
    fn test_plain_string_field_decodes_into_optional() {
        // A server built from a schema without `optional` still writes tag 2
        // as a length-delimited string.
        let mut bytes = Vec::new();
        prost::encoding::string::encode(1, &"Success".to_string(), &mut bytes);
        prost::encoding::string::encode(2, &"A1".to_string(), &mut bytes);

        let decoded = AuthResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.access_token.as_deref(), Some("A1"));
        assert!(decoded.refresh_token.is_none());
    }
}
