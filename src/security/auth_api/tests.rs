#[cfg(test)]
mod tests {
    use super::super::types::*;
    use super::super::*;
    use crate::core::shared::enums::UserRole;
    use crate::security::jwt::JwtManager;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    const SECRET: &str = "auth-api-test-secret-key-at-least-32-chars";

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser::new(uuid::Uuid::new_v4(), "someone@univ.ac.id", "Someone", role)
    }

    #[test]
    fn test_role_permissions() {
        assert!(role_permissions(UserRole::Student).contains(&Permission::SubmitTickets));
        assert!(!role_permissions(UserRole::Lecturer).contains(&Permission::ViewTicketQueue));

        assert!(role_permissions(UserRole::Staff).contains(&Permission::HandleTickets));
        assert!(role_permissions(UserRole::Staff).contains(&Permission::PostInternalNotes));
        assert!(!role_permissions(UserRole::Staff).contains(&Permission::ManageUsers));

        let admin = role_permissions(UserRole::Admin);
        assert!(admin.is_superset(&role_permissions(UserRole::Staff)));
        assert!(admin.contains(&Permission::ViewReports));
        assert!(admin.contains(&Permission::ManageCategories));
    }

    #[test]
    fn test_anonymous_user() {
        let anon = AuthenticatedUser::anonymous();
        assert!(!anon.is_authenticated());
        assert!(!anon.has_permission(Permission::SubmitTickets));
        assert!(!anon.is_admin());
        assert!(matches!(
            anon.require(Permission::SubmitTickets),
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_user_roles() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(user(UserRole::Admin).is_handler());
        assert!(user(UserRole::Staff).is_handler());
        assert!(!user(UserRole::Staff).is_admin());
        assert!(user(UserRole::Lecturer).is_requester());
        assert!(user(UserRole::Staff).require(Permission::ClaimTickets).is_ok());
        assert!(user(UserRole::Staff).require(Permission::AssignTickets).is_err());
    }

    #[test]
    fn test_auth_config_paths() {
        let config = AuthConfig::default();

        assert!(config.is_anonymous_allowed("/health"));
        assert!(config.is_anonymous_allowed("/api/health"));
        assert!(config.is_anonymous_allowed("/api/auth/login"));
        assert!(!config.is_anonymous_allowed("/api/auth/me"));
        assert!(!config.is_anonymous_allowed("/api/users"));

        assert!(config.is_public_path("/"));
        assert!(!config.is_public_path("/api/tickets"));
    }

    #[test]
    fn test_auth_error_responses() {
        assert_eq!(AuthError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::InvalidToken.error_code(), "invalid_token");
        assert_eq!(AuthError::ExpiredToken.to_string(), "expired_token");
        assert_eq!(
            AuthError::InternalError("pool closed".into()).to_string(),
            "internal_error: pool closed"
        );
    }

    #[test]
    fn test_bearer_extraction() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_bearer_token(request.headers(), "Bearer "),
            Some("abc.def.ghi")
        );

        for value in ["bearer abc.def.ghi", "BEARER abc.def.ghi", "Bearer   abc.def.ghi "] {
            let request = Request::builder()
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(
                extract_bearer_token(request.headers(), "Bearer "),
                Some("abc.def.ghi"),
                "{value}"
            );
        }

        for value in ["Bearer ", "Bear", "Bearerabc.def.ghi"] {
            let request = Request::builder()
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap();
            assert_eq!(extract_bearer_token(request.headers(), "Bearer "), None, "{value}");
        }

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(request.headers(), "Bearer "), None);
    }

    #[test]
    fn test_extract_user_from_valid_token() {
        let jwt = JwtManager::new(SECRET, "helpdesk", 30);
        let id = uuid::Uuid::new_v4();
        let issued = jwt
            .issue(id, "siti@univ.ac.id", "Siti Aminah", UserRole::Lecturer)
            .unwrap();

        let request = Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {}", issued.token))
            .body(Body::empty())
            .unwrap();
        let user = extract_user_from_request(&request, &AuthConfig::default(), &jwt).unwrap();

        assert_eq!(user.user_id, id);
        assert_eq!(user.role, UserRole::Lecturer);
        assert_eq!(user.full_name, "Siti Aminah");
    }

    #[test]
    fn test_extract_user_failures() {
        let jwt = JwtManager::new(SECRET, "helpdesk", 30);
        let config = AuthConfig::default();

        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(matches!(
            extract_user_from_request(&request, &config, &jwt),
            Err(AuthError::MissingToken)
        ));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            extract_user_from_request(&request, &config, &jwt),
            Err(AuthError::InvalidToken)
        ));
    }
}
