use super::*;
use uuid::Uuid;

fn user(project_id: Option<i64>) -> SessionUser {
    SessionUser {
        id: Uuid::new_v4(),
        name: "pat".into(),
        email: "pat@example.com".into(),
        avatar_url: None,
        project_id,
    }
}

#[test]
fn validate_name_trims() {
    assert_eq!(validate_name("  Singularity  ").unwrap(), "Singularity");
}

#[test]
fn validate_name_rejects_blank_and_long() {
    assert!(matches!(validate_name("   "), Err(ProjectError::Validation(_))));
    assert!(validate_name(&"x".repeat(100)).is_ok());
    assert!(matches!(validate_name(&"x".repeat(101)), Err(ProjectError::Validation(_))));
}

#[test]
fn validate_url_accepts_http_and_https() {
    assert_eq!(validate_url(Some("https://example.com/board")).unwrap(), Some("https://example.com/board".into()));
    assert_eq!(validate_url(Some("http://localhost:3000")).unwrap(), Some("http://localhost:3000".into()));
}

#[test]
fn validate_url_blank_clears() {
    assert_eq!(validate_url(None).unwrap(), None);
    assert_eq!(validate_url(Some("  ")).unwrap(), None);
}

#[test]
fn validate_url_rejects_malformed() {
    assert!(validate_url(Some("ftp://example.com")).is_err());
    assert!(validate_url(Some("example.com")).is_err());
    assert!(validate_url(Some("https://")).is_err());
    assert!(validate_url(Some("https:///path")).is_err());
}

#[test]
fn project_for_user_requires_assignment() {
    assert_eq!(project_for_user(&user(Some(4))).unwrap(), 4);
    assert!(matches!(project_for_user(&user(None)), Err(ProjectError::NoProject)));
}

#[test]
fn patch_distinguishes_cleared_url() {
    let patch: ProjectPatch = serde_json::from_str(r#"{"url":null,"category":"marketing"}"#).unwrap();
    assert_eq!(patch.url, Some(None));
    assert_eq!(patch.description, None);
    assert_eq!(patch.category, Some(ProjectCategory::Marketing));
}

#[test]
fn error_codes() {
    assert_eq!(ProjectError::NotFound(1).error_code(), "E_PROJECT_NOT_FOUND");
    assert_eq!(ProjectError::NoProject.error_code(), "E_NO_PROJECT");
    assert_eq!(ProjectError::Validation("x".into()).error_code(), "E_VALIDATION");
}
