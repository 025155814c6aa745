use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// token generation
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn session_user_serializes_project() {
    let user = SessionUser {
        id: Uuid::nil(),
        name: "Ada".into(),
        email: "ada@example.com".into(),
        avatar_url: None,
        project_id: Some(1),
    };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["project_id"], serde_json::json!(1));
    assert_eq!(json["email"], serde_json::json!("ada@example.com"));
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn session_round_trip_against_live_db() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
    let pool = crate::db::init_pool(&url, 2).await.expect("pool");
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, password_hash) VALUES ($1, 'live', $2, 'x$y')")
        .bind(user_id)
        .bind(format!("{user_id}@example.com"))
        .execute(&pool)
        .await
        .expect("insert user");

    let token = create_session(&pool, user_id, 1).await.expect("create");
    let user = validate_session(&pool, &token).await.expect("validate").expect("user");
    assert_eq!(user.id, user_id);

    delete_session(&pool, &token).await.expect("delete");
    assert!(validate_session(&pool, &token).await.expect("validate").is_none());

    let ticket = create_ws_ticket(&pool, user_id).await.expect("ticket");
    assert!(consume_ws_ticket(&pool, &ticket).await.expect("consume").is_some());
    assert!(consume_ws_ticket(&pool, &ticket).await.expect("consume").is_none());
}
