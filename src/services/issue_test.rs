use super::*;
use crate::services::issue::test_helpers::issue;
use crate::state::test_helpers as state_helpers;

// =============================================================================
// validation
// =============================================================================

#[test]
fn validate_title_trims_and_requires_text() {
    assert_eq!(validate_title("  Fix login  ").unwrap(), "Fix login");
    assert!(matches!(validate_title(""), Err(IssueError::Validation(_))));
    assert!(matches!(validate_title("   "), Err(IssueError::Validation(_))));
}

#[test]
fn validate_title_length_limit_counts_chars() {
    assert!(validate_title(&"é".repeat(200)).is_ok());
    assert!(matches!(validate_title(&"a".repeat(201)), Err(IssueError::Validation(_))));
}

#[test]
fn validate_hours_rejects_negative() {
    assert!(validate_hours("estimate", None).is_ok());
    assert!(validate_hours("estimate", Some(0)).is_ok());
    assert!(matches!(validate_hours("estimate", Some(-1)), Err(IssueError::Validation(_))));
}

// =============================================================================
// description text
// =============================================================================

#[test]
fn strip_html_removes_tags_and_collapses_space() {
    assert_eq!(strip_html("<p>Hello <strong>world</strong></p>"), "Hello world");
    assert_eq!(strip_html("<p>one</p><p>two</p>"), "one two");
}

#[test]
fn strip_html_decodes_common_entities() {
    assert_eq!(strip_html("a&nbsp;&lt;b&gt;&amp;c"), "a <b>&c");
}

#[test]
fn strip_html_plain_text_is_unchanged() {
    assert_eq!(strip_html("just text"), "just text");
    assert_eq!(description_text(None), None);
}

// =============================================================================
// people
// =============================================================================

#[test]
fn effective_assignee_prefers_explicit() {
    let explicit = Uuid::new_v4();
    let other = Uuid::new_v4();
    assert_eq!(effective_assignee(Some(explicit), &[other]), Some(explicit));
}

#[test]
fn effective_assignee_falls_back_to_first_user() {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    assert_eq!(effective_assignee(None, &[first, second]), Some(first));
    assert_eq!(effective_assignee(None, &[]), None);
}

#[test]
fn unique_users_keeps_first_occurrence_order() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(unique_users(&[a, b, a, b]), vec![a, b]);
}

// =============================================================================
// search
// =============================================================================

#[test]
fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("login"), "%login%");
    assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
}

#[test]
fn sort_for_board_orders_by_position_then_id() {
    let mut a = issue(3);
    a.list_position = 2.0;
    let mut b = issue(1);
    b.list_position = 2.0;
    let mut c = issue(2);
    c.list_position = -1.0;
    let mut rows = vec![a, b, c];
    sort_for_board(&mut rows, false);
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 1, 3]);
}

#[test]
fn sort_for_board_recent_orders_by_updated_desc() {
    let mut old = issue(1);
    old.updated_at = 10;
    let mut new = issue(2);
    new.updated_at = 20;
    let mut rows = vec![old, new];
    sort_for_board(&mut rows, true);
    assert_eq!(rows[0].id, 2);
}

// =============================================================================
// moves
// =============================================================================

#[test]
fn apply_plan_in_memory_updates_dragged_and_renormalized() {
    let mut issues = vec![
        PositionedIssue { id: 1, status: IssueStatus::Backlog, list_position: 1.0 },
        PositionedIssue { id: 2, status: IssueStatus::Done, list_position: 1.0 },
        PositionedIssue { id: 3, status: IssueStatus::Done, list_position: 1.0 },
    ];
    let drag = DragMove {
        issue_id: 1,
        source: DropLocation { status: IssueStatus::Backlog, index: 0 },
        destination: DropLocation { status: IssueStatus::Done, index: 1 },
    };
    let plan = position::plan_move(&issues, &drag).unwrap();
    apply_plan_in_memory(&mut issues, &drag, plan.list_position, &plan.renormalized);

    let column = position::sorted_column(&issues, IssueStatus::Done);
    let ids: Vec<i64> = column.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![2, 1, 3]);
    assert!(position::min_gap(&column).is_some_and(|gap| gap > 0.0));
}

#[test]
fn move_data_describes_outcome() {
    let outcome = MoveOutcome {
        issue_id: 7,
        status: IssueStatus::InProgress,
        list_position: 1.5,
        renormalized: vec![(8, 1.0)],
    };
    let data = move_data(&outcome, 1);
    assert_eq!(data.get("issue_id"), Some(&serde_json::json!(7)));
    assert_eq!(data.get("status"), Some(&serde_json::json!("inprogress")));
    assert_eq!(data.get("list_position"), Some(&serde_json::json!(1.5)));
    assert_eq!(data.get("index"), Some(&serde_json::json!(1)));
    assert_eq!(data.get("renormalized"), Some(&serde_json::json!([{ "id": 8, "list_position": 1.0 }])));
}

#[test]
fn move_event_reports_clamped_index() {
    let issues = vec![
        PositionedIssue { id: 1, status: IssueStatus::Backlog, list_position: 1.0 },
        PositionedIssue { id: 2, status: IssueStatus::Done, list_position: 1.0 },
        PositionedIssue { id: 3, status: IssueStatus::Done, list_position: 2.0 },
    ];
    let drag = DragMove {
        issue_id: 1,
        source: DropLocation { status: IssueStatus::Backlog, index: 0 },
        destination: DropLocation { status: IssueStatus::Done, index: 42 },
    };
    let plan = position::plan_move(&issues, &drag).unwrap();

    let (outcome, data) = settle_move(&drag, plan);
    assert_eq!(outcome.status, IssueStatus::Done);
    assert!((outcome.list_position - 3.0).abs() < f64::EPSILON);
    assert_eq!(data.get("index"), Some(&serde_json::json!(2)));
}

#[test]
fn column_is_thin_compares_tightest_gap() {
    let issues = vec![
        PositionedIssue { id: 1, status: IssueStatus::Selected, list_position: 1.0 },
        PositionedIssue { id: 2, status: IssueStatus::Selected, list_position: 1.000_000_01 },
        PositionedIssue { id: 3, status: IssueStatus::Done, list_position: 1.0 },
    ];
    assert!(column_is_thin(&issues, IssueStatus::Selected, 1e-6));
    assert!(!column_is_thin(&issues, IssueStatus::Selected, 1e-9));
    assert!(!column_is_thin(&issues, IssueStatus::Done, 1e-6));
    assert!(!column_is_thin(&issues, IssueStatus::Backlog, 1e-6));
}

#[test]
fn status_change_event_carries_renormalized_positions() {
    let mut issues = vec![
        PositionedIssue { id: 1, status: IssueStatus::Backlog, list_position: 1.0 },
        PositionedIssue { id: 2, status: IssueStatus::Done, list_position: f64::MIN },
        PositionedIssue { id: 3, status: IssueStatus::Done, list_position: 2.0 },
    ];
    let drag = DragMove {
        issue_id: 1,
        source: DropLocation { status: IssueStatus::Backlog, index: 0 },
        destination: DropLocation { status: IssueStatus::Done, index: 0 },
    };
    let plan = position::plan_move(&issues, &drag).unwrap();
    assert!(!plan.renormalized.is_empty());
    apply_plan_in_memory(&mut issues, &drag, plan.list_position, &plan.renormalized);

    let data = update_data(&issue(1), &plan.renormalized);
    assert_eq!(data.get("issue_id"), Some(&serde_json::json!(1)));
    assert_eq!(
        data.get("renormalized"),
        Some(&serde_json::json!([{ "id": 2, "list_position": 2.0 }, { "id": 3, "list_position": 3.0 }]))
    );
    let ids: Vec<i64> = position::sorted_column(&issues, IssueStatus::Done).iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn plain_update_event_has_empty_renormalized() {
    let data = update_data(&issue(4), &[]);
    assert_eq!(data.get("renormalized"), Some(&serde_json::json!([])));
    assert!(data.contains_key("issue"));
}

// =============================================================================
// serde
// =============================================================================

#[test]
fn issue_row_serializes_type_field() {
    let json = serde_json::to_value(issue(1)).unwrap();
    assert_eq!(json["type"], serde_json::json!("task"));
    assert_eq!(json["priority"], serde_json::json!("3"));
    assert_eq!(json["status"], serde_json::json!("backlog"));
}

#[test]
fn new_issue_defaults_optional_fields() {
    let new: NewIssue = serde_json::from_str(r#"{"title":"t","type":"bug","priority":"5"}"#).unwrap();
    assert_eq!(new.issue_type, IssueType::Bug);
    assert_eq!(new.priority, IssuePriority::Highest);
    assert!(new.user_ids.is_empty());
    assert!(new.reporter_id.is_none());
}

#[test]
fn patch_null_assignee_clears() {
    let patch: IssuePatch = serde_json::from_str(r#"{"assignee_id":null,"status":"done"}"#).unwrap();
    assert_eq!(patch.assignee_id, Some(None));
    assert_eq!(patch.status, Some(IssueStatus::Done));
    assert!(patch.title.is_none());
}

// =============================================================================
// errors
// =============================================================================

#[test]
fn error_codes() {
    assert_eq!(IssueError::NotFound(1).error_code(), "E_ISSUE_NOT_FOUND");
    assert_eq!(IssueError::Position(PositionError::IssueNotFound(1)).error_code(), "E_ISSUE_NOT_FOUND");
    assert_eq!(IssueError::Validation("x".into()).error_code(), "E_VALIDATION");
}

#[test]
fn comment_errors_convert() {
    assert!(matches!(IssueError::from(CommentError::IssueNotFound(5)), IssueError::NotFound(5)));
    assert!(matches!(IssueError::from(CommentError::EmptyBody), IssueError::Validation(_)));
}

#[tokio::test]
async fn create_issue_rejects_blank_title_without_db() {
    let state = state_helpers::test_app_state();
    let (_client, mut rx) = state_helpers::seed_subscriber(&state, 1).await;
    let new = NewIssue {
        title: "  ".into(),
        issue_type: IssueType::Task,
        priority: IssuePriority::Medium,
        description: None,
        estimate: None,
        reporter_id: None,
        assignee_id: None,
        user_ids: Vec::new(),
    };
    let err = create_issue(&state, 1, Uuid::new_v4(), new).await.unwrap_err();
    assert!(matches!(err, IssueError::Validation(_)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn search_with_blank_term_returns_nothing_without_db() {
    let state = state_helpers::test_app_state();
    assert!(search_issues(&state.pool, 1, "   ").await.unwrap().is_empty());
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn move_issue_round_trip_against_live_db() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
    let pool = crate::db::init_pool(&url, 2).await.expect("pool");
    let mut config = crate::config::Config::for_tests();
    config.database_url = url;
    let state = AppState::new(pool, config);

    let project_id: i64 = sqlx::query("INSERT INTO projects (name) VALUES ('live') RETURNING id")
        .fetch_one(&state.pool)
        .await
        .expect("project")
        .get("id");
    let user = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, password_hash, project_id) VALUES ($1, 'live', $2, 'x$y', $3)")
        .bind(user)
        .bind(format!("{user}@example.com"))
        .bind(project_id)
        .execute(&state.pool)
        .await
        .expect("user");

    let mut ids = Vec::new();
    for n in 0..3 {
        let new = NewIssue {
            title: format!("issue {n}"),
            issue_type: IssueType::Task,
            priority: IssuePriority::Medium,
            description: None,
            estimate: None,
            reporter_id: None,
            assignee_id: None,
            user_ids: Vec::new(),
        };
        ids.push(create_issue(&state, project_id, user, new).await.expect("create").id);
    }

    // Newest first in the backlog: [2, 1, 0]. Drag the newest to the tail.
    let drag = DragMove {
        issue_id: ids[2],
        source: DropLocation { status: IssueStatus::Backlog, index: 0 },
        destination: DropLocation { status: IssueStatus::Backlog, index: 2 },
    };
    move_issue(&state, project_id, user, drag).await.expect("move");

    let board = list_issues(&state.pool, project_id, &crate::services::filter::IssueFilters::default(), Some(user))
        .await
        .expect("list");
    let order: Vec<i64> = board.iter().map(|i| i.id).collect();
    assert_eq!(order, vec![ids[1], ids[0], ids[2]]);

    let missing = DragMove { issue_id: i64::MAX, ..drag };
    let err = move_issue(&state, project_id, user, missing).await.unwrap_err();
    assert!(matches!(err, IssueError::Position(PositionError::IssueNotFound(_))));
}
