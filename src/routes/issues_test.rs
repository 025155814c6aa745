use super::*;
use crate::position::PositionError;
use crate::services::issue::test_helpers::issue;

#[test]
fn issue_errors_map_to_status() {
    assert_eq!(issue_error_to_status(&IssueError::NotFound(1)), StatusCode::NOT_FOUND);
    assert_eq!(
        issue_error_to_status(&IssueError::Position(PositionError::IssueNotFound(1))),
        StatusCode::NOT_FOUND
    );
    assert_eq!(issue_error_to_status(&IssueError::Validation("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(
        issue_error_to_status(&IssueError::Database(sqlx::Error::PoolTimedOut)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn build_columns_groups_in_board_order() {
    let mut a = issue(1);
    a.status = IssueStatus::Done;
    let b = issue(2);
    let mut c = issue(3);
    c.status = IssueStatus::InProgress;
    let all = vec![a.clone(), b.clone(), c.clone()];

    let columns = build_columns(&all, all.clone());
    let statuses: Vec<IssueStatus> = columns.iter().map(|col| col.status).collect();
    assert_eq!(statuses, IssueStatus::ALL.to_vec());
    assert_eq!(columns[0].issues.len(), 1);
    assert_eq!(columns[1].issues.len(), 0);
    assert_eq!(columns[2].issues[0].id, 3);
    assert_eq!(columns[3].issues[0].id, 1);
    assert_eq!(columns[1].label, "Selected for development");
}

#[test]
fn build_columns_counts_against_unfiltered_set() {
    let all = vec![issue(1), issue(2), issue(3)];
    let shown = vec![issue(2)];
    let columns = build_columns(&all, shown);
    assert_eq!(columns[0].count, "1 of 3");
    assert_eq!(columns[1].count, "0");
}

#[test]
fn move_body_allows_missing_destination() {
    let body: MoveBody = serde_json::from_str(r#"{"source":{"status":"backlog","index":2}}"#).unwrap();
    assert_eq!(body.source, DropLocation { status: IssueStatus::Backlog, index: 2 });
    assert!(body.destination.is_none());
}

#[test]
fn move_body_parses_destination() {
    let body: MoveBody = serde_json::from_str(
        r#"{"source":{"status":"backlog","index":0},"destination":{"status":"inprogress","index":4}}"#,
    )
    .unwrap();
    assert_eq!(body.destination, Some(DropLocation { status: IssueStatus::InProgress, index: 4 }));
}
