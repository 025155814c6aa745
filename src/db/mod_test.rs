use super::*;
use crate::model::IssueStatus;

#[test]
fn decode_enum_parses_known_value() {
    let status = decode_enum("inprogress", "status", IssueStatus::parse).unwrap();
    assert_eq!(status, IssueStatus::InProgress);
}

#[test]
fn decode_enum_reports_column_on_unknown_value() {
    let err = decode_enum("archived", "status", IssueStatus::parse).unwrap_err();
    match err {
        sqlx::Error::ColumnDecode { index, .. } => assert_eq!(index, "status"),
        other => panic!("unexpected error: {other}"),
    }
}
