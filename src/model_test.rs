use super::*;

#[test]
fn status_parse_accepts_stored_form_and_ignores_case() {
    assert_eq!(IssueStatus::parse("backlog"), Some(IssueStatus::Backlog));
    assert_eq!(IssueStatus::parse(" InProgress "), Some(IssueStatus::InProgress));
    assert_eq!(IssueStatus::parse("DONE"), Some(IssueStatus::Done));
    assert_eq!(IssueStatus::parse("in_progress"), None);
}

#[test]
fn status_all_is_board_order() {
    let names: Vec<&str> = IssueStatus::ALL.iter().map(|s| s.as_str()).collect();
    assert_eq!(names, ["backlog", "selected", "inprogress", "done"]);
}

#[test]
fn status_serializes_as_storage_string() {
    let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
    assert_eq!(json, "\"inprogress\"");
    let back: IssueStatus = serde_json::from_str("\"selected\"").unwrap();
    assert_eq!(back, IssueStatus::Selected);
}

#[test]
fn priority_parse_accepts_digit_or_label() {
    assert_eq!(IssuePriority::parse("5"), Some(IssuePriority::Highest));
    assert_eq!(IssuePriority::parse("medium"), Some(IssuePriority::Medium));
    assert_eq!(IssuePriority::parse("0"), None);
}

#[test]
fn priority_serializes_as_digit() {
    assert_eq!(serde_json::to_string(&IssuePriority::Low).unwrap(), "\"2\"");
    assert!(IssuePriority::Highest > IssuePriority::High);
}

#[test]
fn type_and_category_reject_unknown_values() {
    assert_eq!(IssueType::parse("Bug"), Some(IssueType::Bug));
    assert_eq!(IssueType::parse("epic"), None);
    assert_eq!(ProjectCategory::parse("marketing"), Some(ProjectCategory::Marketing));
    assert_eq!(ProjectCategory::parse(""), None);
}

#[derive(Debug, Deserialize)]
struct Patch {
    #[serde(default, deserialize_with = "nullable")]
    note: Option<Option<String>>,
}

#[test]
fn nullable_distinguishes_absent_from_null() {
    let absent: Patch = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.note, None);
    let cleared: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
    assert_eq!(cleared.note, Some(None));
    let set: Patch = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
    assert_eq!(set.note, Some(Some("hi".into())));
}
