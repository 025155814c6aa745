use super::*;

#[test]
fn project_state_new_is_idle() {
    let ps = ProjectState::new();
    assert!(ps.clients.is_empty());
    assert!(ps.dirty.is_empty());
    assert!(ps.is_idle());
}

#[test]
fn project_state_with_dirty_column_is_not_idle() {
    let mut ps = ProjectState::default();
    ps.dirty.insert(IssueStatus::Done);
    assert!(!ps.is_idle());
}

#[tokio::test]
async fn seed_subscriber_registers_client() {
    let state = test_helpers::test_app_state();
    let (client_id, _rx) = test_helpers::seed_subscriber(&state, 5).await;

    let projects = state.projects.read().await;
    let project = projects.get(&5).expect("project state should exist");
    assert!(project.clients.contains_key(&client_id));
    assert!(!project.is_idle());
}

#[tokio::test]
async fn clones_share_project_map() {
    let state = test_helpers::test_app_state();
    let clone = state.clone();
    let _ = test_helpers::seed_subscriber(&state, 1).await;
    assert!(clone.projects.read().await.contains_key(&1));
}
