mod common;

use common::{Call, StubApi, fast_wait, running, web1};
use scaleform_cloud::{
    ActionType, Applier, CloudError, DeclaredConfig, GlobalState, InstanceReconciler,
    ResourceStatus, StateManager, plan_all,
};
use std::collections::BTreeMap;

fn desired(config: DeclaredConfig) -> BTreeMap<String, DeclaredConfig> {
    [("server.web1".to_string(), config)].into_iter().collect()
}

#[tokio::test]
async fn test_create_records_ready_resource() {
    let api = StubApi::new().with_ids(&["srv-1"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    assert_eq!(plan.summary().create, 1);

    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(result.is_success());

    let record = state.get_resource("server.web1").unwrap();
    assert_eq!(record.status, ResourceStatus::Ready);
    assert_eq!(record.data.id.as_deref(), Some("srv-1"));
    assert_eq!(record.data.computed.ipv4_address, "1.2.3.4");
}

#[tokio::test]
async fn test_partial_create_is_persisted_as_tainted() {
    let temp_dir = tempfile::tempdir().unwrap();
    let manager = StateManager::new(temp_dir.path());

    let api = StubApi::new().never_ready().with_ids(&["srv-1"]);
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(2));
    let applier = Applier::new(&reconciler).with_state_manager(&manager);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(!result.is_success());

    let saved = manager.load().await.unwrap();
    let record = saved.get_resource("server.web1").unwrap();
    assert_eq!(record.status, ResourceStatus::Tainted);
    assert_eq!(record.data.id.as_deref(), Some("srv-1"));

    // the next plan replaces the tainted instance
    let plan = plan_all(&saved, &desired(web1()));
    assert_eq!(plan.actions[0].action_type, ActionType::Replace);
}

#[tokio::test]
async fn test_image_change_is_replaced_not_patched() {
    let api = StubApi::new().with_ids(&["srv-1", "srv-2"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    api.report(running("srv-2", "5.6.7.8", "10.0.0.6"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    applier.apply_plan(&mut state, &plan).await.unwrap();

    let mut new = web1();
    new.image = "img-456".to_string();
    let plan = plan_all(&state, &desired(new));
    assert_eq!(plan.actions[0].action_type, ActionType::Replace);

    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(result.is_success());

    assert!(reconciler.api().patches().is_empty());
    assert!(
        reconciler
            .api()
            .calls()
            .contains(&Call::Delete("srv-1".to_string(), false))
    );
    let record = state.get_resource("server.web1").unwrap();
    assert_eq!(record.data.id.as_deref(), Some("srv-2"));
    assert_eq!(record.data.config.image, "img-456");
}

#[tokio::test]
async fn test_update_patches_and_refreshes() {
    let api = StubApi::new().with_ids(&["srv-1"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    applier.apply_plan(&mut state, &plan).await.unwrap();

    let mut new = web1();
    new.name = "web1-renamed".to_string();
    let plan = plan_all(&state, &desired(new));
    assert_eq!(plan.actions[0].action_type, ActionType::Update);
    assert_eq!(plan.actions[0].changed_fields, vec!["name"]);

    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(result.is_success());

    let patches = reconciler.api().patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].name.as_deref(), Some("web1-renamed"));
    assert_eq!(
        state.data("server.web1").unwrap().config.name,
        "web1-renamed"
    );
}

#[tokio::test]
async fn test_refresh_drops_vanished_instances() {
    let api = StubApi::new().with_ids(&["srv-1"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    applier.apply_plan(&mut state, &plan).await.unwrap();

    reconciler.api().forget("srv-1");

    let removed = applier.refresh(&mut state).await.unwrap();
    assert_eq!(removed, vec!["server.web1".to_string()]);
    assert!(state.get_resource("server.web1").is_none());

    // and the next plan recreates it
    let plan = plan_all(&state, &desired(web1()));
    assert_eq!(plan.actions[0].action_type, ActionType::Create);
}

#[tokio::test]
async fn test_delete_removes_record() {
    let api = StubApi::new().with_ids(&["srv-1"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));
    applier.apply_plan(&mut state, &plan).await.unwrap();

    let plan = plan_all(&state, &BTreeMap::new());
    assert_eq!(plan.summary().delete, 1);

    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(result.is_success());
    assert!(state.resources.is_empty());
}

#[tokio::test]
async fn test_apply_holds_state_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    let manager = StateManager::new(temp_dir.path());

    let api = StubApi::new().with_ids(&["srv-1"]);
    api.report(running("srv-1", "1.2.3.4", "10.0.0.5"));
    let reconciler = InstanceReconciler::new(api).with_wait_config(fast_wait(3));
    let applier = Applier::new(&reconciler).with_state_manager(&manager);

    let mut state = GlobalState::new();
    let plan = plan_all(&state, &desired(web1()));

    // another run owns the project
    let held = manager.acquire_lock().await.unwrap();
    let err = applier.apply_plan(&mut state, &plan).await.unwrap_err();
    assert!(matches!(err, CloudError::LockError(_)));
    assert!(reconciler.api().calls().is_empty());
    assert!(applier.refresh(&mut state).await.is_err());

    held.release().await.unwrap();
    let result = applier.apply_plan(&mut state, &plan).await.unwrap();
    assert!(result.is_success());

    // released once the run is over
    let lock = manager.acquire_lock().await.unwrap();
    lock.release().await.unwrap();
}
