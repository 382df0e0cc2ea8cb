mod common;

use common::{InMemoryGenv, ScriptedRunner, ENVS_PS};
use genvlab_core::DeviceBinding;
use genvlab_core::{
    DeviceLookupVerb, GenvDeviceRegistry, GenvEnvironmentRegistry, KernelId, RegistryError,
    StateService,
};

fn kernel(value: &str) -> KernelId {
    KernelId::parse(value).unwrap()
}

fn in_memory_service(
    genv: &InMemoryGenv,
    uid: Option<u32>,
) -> StateService<GenvEnvironmentRegistry<InMemoryGenv>, GenvDeviceRegistry<InMemoryGenv>> {
    StateService::new(
        GenvEnvironmentRegistry::new(genv.clone(), uid),
        GenvDeviceRegistry::new(genv.clone(), DeviceLookupVerb::Find),
    )
}

#[tokio::test]
async fn activate_then_find_reports_the_binding() {
    let genv = InMemoryGenv::with_devices(&[(0, Some("e1")), (1, None)]);
    let service = in_memory_service(&genv, Some(1000));

    assert_eq!(service.find(&kernel("k1")).await.unwrap(), None);
    service.activate("e1", &kernel("k1")).await.unwrap();
    assert_eq!(
        service.find(&kernel("k1")).await.unwrap(),
        Some("e1".to_string())
    );

    assert_eq!(
        service.devices().await.unwrap(),
        vec![
            DeviceBinding::new(0, Some("e1".to_string())),
            DeviceBinding::new(1, None),
        ]
    );
}

#[tokio::test]
async fn activate_without_uid_never_reaches_the_registry() {
    let genv = InMemoryGenv::with_devices(&[]);
    let service = in_memory_service(&genv, None);

    let err = service.activate("e1", &kernel("k1")).await.unwrap_err();
    assert!(matches!(err, RegistryError::MissingUid));
    assert_eq!(service.find(&kernel("k1")).await.unwrap(), None);
}

#[tokio::test]
async fn activate_rejects_invalid_environment_id() {
    let genv = InMemoryGenv::with_devices(&[]);
    let service = in_memory_service(&genv, Some(1000));

    let err = service.activate("e 1", &kernel("k1")).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidIdentifier(_)));
}

#[tokio::test]
async fn every_read_issues_a_fresh_query() {
    let runner = ScriptedRunner::new().reply(ENVS_PS, "e1,alice,train,t,");
    let service = StateService::new(
        GenvEnvironmentRegistry::new(runner.clone(), Some(1000)),
        GenvDeviceRegistry::new(runner.clone(), DeviceLookupVerb::Find),
    );

    service.environments().await.unwrap();
    service.environments().await.unwrap();
    assert_eq!(runner.calls(), vec![ENVS_PS.to_string(), ENVS_PS.to_string()]);
}
