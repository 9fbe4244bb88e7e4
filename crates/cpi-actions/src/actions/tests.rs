//! Unit tests for the concrete actions.

use std::sync::Arc;

use cpi_config::CloudConfig;
use cpi_dispatch::action::invoke;
use cpi_dispatch::{Action, ActionContext, DispatchError, ErrorKind};
use mockall::mock;
use rstest::{fixture, rstest};
use serde_json::{Map, json};

use super::*;
use crate::ids::SequentialIds;
use crate::infra::{InfraClient, MemoryInfra};

mock! {
    Infra {}

    impl InfraClient for Infra {
        fn create(&self, resource: Resource) -> Result<Resource, InfraError>;
        fn get(&self, kind: ResourceKind, cid: &str) -> Result<Option<Resource>, InfraError>;
        fn update(&self, resource: Resource) -> Result<Resource, InfraError>;
        fn delete(&self, kind: ResourceKind, cid: &str) -> Result<(), InfraError>;
        fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, InfraError>;
    }
}

fn dependencies_over(infra: Arc<dyn InfraClient>) -> Dependencies {
    let mut config = CloudConfig::new("memory", "test-project");
    config.cloud.properties.google.default_zone = Some(String::from("us-central1-a"));
    Dependencies::new(infra, Arc::new(SequentialIds::new()), config)
}

struct Fixture {
    infra: Arc<MemoryInfra>,
    dependencies: Dependencies,
}

impl Fixture {
    fn run<A: Action<Dependencies = Dependencies>>(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        self.run_with_context::<A>(method, arguments, &Map::new())
    }

    fn run_with_context<A: Action<Dependencies = Dependencies>>(
        &self,
        method: &str,
        arguments: Vec<Value>,
        context: &Map<String, Value>,
    ) -> Result<Value, DispatchError> {
        invoke::<A>(
            &self.dependencies,
            arguments,
            &ActionContext::new(method, context),
        )
    }

    fn resource(&self, kind: ResourceKind, cid: &str) -> Resource {
        self.infra
            .get(kind, cid)
            .expect("lookup")
            .unwrap_or_else(|| panic!("{kind} '{cid}' missing"))
    }

    fn stemcell(&self) -> String {
        let value = self
            .run::<CreateStemcell>(
                "create_stemcell",
                vec![json!("/tmp/image.tgz"), json!({"name": "ubuntu"})],
            )
            .expect("create stemcell");
        value.as_str().expect("cid").to_owned()
    }

    fn vm(&self) -> String {
        let stemcell = self.stemcell();
        let value = self
            .run::<CreateVm>(
                "create_vm",
                vec![
                    json!("agent-1"),
                    json!(stemcell),
                    json!({"machine_type": "n1-standard-1"}),
                    json!({"default": {"type": "dynamic"}}),
                    Value::Null,
                    Value::Null,
                ],
            )
            .expect("create vm");
        value.as_str().expect("cid").to_owned()
    }

    fn disk(&self) -> String {
        let value = self
            .run::<CreateDisk>("create_disk", vec![json!(1024), json!({})])
            .expect("create disk");
        value.as_str().expect("cid").to_owned()
    }
}

#[fixture]
fn fixture() -> Fixture {
    let infra = Arc::new(MemoryInfra::new());
    let dependencies = dependencies_over(Arc::clone(&infra) as Arc<dyn InfraClient>);
    Fixture {
        infra,
        dependencies,
    }
}

fn assert_fatal(result: Result<Value, DispatchError>, fragment: &str) {
    let error = result.expect_err("action should fail");
    assert_eq!(error.kind(), ErrorKind::ActionError, "got: {error}");
    assert!(!error.ok_to_retry(), "got: {error}");
    assert!(error.to_string().contains(fragment), "got: {error}");
}

// ---------------------------------------------------------------------------
// info and stemcells
// ---------------------------------------------------------------------------

#[rstest]
fn info_lists_stemcell_formats(fixture: Fixture) {
    let value = fixture.run::<Info>("info", Vec::new()).expect("info");
    assert_eq!(
        value,
        json!({"stemcell_formats": ["google-rawdisk", "google-light"]})
    );
}

#[rstest]
fn create_stemcell_records_image(fixture: Fixture) {
    let cid = fixture.stemcell();
    assert_eq!(cid, "stemcell-1");
    let stemcell = fixture.resource(ResourceKind::Stemcell, &cid);
    assert_eq!(stemcell.str_property("image_path"), Some("/tmp/image.tgz"));
    assert_eq!(stemcell.str_property("project"), Some("test-project"));
}

#[rstest]
fn create_stemcell_rejects_blank_image_path(fixture: Fixture) {
    assert_fatal(
        fixture.run::<CreateStemcell>("create_stemcell", vec![json!(" "), json!({})]),
        "image_path must not be empty",
    );
}

#[rstest]
fn delete_stemcell_removes_it(fixture: Fixture) {
    let cid = fixture.stemcell();
    let value = fixture
        .run::<DeleteStemcell>("delete_stemcell", vec![json!(cid)])
        .expect("delete");
    assert_eq!(value, json!(true));
    assert_fatal(
        fixture.run::<DeleteStemcell>("delete_stemcell", vec![json!(cid)]),
        "not found",
    );
}

// ---------------------------------------------------------------------------
// VMs
// ---------------------------------------------------------------------------

#[rstest]
fn create_vm_labels_director(fixture: Fixture) {
    let stemcell = fixture.stemcell();
    let mut context = Map::new();
    context.insert(String::from("director_uuid"), json!("director-abc"));
    let value = fixture
        .run_with_context::<CreateVm>(
            "create_vm",
            vec![
                json!("agent-1"),
                json!(stemcell),
                json!({"zone": "europe-west1-b"}),
                json!({}),
                Value::Null,
                json!({"bosh": {"password": "secret"}}),
            ],
            &context,
        )
        .expect("create vm");
    let vm = fixture.resource(ResourceKind::Vm, value.as_str().expect("cid"));
    assert_eq!(vm.property("labels"), Some(&json!({"director_uuid": "director-abc"})));
    assert_eq!(vm.str_property("zone"), Some("europe-west1-b"));
    assert_eq!(vm.str_property("agent_id"), Some("agent-1"));
}

#[rstest]
fn create_vm_uses_default_zone_without_labels(fixture: Fixture) {
    let cid = fixture.vm();
    let vm = fixture.resource(ResourceKind::Vm, &cid);
    assert_eq!(vm.str_property("zone"), Some("us-central1-a"));
    assert_eq!(vm.property("labels"), Some(&json!({})));
    assert_eq!(vm.property("env"), Some(&json!({})));
}

#[rstest]
fn create_vm_requires_existing_stemcell(fixture: Fixture) {
    assert_fatal(
        fixture.run::<CreateVm>(
            "create_vm",
            vec![
                json!("agent-1"),
                json!("stemcell-missing"),
                json!({}),
                json!({}),
                Value::Null,
                Value::Null,
            ],
        ),
        "stemcell 'stemcell-missing' not found",
    );
    assert_eq!(fixture.infra.count(ResourceKind::Vm), 0);
}

#[rstest]
fn create_vm_requires_existing_locality_disks(fixture: Fixture) {
    let stemcell = fixture.stemcell();
    assert_fatal(
        fixture.run::<CreateVm>(
            "create_vm",
            vec![
                json!("agent-1"),
                json!(stemcell),
                json!({}),
                json!({}),
                json!(["disk-missing"]),
                Value::Null,
            ],
        ),
        "disk 'disk-missing' not found",
    );
}

#[rstest]
fn has_vm_reports_existence(fixture: Fixture) {
    let cid = fixture.vm();
    assert_eq!(
        fixture.run::<HasVm>("has_vm", vec![json!(cid)]).expect("has_vm"),
        json!(true)
    );
    assert_eq!(
        fixture
            .run::<HasVm>("has_vm", vec![json!("vm-missing")])
            .expect("has_vm"),
        json!(false)
    );
}

#[rstest]
fn reboot_vm_counts_reboots(fixture: Fixture) {
    let cid = fixture.vm();
    for _ in 0..2 {
        fixture
            .run::<RebootVm>("reboot_vm", vec![json!(cid)])
            .expect("reboot");
    }
    let vm = fixture.resource(ResourceKind::Vm, &cid);
    assert_eq!(vm.property("reboot_count"), Some(&json!(2)));
}

#[rstest]
fn set_vm_metadata_merges(fixture: Fixture) {
    let cid = fixture.vm();
    fixture
        .run::<SetVmMetadata>(
            "set_vm_metadata",
            vec![json!(cid), json!({"job": "router", "index": "0"})],
        )
        .expect("first metadata");
    fixture
        .run::<SetVmMetadata>("set_vm_metadata", vec![json!(cid), json!({"index": "1"})])
        .expect("second metadata");
    let vm = fixture.resource(ResourceKind::Vm, &cid);
    assert_eq!(vm.property("metadata"), Some(&json!({"job": "router", "index": "1"})));
}

#[rstest]
fn delete_vm_detaches_its_disks(fixture: Fixture) {
    let vm = fixture.vm();
    let disk = fixture.disk();
    fixture
        .run::<AttachDisk>("attach_disk", vec![json!(vm), json!(disk)])
        .expect("attach");
    fixture
        .run::<DeleteVm>("delete_vm", vec![json!(vm)])
        .expect("delete vm");
    assert_eq!(fixture.infra.count(ResourceKind::Vm), 0);
    let stored = fixture.resource(ResourceKind::Disk, &disk);
    assert_eq!(stored.property(ATTACHED_TO), Some(&Value::Null));
}

#[rstest]
fn missing_vm_is_fatal(fixture: Fixture) {
    assert_fatal(
        fixture.run::<RebootVm>("reboot_vm", vec![json!("vm-missing")]),
        "vm 'vm-missing' not found",
    );
    assert_fatal(
        fixture.run::<DeleteVm>("delete_vm", vec![json!("vm-missing")]),
        "vm 'vm-missing' not found",
    );
}

// ---------------------------------------------------------------------------
// disks
// ---------------------------------------------------------------------------

#[rstest]
fn create_disk_records_size_and_zone(fixture: Fixture) {
    let cid = fixture.disk();
    assert_eq!(cid, "disk-1");
    let disk = fixture.resource(ResourceKind::Disk, &cid);
    assert_eq!(disk.property("size"), Some(&json!(1024)));
    assert_eq!(disk.str_property("zone"), Some("us-central1-a"));
}

#[test]
fn create_disk_rejects_zero_size_without_touching_infra() {
    let mut infra = MockInfra::new();
    infra.expect_create().never();
    let dependencies = dependencies_over(Arc::new(infra));
    let values = Map::new();
    let error = invoke::<CreateDisk>(
        &dependencies,
        vec![json!(0), json!({})],
        &ActionContext::new("create_disk", &values),
    )
    .expect_err("zero size");
    assert_eq!(error.kind(), ErrorKind::ActionError);
    assert!(error.to_string().contains("greater than zero"));
}

#[rstest]
fn attach_detach_and_list(fixture: Fixture) {
    let vm = fixture.vm();
    let first = fixture.disk();
    let second = fixture.disk();
    for disk in [&first, &second] {
        fixture
            .run::<AttachDisk>("attach_disk", vec![json!(vm), json!(disk)])
            .expect("attach");
    }
    assert_eq!(
        fixture
            .run::<GetDisks>("get_disks", vec![json!(vm)])
            .expect("get_disks"),
        json!([first, second])
    );

    fixture
        .run::<DetachDisk>("detach_disk", vec![json!(vm), json!(first)])
        .expect("detach");
    assert_eq!(
        fixture
            .run::<GetDisks>("get_disks", vec![json!(vm)])
            .expect("get_disks"),
        json!([second])
    );
}

#[rstest]
fn attach_is_idempotent_for_the_same_vm(fixture: Fixture) {
    let vm = fixture.vm();
    let disk = fixture.disk();
    for _ in 0..2 {
        fixture
            .run::<AttachDisk>("attach_disk", vec![json!(vm), json!(disk)])
            .expect("attach");
    }
}

#[rstest]
fn attach_refuses_a_disk_held_by_another_vm(fixture: Fixture) {
    let first = fixture.vm();
    let second = fixture.vm();
    let disk = fixture.disk();
    fixture
        .run::<AttachDisk>("attach_disk", vec![json!(first), json!(disk)])
        .expect("attach");
    assert_fatal(
        fixture.run::<AttachDisk>("attach_disk", vec![json!(second), json!(disk)]),
        "already attached",
    );
}

#[rstest]
fn detach_requires_attachment(fixture: Fixture) {
    let vm = fixture.vm();
    let disk = fixture.disk();
    assert_fatal(
        fixture.run::<DetachDisk>("detach_disk", vec![json!(vm), json!(disk)]),
        "is not attached",
    );
}

#[rstest]
fn delete_disk_refuses_attached_disks(fixture: Fixture) {
    let vm = fixture.vm();
    let disk = fixture.disk();
    fixture
        .run::<AttachDisk>("attach_disk", vec![json!(vm), json!(disk)])
        .expect("attach");
    assert_fatal(
        fixture.run::<DeleteDisk>("delete_disk", vec![json!(disk)]),
        "still attached",
    );

    fixture
        .run::<DetachDisk>("detach_disk", vec![json!(vm), json!(disk)])
        .expect("detach");
    fixture
        .run::<DeleteDisk>("delete_disk", vec![json!(disk)])
        .expect("delete");
    assert_eq!(
        fixture
            .run::<HasDisk>("has_disk", vec![json!(disk)])
            .expect("has_disk"),
        json!(false)
    );
}

// ---------------------------------------------------------------------------
// failure classification
// ---------------------------------------------------------------------------

#[test]
fn transient_infra_failures_are_retryable() {
    let mut infra = MockInfra::new();
    infra
        .expect_get()
        .times(1)
        .returning(|_, _| Err(InfraError::unavailable("connection reset")));
    let dependencies = dependencies_over(Arc::new(infra));
    let values = Map::new();
    let error = invoke::<HasDisk>(
        &dependencies,
        vec![json!("disk-1")],
        &ActionContext::new("has_disk", &values),
    )
    .expect_err("unavailable");
    assert_eq!(error.kind(), ErrorKind::ActionError);
    assert!(error.ok_to_retry());
    assert!(error.to_string().contains("connection reset"));
}

#[test]
fn permanent_infra_failures_are_fatal() {
    let mut infra = MockInfra::new();
    infra.expect_create().times(1).returning(|_| {
        Err(InfraError::Invalid {
            message: String::from("quota exceeded"),
        })
    });
    let dependencies = dependencies_over(Arc::new(infra));
    let values = Map::new();
    let error = invoke::<CreateDisk>(
        &dependencies,
        vec![json!(10), json!({})],
        &ActionContext::new("create_disk", &values),
    )
    .expect_err("invalid");
    assert!(!error.ok_to_retry());
    assert!(error.to_string().contains("quota exceeded"));
}

#[rstest]
#[case::string_for_size(vec![json!("ten"), json!({})])]
#[case::array_for_properties(vec![json!(10), json!([])])]
fn mistyped_arguments_are_argument_errors(fixture: Fixture, #[case] arguments: Vec<Value>) {
    let error = fixture
        .run::<CreateDisk>("create_disk", arguments)
        .expect_err("mistyped");
    assert_eq!(error.kind(), ErrorKind::ArgumentError);
    assert_eq!(fixture.infra.count(ResourceKind::Disk), 0);
}
