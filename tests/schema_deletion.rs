//! Schema Deletion Tests
//!
//! Tests for schema deletion invariants:
//! - Subordinate elements are always deleted before their superiors
//! - The impact report covers kept elements only
//! - The delete task stops at the first refusal

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use dsconsole::schema::{
    impact_report, order_for_deletion, AttributeType, DeleteSchemaElementsTask, ObjectClass,
    ObjectClassKind, Schema, SchemaWriter,
};
use dsconsole::store::ClientResult;
use dsconsole::task::{TaskBody, TaskCoordinator, TaskState};

// =============================================================================
// Helper Functions
// =============================================================================

/// top <- person <- organizationalPerson <- inetOrgPerson, top <- device
fn schema() -> Schema {
    let mut top = ObjectClass::new("2.5.6.0", "top");
    top.kind = ObjectClassKind::Abstract;
    Schema::new(
        vec![
            AttributeType::new("2.5.4.41", "name"),
            AttributeType::new("2.5.4.3", "cn").with_superior("name"),
            AttributeType::new("2.5.4.4", "sn").with_superior("name"),
            AttributeType::new("1.9.1", "nickName").with_superior("cn"),
            AttributeType::new("0.9.2342.19200300.100.1.3", "mail"),
            AttributeType::new("2.5.4.13", "description"),
        ],
        vec![
            top,
            ObjectClass::new("2.5.6.6", "person")
                .with_superior("top")
                .with_required("cn")
                .with_required("sn")
                .with_optional("description"),
            ObjectClass::new("2.5.6.7", "organizationalPerson").with_superior("person"),
            ObjectClass::new("2.16.840.1.113730.3.2.2", "inetOrgPerson")
                .with_superior("organizationalPerson")
                .with_optional("mail"),
            ObjectClass::new("2.5.6.14", "device")
                .with_superior("top")
                .with_required("cn"),
        ],
    )
    .unwrap()
}

fn position(names: &[&str], name: &str) -> usize {
    names.iter().position(|n| *n == name).unwrap()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// =============================================================================
// Ordering Tests
// =============================================================================

/// Every input permutation places subclasses before superclasses.
#[test]
fn test_subclasses_first_for_every_permutation() {
    let schema = schema();
    let classes = ["person", "organizationalPerson", "inetOrgPerson", "device"];
    let permutations = [
        [0, 1, 2, 3],
        [0, 2, 1, 3],
        [1, 0, 3, 2],
        [1, 2, 0, 3],
        [2, 0, 1, 3],
        [2, 1, 3, 0],
        [3, 0, 1, 2],
        [3, 2, 1, 0],
    ];
    for permutation in permutations {
        let input: Vec<&str> = permutation.iter().map(|&i| classes[i]).collect();
        let order = order_for_deletion(&schema, &input, &[]).unwrap();
        let names: Vec<&str> = order.object_classes.iter().map(|c| c.name_or_oid()).collect();
        assert_eq!(names.len(), 4, "input {:?}", input);
        assert!(
            position(&names, "inetOrgPerson") < position(&names, "organizationalPerson"),
            "input {:?} gave {:?}",
            input,
            names
        );
        assert!(
            position(&names, "organizationalPerson") < position(&names, "person"),
            "input {:?} gave {:?}",
            input,
            names
        );
    }
}

/// Attribute types follow their superior chains.
#[test]
fn test_attribute_subtypes_first() {
    let schema = schema();
    let order = order_for_deletion(&schema, &[], &["name", "sn", "nickName", "cn"]).unwrap();
    let names: Vec<&str> = order.attribute_types.iter().map(|a| a.name_or_oid()).collect();
    assert!(position(&names, "nickName") < position(&names, "cn"));
    assert!(position(&names, "cn") < position(&names, "name"));
    assert!(position(&names, "sn") < position(&names, "name"));
}

/// Unrelated elements keep their input order.
#[test]
fn test_unrelated_elements_keep_order() {
    let schema = schema();
    let order = order_for_deletion(&schema, &["device", "inetOrgPerson"], &["mail", "description"])
        .unwrap();
    assert_eq!(order.names(), vec!["device", "inetOrgPerson", "mail", "description"]);
}

/// A single element is returned as is.
#[test]
fn test_single_element_order() {
    let schema = schema();
    let order = order_for_deletion(&schema, &[], &["name"]).unwrap();
    assert_eq!(order.names(), vec!["name"]);
}

// =============================================================================
// Impact Report Tests
// =============================================================================

/// Deleting a superior attribute lists its kept subtypes.
#[test]
fn test_attribute_children_reported() {
    let schema = schema();
    let report = impact_report(&schema, &[], &["name"]).unwrap();
    assert_eq!(report.child_attributes, set(&["cn", "sn"]));
    assert!(report.child_classes.is_empty());
    assert!(report.dependent_classes.is_empty());
}

/// Classes using a deleted attribute directly or by inheritance are reported.
#[test]
fn test_dependent_classes_reported() {
    let schema = schema();
    let report = impact_report(&schema, &[], &["cn"]).unwrap();
    assert_eq!(
        report.dependent_classes,
        set(&["device", "inetOrgPerson", "organizationalPerson", "person"])
    );
    assert_eq!(report.child_attributes, set(&["nickName"]));
    assert!(report
        .to_string()
        .contains("Attribute cn is used by the following object classes: device, inetOrgPerson, organizationalPerson, person"));
}

/// Classes being deleted never show up as children or dependents.
#[test]
fn test_deleted_classes_not_reported() {
    let schema = schema();
    let report = impact_report(&schema, &["person", "organizationalPerson"], &["description"])
        .unwrap();
    assert_eq!(report.child_classes, set(&["inetOrgPerson"]));
    assert_eq!(report.dependent_classes, set(&["inetOrgPerson"]));

    let text = report.to_string();
    assert!(text.contains("The object classes to delete are superior of the following object classes: inetOrgPerson"));
    assert!(text.ends_with(
        "The following schema elements will be deleted: person, organizationalPerson, description"
    ));
}

/// Unknown names are rejected.
#[test]
fn test_unknown_element_rejected() {
    let schema = schema();
    assert!(impact_report(&schema, &["nonexistent"], &[]).unwrap_err().is_validation());
    assert!(order_for_deletion(&schema, &[], &["nonexistent"]).unwrap_err().is_validation());
}

// =============================================================================
// Delete Task Tests
// =============================================================================

#[derive(Default)]
struct FakeSchemaServer {
    deleted: Mutex<Vec<String>>,
    refuse: Option<&'static str>,
}

impl SchemaWriter for FakeSchemaServer {
    fn delete_object_class(&self, class: &ObjectClass) -> ClientResult<()> {
        self.delete(class.name_or_oid())
    }

    fn delete_attribute_type(&self, attribute: &AttributeType) -> ClientResult<()> {
        self.delete(attribute.name_or_oid())
    }
}

impl FakeSchemaServer {
    fn delete(&self, name: &str) -> ClientResult<()> {
        if self.refuse == Some(name) {
            return Err(format!("unwilling to perform: {} is in use", name).into());
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// The task deletes in the computed order through the coordinator.
#[tokio::test]
async fn test_delete_task_runs_in_order() {
    let schema = schema();
    let order = order_for_deletion(&schema, &["person", "inetOrgPerson"], &["sn"]).unwrap();
    let server = Arc::new(FakeSchemaServer::default());
    let body = DeleteSchemaElementsTask::new(server.clone(), order);
    assert!(body.equivalent_ldif().unwrap().contains("delete: objectClasses"));

    let coordinator = TaskCoordinator::new();
    let task = dsconsole::task::Task::new("localhost", body);
    let finished = coordinator.submit(task).unwrap().wait().await.unwrap();

    assert_eq!(finished.state(), TaskState::FinishedSuccessfully);
    assert_eq!(*server.deleted.lock().unwrap(), vec!["inetOrgPerson", "person", "sn"]);
}

/// A refusal stops the task and is recorded as its error.
#[tokio::test]
async fn test_delete_task_stops_on_refusal() {
    let schema = schema();
    let order = order_for_deletion(&schema, &["device"], &["mail", "description"]).unwrap();
    let server = Arc::new(FakeSchemaServer {
        refuse: Some("mail"),
        ..Default::default()
    });
    let task = dsconsole::task::Task::new(
        "localhost",
        DeleteSchemaElementsTask::new(server.clone(), order),
    );

    let finished = TaskCoordinator::new()
        .submit(task)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(finished.state(), TaskState::FinishedWithError);
    assert_eq!(finished.last_error().unwrap().code(), "DSC_CONFIG_REMOTE");
    assert_eq!(*server.deleted.lock().unwrap(), vec!["device"]);
}
