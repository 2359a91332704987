use std::sync::Arc;

use super::common::*;
use crate::audit::AuditAction;
use crate::directory::{AccountDirectory, NewAccount, Role};
use crate::infra::{InMemoryAccountDirectory, InMemoryAuditSink, InMemoryVerificationRegistry};
use crate::workflows::verification::domain::{
    ValidationError, VerificationId, VerificationOverride, VerificationStatus,
};
use crate::workflows::verification::registry::{RegistryError, VerificationRegistry};
use crate::workflows::verification::service::{
    Activation, ApproveOutcome, DeleteOutcome, RejectOutcome, VerificationService, WorkflowError,
};

#[test]
fn apply_creates_inactive_account_and_pending_record() {
    let (service, registry, directory, audit) = build_service();

    let record = service.apply(application()).expect("application accepted");

    assert_eq!(record.status, VerificationStatus::Pending);
    let account = directory
        .find_by_email("jane@inst.edu")
        .expect("lookup works")
        .expect("account exists");
    assert!(!account.is_active, "applicants start locked out");
    assert_eq!(record.counselor_account_id.as_ref(), Some(&account.id));
    assert_eq!(
        directory.roles(&account.id).expect("roles"),
        vec![Role::Counselor]
    );

    let stored = registry
        .find(&record.id)
        .expect("find works")
        .expect("record persisted");
    assert_eq!(stored, record);
    assert!(
        audit.entries().is_empty(),
        "self-service application is not an administrative action"
    );
}

#[test]
fn apply_rejects_invalid_input_before_any_mutation() {
    let (service, registry, directory, _audit) = build_service();

    let mut mismatch = application();
    mismatch.confirm_password = "other-pass".to_string();

    match service.apply(mismatch) {
        Err(WorkflowError::Validation(ValidationError::PasswordMismatch)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    assert!(registry.list(None).expect("list").is_empty());
    assert!(directory
        .find_by_email("jane@inst.edu")
        .expect("lookup")
        .is_none());
}

#[test]
fn apply_rejects_duplicate_email() {
    let (service, registry, directory, _audit) = build_service();
    directory
        .create(
            NewAccount {
                email: "jane@inst.edu".to_string(),
                full_name: "Jane Rivera".to_string(),
                is_active: true,
            },
            "existing-pass",
        )
        .expect("existing account");

    match service.apply(application()) {
        Err(WorkflowError::EmailTaken(email)) => assert_eq!(email, "jane@inst.edu"),
        other => panic!("expected email conflict, got {other:?}"),
    }
    assert!(registry.list(None).expect("list").is_empty());
}

#[test]
fn apply_rolls_back_account_when_record_persist_fails() {
    let registry = Arc::new(UnavailableRegistry);
    let directory = Arc::new(InMemoryAccountDirectory::default());
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = VerificationService::new(registry, directory.clone(), audit);

    match service.apply(application()) {
        Err(WorkflowError::Registry(RegistryError::Unavailable(_))) => {}
        other => panic!("expected registry failure, got {other:?}"),
    }

    assert!(
        directory
            .find_by_email("jane@inst.edu")
            .expect("lookup")
            .is_none(),
        "account must be rolled back"
    );
}

#[test]
fn apply_surfaces_orphaned_account_when_rollback_fails() {
    let registry = Arc::new(UnavailableRegistry);
    let directory = Arc::new(FlakyDirectory {
        fail_deletes: true,
        ..FlakyDirectory::default()
    });
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = VerificationService::new(registry, directory.clone(), audit);

    match service.apply(application()) {
        Err(WorkflowError::OrphanedAccount { account_id, .. }) => {
            let orphan = directory
                .find_by_id(&account_id)
                .expect("lookup")
                .expect("orphan still present");
            assert!(!orphan.is_active);
        }
        other => panic!("expected orphaned account error, got {other:?}"),
    }
}

#[test]
fn approve_activates_account_and_flips_status() {
    let (service, registry, directory, audit) = build_service();
    let pending = service.apply(application()).expect("application accepted");

    let outcome = service.approve(&pending.id, &admin()).expect("approve runs");

    let ApproveOutcome::Approved {
        record, activation, ..
    } = outcome
    else {
        panic!("expected approval");
    };

    assert_eq!(record.status, VerificationStatus::Verified);
    let account = directory
        .find_by_email("jane@inst.edu")
        .expect("lookup")
        .expect("account exists");
    assert!(account.is_active);
    assert_eq!(record.counselor_account_id.as_ref(), Some(&account.id));
    assert_eq!(
        activation,
        Activation::Existing {
            account_id: account.id,
            was_active: false
        }
    );

    let stored = registry
        .find(&record.id)
        .expect("find")
        .expect("record persisted");
    assert_eq!(stored.status, VerificationStatus::Verified);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::VerificationApproved);
    assert_eq!(entries[0].performed_by, "lead@console.local");
    assert!(entries[0].details.contains("Jane Rivera"));
}

#[test]
fn approve_again_is_a_noop_without_new_audit() {
    let (service, _registry, _directory, audit) = build_service();
    let pending = service.apply(application()).expect("application accepted");

    service.approve(&pending.id, &admin()).expect("first approve");
    let second = service.approve(&pending.id, &admin()).expect("second approve");

    match second {
        ApproveOutcome::AlreadyDecided(record) => {
            assert_eq!(record.status, VerificationStatus::Verified)
        }
        other => panic!("expected already-decided, got {other:?}"),
    }
    assert_eq!(audit.entries().len(), 1, "no duplicate audit entry");
}

#[test]
fn approve_missing_record_is_tolerated() {
    let (service, _registry, _directory, audit) = build_service();

    let outcome = service
        .approve(&VerificationId("vr-ghost".to_string()), &admin())
        .expect("tolerant no-op");

    assert!(matches!(outcome, ApproveOutcome::NotFound));
    assert!(audit.entries().is_empty());
}

#[test]
fn approve_blocks_when_activation_cannot_provision() {
    let registry = Arc::new(InMemoryVerificationRegistry::default());
    let directory = Arc::new(FlakyDirectory {
        fail_creates: true,
        ..FlakyDirectory::default()
    });
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = VerificationService::new(registry.clone(), directory, audit.clone());

    let seeded = registry
        .create(pending_record("seed-1", "nobody@clinic.example"))
        .expect("seed record");

    match service.approve(&seeded.id, &admin()) {
        Err(WorkflowError::Linkage(_)) => {}
        other => panic!("expected linkage error, got {other:?}"),
    }

    let stored = registry
        .find(&seeded.id)
        .expect("find")
        .expect("record kept");
    assert_eq!(
        stored.status,
        VerificationStatus::Pending,
        "status must not flip without an active account"
    );
    assert!(audit.entries().is_empty());
}

#[test]
fn reject_leaves_account_untouched() {
    let (service, registry, directory, audit) = build_service();
    let pending = service.apply(application()).expect("application accepted");

    let outcome = service.reject(&pending.id, &admin()).expect("reject runs");

    let RejectOutcome::Rejected { record, .. } = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(record.status, VerificationStatus::Rejected);

    let account = directory
        .find_by_email("jane@inst.edu")
        .expect("lookup")
        .expect("account survives rejection");
    assert!(!account.is_active, "rejection never mutates is_active");

    let stored = registry
        .find(&record.id)
        .expect("find")
        .expect("record persisted");
    assert_eq!(stored.status, VerificationStatus::Rejected);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::VerificationRejected);
}

#[test]
fn reject_missing_record_mutates_nothing_and_audits_nothing() {
    let (service, registry, _directory, audit) = build_service();

    let outcome = service
        .reject(&VerificationId("vr-ghost".to_string()), &admin())
        .expect("tolerant no-op");

    assert!(matches!(outcome, RejectOutcome::NotFound));
    assert!(registry.list(None).expect("list").is_empty());
    assert!(audit.entries().is_empty());
}

#[test]
fn admin_create_provisions_account_with_generated_credential() {
    let (service, registry, directory, audit) = build_service();

    let creation = service
        .create_by_admin(admin_request("marcus@riverside.example"), &admin())
        .expect("admin create runs");

    assert_eq!(creation.record.status, VerificationStatus::Verified);
    let activation = creation.activation.expect("linkage succeeds");
    let Activation::Created {
        account_id,
        credential,
    } = activation
    else {
        panic!("expected a provisioned account");
    };
    assert!(!credential.reveal().is_empty());

    assert_eq!(creation.record.counselor_account_id, Some(account_id.clone()));
    let account = directory
        .find_by_id(&account_id)
        .expect("lookup")
        .expect("account exists");
    assert!(account.is_active);
    assert_eq!(
        directory.roles(&account_id).expect("roles"),
        vec![Role::Counselor]
    );

    let stored = registry
        .find(&creation.record.id)
        .expect("find")
        .expect("record persisted");
    assert_eq!(stored.counselor_account_id, Some(account_id));

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::VerificationCreated);
    assert_eq!(entries[0].performed_by, "lead@console.local");
}

#[test]
fn admin_create_reports_linkage_failure_without_rollback() {
    let registry = Arc::new(InMemoryVerificationRegistry::default());
    let directory = Arc::new(FlakyDirectory {
        fail_creates: true,
        ..FlakyDirectory::default()
    });
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = VerificationService::new(registry.clone(), directory, audit.clone());

    let creation = service
        .create_by_admin(admin_request("marcus@riverside.example"), &admin())
        .expect("creation itself succeeds");

    assert!(creation.activation.is_err(), "linkage failure is reported");
    assert_eq!(creation.record.status, VerificationStatus::Verified);
    assert_eq!(creation.record.counselor_account_id, None);

    let stored = registry
        .find(&creation.record.id)
        .expect("find")
        .expect("record stays persisted");
    assert_eq!(stored.status, VerificationStatus::Verified);
    assert_eq!(stored.counselor_account_id, None);

    assert_eq!(audit.entries().len(), 1, "the action still audits");
}

#[test]
fn admin_create_backfills_existing_inactive_account() {
    let (service, _registry, directory, _audit) = build_service();
    let existing = directory
        .create(
            NewAccount {
                email: "marcus@riverside.example".to_string(),
                full_name: "Marcus Bell".to_string(),
                is_active: false,
            },
            "prior-pass",
        )
        .expect("existing account");

    let creation = service
        .create_by_admin(admin_request("marcus@riverside.example"), &admin())
        .expect("admin create runs");

    let activation = creation.activation.expect("linkage succeeds");
    assert_eq!(
        activation,
        Activation::Existing {
            account_id: existing.id.clone(),
            was_active: false
        }
    );
    assert_eq!(creation.record.counselor_account_id, Some(existing.id.clone()));

    let account = directory
        .find_by_id(&existing.id)
        .expect("lookup")
        .expect("account exists");
    assert!(account.is_active, "activation flips the inactive account");
}

#[test]
fn activation_is_idempotent_across_records_for_one_email() {
    let (service, _registry, directory, _audit) = build_service();

    let first = service
        .create_by_admin(admin_request("marcus@riverside.example"), &admin())
        .expect("first create");
    let account_after_first = directory
        .find_by_email("marcus@riverside.example")
        .expect("lookup")
        .expect("account exists");

    let second = service
        .create_by_admin(admin_request("marcus@riverside.example"), &admin())
        .expect("second create");
    let account_after_second = directory
        .find_by_email("marcus@riverside.example")
        .expect("lookup")
        .expect("account exists");

    assert_eq!(account_after_first, account_after_second);
    assert_eq!(directory.list().expect("list").len(), 1);

    let first_id = first.activation.expect("first linkage").account_id().clone();
    let second_activation = second.activation.expect("second linkage");
    assert_eq!(
        second_activation,
        Activation::Existing {
            account_id: first_id,
            was_active: true
        }
    );
}

#[test]
fn edit_override_bypasses_transition_rules() {
    let (service, registry, _directory, _audit) = build_service();
    let pending = service.apply(application()).expect("application accepted");
    service.reject(&pending.id, &admin()).expect("reject");

    let reopened = service
        .edit_override(
            &pending.id,
            VerificationOverride {
                counselor_account_id: pending.counselor_account_id.clone(),
                counselor_name: pending.counselor_name.clone(),
                professional_affiliation: "Corrected Affiliation".to_string(),
                institutional_email: pending.institutional_email.clone(),
                status: VerificationStatus::Pending,
                request_date: pending.request_date,
            },
        )
        .expect("override runs");

    assert_eq!(reopened.status, VerificationStatus::Pending);
    assert_eq!(reopened.professional_affiliation, "Corrected Affiliation");

    let stored = registry
        .find(&pending.id)
        .expect("find")
        .expect("record persisted");
    assert_eq!(stored.status, VerificationStatus::Pending);

    // The reopened record moves through the guarded machine again.
    let outcome = service.approve(&pending.id, &admin()).expect("approve");
    assert!(matches!(outcome, ApproveOutcome::Approved { .. }));
}

#[test]
fn edit_override_missing_record_is_an_error() {
    let (service, _registry, _directory, _audit) = build_service();

    let result = service.edit_override(
        &VerificationId("vr-ghost".to_string()),
        VerificationOverride {
            counselor_account_id: None,
            counselor_name: "Ghost".to_string(),
            professional_affiliation: "Nowhere".to_string(),
            institutional_email: "ghost@clinic.example".to_string(),
            status: VerificationStatus::Pending,
            request_date: chrono::Utc::now(),
        },
    );

    assert!(matches!(result, Err(WorkflowError::RecordNotFound)));
}

#[test]
fn delete_removes_record_audits_and_spares_the_account() {
    let (service, registry, directory, audit) = build_service();
    let pending = service.apply(application()).expect("application accepted");

    let outcome = service.delete(&pending.id, &admin()).expect("delete runs");

    assert!(matches!(outcome, DeleteOutcome::Deleted { .. }));
    assert!(registry.find(&pending.id).expect("find").is_none());
    assert!(
        directory
            .find_by_email("jane@inst.edu")
            .expect("lookup")
            .is_some(),
        "deleting a record never touches the account"
    );

    let codes = audit_codes(&audit);
    assert_eq!(codes, vec![AuditAction::VerificationDeleted]);
}

#[test]
fn delete_missing_record_is_tolerated_without_audit() {
    let (service, _registry, _directory, audit) = build_service();

    let outcome = service
        .delete(&VerificationId("vr-ghost".to_string()), &admin())
        .expect("tolerant no-op");

    assert!(matches!(outcome, DeleteOutcome::NotFound));
    assert!(audit.entries().is_empty());
}

#[test]
fn audit_failure_keeps_the_committed_action_detectable() {
    let registry = Arc::new(InMemoryVerificationRegistry::default());
    let directory = Arc::new(InMemoryAccountDirectory::default());
    let audit = Arc::new(FailingAuditSink);
    let service = VerificationService::new(registry.clone(), directory, audit);

    let pending = service.apply(application()).expect("application accepted");
    let outcome = service.approve(&pending.id, &admin()).expect("approve runs");

    let ApproveOutcome::Approved { record, audit, .. } = outcome else {
        panic!("expected approval");
    };
    assert!(!audit.is_recorded(), "omission must be visible to the caller");

    let stored = registry
        .find(&record.id)
        .expect("find")
        .expect("record persisted");
    assert_eq!(
        stored.status,
        VerificationStatus::Verified,
        "the mutation is already committed"
    );
}

#[test]
fn list_orders_newest_first_and_filters_by_status() {
    let (service, registry, _directory, _audit) = build_service();

    let mut older = pending_record("seed-old", "old@clinic.example");
    older.request_date = chrono::Utc::now() - chrono::Duration::hours(2);
    registry.create(older).expect("seed older");

    let newer = service.apply(application()).expect("application accepted");
    service.approve(&newer.id, &admin()).expect("approve newer");

    let all = service.list(None).expect("list all");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id, "newest first");

    let verified = service
        .list(Some(VerificationStatus::Verified))
        .expect("list verified");
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].id, newer.id);

    let pending = service
        .list(Some(VerificationStatus::Pending))
        .expect("list pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.0, "seed-old");
}
