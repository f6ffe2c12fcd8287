//! Property tests for the materialized permission view.
//!
//! Random sequences of role, grant and explicit-permission changes are applied
//! to the engine and to a plain in-test model. After every step each
//! subject's materialized rows must equal the union of its roles' grants and
//! its explicit grants, with the origin flag set exactly on the explicit ones.

use platform_access::{MemoryStore, Rbac, RbacConfig, SubjectId};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const ROLES: [&str; 3] = ["author", "editor", "moderator"];
const PERMISSIONS: [&str; 5] = ["a", "b", "c", "d", "e"];
const SUBJECTS: [&str; 2] = ["alice", "bob"];

#[derive(Debug, Clone)]
enum Op {
    AttachRole(usize, usize),
    DetachRole(usize, usize),
    AttachPermission(usize, usize),
    DetachPermission(usize, usize),
    GrantToRole(usize, usize),
    RevokeFromRole(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    let subject = 0..SUBJECTS.len();
    let role = 0..ROLES.len();
    let permission = 0..PERMISSIONS.len();
    prop_oneof![
        (subject.clone(), role.clone()).prop_map(|(s, r)| Op::AttachRole(s, r)),
        (subject.clone(), role.clone()).prop_map(|(s, r)| Op::DetachRole(s, r)),
        (subject.clone(), permission.clone()).prop_map(|(s, p)| Op::AttachPermission(s, p)),
        (subject, permission.clone()).prop_map(|(s, p)| Op::DetachPermission(s, p)),
        (role.clone(), permission.clone()).prop_map(|(r, p)| Op::GrantToRole(r, p)),
        (role, permission).prop_map(|(r, p)| Op::RevokeFromRole(r, p)),
    ]
}

/// What the view should contain, tracked without the engine.
#[derive(Default)]
struct Model {
    grants: BTreeMap<&'static str, BTreeSet<&'static str>>,
    roles: BTreeMap<&'static str, BTreeSet<&'static str>>,
    explicit: BTreeMap<&'static str, BTreeSet<&'static str>>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match *op {
            Op::AttachRole(s, r) => {
                self.roles.entry(SUBJECTS[s]).or_default().insert(ROLES[r]);
            }
            Op::DetachRole(s, r) => {
                self.roles.entry(SUBJECTS[s]).or_default().remove(ROLES[r]);
            }
            Op::AttachPermission(s, p) => {
                self.explicit.entry(SUBJECTS[s]).or_default().insert(PERMISSIONS[p]);
            }
            Op::DetachPermission(s, p) => {
                self.explicit.entry(SUBJECTS[s]).or_default().remove(PERMISSIONS[p]);
            }
            Op::GrantToRole(r, p) => {
                self.grants.entry(ROLES[r]).or_default().insert(PERMISSIONS[p]);
            }
            Op::RevokeFromRole(r, p) => {
                self.grants.entry(ROLES[r]).or_default().remove(PERMISSIONS[p]);
            }
        }
    }

    fn expected(&self, subject: &str) -> Vec<(String, bool)> {
        let explicit = self.explicit.get(subject).cloned().unwrap_or_default();
        let mut held: BTreeSet<&str> = explicit.clone();
        for role in self.roles.get(subject).into_iter().flatten() {
            held.extend(self.grants.get(role).into_iter().flatten());
        }

        held.into_iter()
            .map(|slug| (slug.to_string(), explicit.contains(slug)))
            .collect()
    }
}

async fn apply(rbac: &Rbac, op: &Op) {
    let subject = |s: usize| SubjectId::new(SUBJECTS[s]);
    match *op {
        Op::AttachRole(s, r) => {
            rbac.role_bindings().attach_role(&subject(s), ROLES[r]).await.unwrap();
        }
        Op::DetachRole(s, r) => {
            rbac.role_bindings().detach_role(&subject(s), ROLES[r]).await.unwrap();
        }
        Op::AttachPermission(s, p) => {
            rbac.permission_bindings()
                .attach_permission(&subject(s), PERMISSIONS[p])
                .await
                .unwrap();
        }
        Op::DetachPermission(s, p) => {
            rbac.permission_bindings()
                .detach_permission(&subject(s), PERMISSIONS[p])
                .await
                .unwrap();
        }
        Op::GrantToRole(r, p) => {
            rbac.catalog()
                .attach_role_permissions(ROLES[r], [PERMISSIONS[p]])
                .await
                .unwrap();
        }
        Op::RevokeFromRole(r, p) => {
            rbac.catalog()
                .detach_role_permissions(ROLES[r], [PERMISSIONS[p]])
                .await
                .unwrap();
        }
    }
}

async fn view(rbac: &Rbac, subject: &str) -> Vec<(String, bool)> {
    rbac.query()
        .get_permission_grants(&SubjectId::new(subject))
        .await
        .unwrap()
        .into_iter()
        .map(|grant| (grant.permission.slug, grant.added_on_subject))
        .collect()
}

async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let rbac = Rbac::new(Arc::new(MemoryStore::new()), RbacConfig::default()).unwrap();
    rbac.catalog().create_roles(ROLES).await.unwrap();
    rbac.catalog().create_permissions(PERMISSIONS).await.unwrap();

    let mut model = Model::default();
    for (step, op) in ops.iter().enumerate() {
        apply(&rbac, op).await;
        model.apply(op);

        for subject in SUBJECTS {
            prop_assert_eq!(
                view(&rbac, subject).await,
                model.expected(subject),
                "subject {} after step {} ({:?})",
                subject,
                step,
                op
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_view_matches_recomputation(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops))?;
    }
}
