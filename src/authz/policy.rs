//! Document access rules.
//!
//! Every call site (listing, show, dashboard, download, mutations) goes
//! through these functions; none of them re-derive visibility on their own.

use super::predicate::Predicate;
use super::principal::{DocumentContext, Principal};
use super::role::Role;
use super::AccessLevel;

pub fn can_view(principal: &Principal, doc: &DocumentContext) -> bool {
    let allowed = principal.is_admin()
        || match doc.access_level {
            AccessLevel::Public => true,
            AccessLevel::Department => doc.department_id == principal.department_id,
            AccessLevel::Private => doc.uploaded_by == principal.user_id,
        };

    log_decision(principal, doc, "view", allowed);
    allowed
}

pub fn can_edit(principal: &Principal, doc: &DocumentContext) -> bool {
    let allowed = owns_or_admin(principal, doc);
    log_decision(principal, doc, "edit", allowed);
    allowed
}

pub fn can_delete(principal: &Principal, doc: &DocumentContext) -> bool {
    let allowed = owns_or_admin(principal, doc);
    log_decision(principal, doc, "delete", allowed);
    allowed
}

pub fn can_upload(principal: &Principal) -> bool {
    matches!(principal.effective_role(), Role::Admin | Role::Manager)
}

/// The set of documents `principal` may see in listings and dashboard counts.
///
/// Managers reach every document of their own department here, private ones
/// included, which is wider than `can_view` grants for a single document.
pub fn visibility_predicate(principal: &Principal) -> Predicate {
    match principal.effective_role() {
        Role::Admin => Predicate::All,
        Role::Manager => {
            Predicate::AccessLevel(AccessLevel::Public).or(Predicate::Department(principal.department_id))
        }
        Role::Employee => Predicate::AccessLevel(AccessLevel::Public).or(
            Predicate::AccessLevel(AccessLevel::Department).and(Predicate::Department(principal.department_id)),
        ),
    }
}

fn owns_or_admin(principal: &Principal, doc: &DocumentContext) -> bool {
    match principal.effective_role() {
        Role::Admin => true,
        Role::Manager => doc.uploaded_by == principal.user_id,
        Role::Employee => false,
    }
}

fn log_decision(principal: &Principal, doc: &DocumentContext, action: &'static str, allowed: bool) {
    tracing::debug!(
        user_id = principal.user_id,
        role = %principal.effective_role(),
        document_id = doc.document_id,
        action,
        allowed,
        "document access decision"
    );
}
