//! Renders visibility predicates into SQL over the `documents doc` alias.

use sqlx::{QueryBuilder, Sqlite};

use crate::authz::Predicate;

/// Appends `predicate` as a parenthesised boolean expression with bound values.
pub fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::All => {
            qb.push("1 = 1");
        }
        Predicate::AccessLevel(level) => {
            qb.push("doc.access_level = ").push_bind(level.as_str());
        }
        Predicate::Department(id) => {
            qb.push("doc.department_id = ").push_bind(*id);
        }
        Predicate::UploadedBy(id) => {
            qb.push("doc.uploaded_by = ").push_bind(*id);
        }
        Predicate::And(parts) => push_joined(qb, parts, " AND ", "1 = 1"),
        Predicate::Or(parts) => push_joined(qb, parts, " OR ", "0 = 1"),
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Sqlite>, parts: &[Predicate], separator: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            qb.push(separator);
        }
        qb.push("(");
        push_predicate(qb, part);
        qb.push(")");
    }
    qb.push(")");
}
