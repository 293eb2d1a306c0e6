use super::principal::DocumentContext;
use super::AccessLevel;

/// Declarative document filter. It describes which documents match without
/// loading any of them: the query engine renders it to SQL, and `matches`
/// evaluates the same expression against a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    AccessLevel(AccessLevel),
    Department(i64),
    UploadedBy(i64),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction; `All` is the identity.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, rhs) => rhs,
            (lhs, Predicate::All) => lhs,
            (Predicate::And(mut lhs), Predicate::And(rhs)) => {
                lhs.extend(rhs);
                Predicate::And(lhs)
            }
            (Predicate::And(mut lhs), rhs) => {
                lhs.push(rhs);
                Predicate::And(lhs)
            }
            (lhs, rhs) => Predicate::And(vec![lhs, rhs]),
        }
    }

    /// Disjunction; `All` absorbs.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, _) | (_, Predicate::All) => Predicate::All,
            (Predicate::Or(mut lhs), Predicate::Or(rhs)) => {
                lhs.extend(rhs);
                Predicate::Or(lhs)
            }
            (Predicate::Or(mut lhs), rhs) => {
                lhs.push(rhs);
                Predicate::Or(lhs)
            }
            (lhs, rhs) => Predicate::Or(vec![lhs, rhs]),
        }
    }

    pub fn matches(&self, doc: &DocumentContext) -> bool {
        match self {
            Predicate::All => true,
            Predicate::AccessLevel(level) => doc.access_level == *level,
            Predicate::Department(id) => doc.department_id == *id,
            Predicate::UploadedBy(id) => doc.uploaded_by == *id,
            Predicate::And(parts) => parts.iter().all(|p| p.matches(doc)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(doc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(access_level: AccessLevel, department_id: i64, uploaded_by: i64) -> DocumentContext {
        DocumentContext {
            document_id: 1,
            department_id,
            uploaded_by,
            access_level,
        }
    }

    #[test]
    fn all_is_identity_for_and() {
        let p = Predicate::Department(3);
        assert_eq!(Predicate::All.and(p.clone()), p);
        assert_eq!(p.clone().and(Predicate::All), p);
    }

    #[test]
    fn all_absorbs_or() {
        assert_eq!(Predicate::Department(3).or(Predicate::All), Predicate::All);
    }

    #[test]
    fn nested_conjunctions_flatten() {
        let p = Predicate::Department(1)
            .and(Predicate::UploadedBy(2))
            .and(Predicate::AccessLevel(AccessLevel::Private));
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::Department(1),
                Predicate::UploadedBy(2),
                Predicate::AccessLevel(AccessLevel::Private),
            ])
        );
    }

    #[test]
    fn matches_evaluates_tree() {
        let p = Predicate::AccessLevel(AccessLevel::Public)
            .or(Predicate::AccessLevel(AccessLevel::Department).and(Predicate::Department(2)));

        assert!(p.matches(&doc(AccessLevel::Public, 9, 1)));
        assert!(p.matches(&doc(AccessLevel::Department, 2, 1)));
        assert!(!p.matches(&doc(AccessLevel::Department, 3, 1)));
        assert!(!p.matches(&doc(AccessLevel::Private, 2, 1)));
    }

    #[test]
    fn empty_disjunction_matches_nothing() {
        assert!(!Predicate::Or(Vec::new()).matches(&doc(AccessLevel::Public, 1, 1)));
        assert!(Predicate::And(Vec::new()).matches(&doc(AccessLevel::Public, 1, 1)));
    }
}
