//! Role × resource × action authorization table.
//!
//! Every guarded route consults [`authorize`]; a grant comes back as a
//! [`Scope`] that the handler applies to its queries and mutations.

use uuid::Uuid;

use super::Principal;
use crate::types::{Action, Role};

/// Things a route operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    School,
    Classroom,
    Student,
    Administrator,
    Profile,
    Session,
}

/// How far a grant extends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    Global,
    OwnSchool,
    OwnRecord,
}

/// Concrete restriction handed to a handler after a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    School(Uuid),
    Own(Uuid),
}

impl Scope {
    /// School restriction for store calls: `Some(None)` is unrestricted,
    /// `None` means the grant does not cover school records at all
    pub fn school_bound(&self) -> Option<Option<Uuid>> {
        match self {
            Scope::All => Some(None),
            Scope::School(id) => Some(Some(*id)),
            Scope::Own(_) => None,
        }
    }

    /// Whether a record owned by `school` is visible in this scope
    pub fn covers_school(&self, school: Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::School(id) => *id == school,
            Scope::Own(_) => false,
        }
    }
}

struct Rule {
    role: Role,
    resource: Resource,
    actions: &'static [Action],
    reach: Reach,
}

const CRUD: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];
const MANAGE: &[Action] = &[Action::Read, Action::Update, Action::Delete];

#[rustfmt::skip]
const RULES: &[Rule] = &[
    Rule { role: Role::Superadmin, resource: Resource::School, actions: CRUD, reach: Reach::Global },
    Rule { role: Role::Superadmin, resource: Resource::Classroom, actions: MANAGE, reach: Reach::Global },
    Rule { role: Role::Superadmin, resource: Resource::Student, actions: MANAGE, reach: Reach::Global },
    Rule { role: Role::Superadmin, resource: Resource::Administrator, actions: &[Action::Create], reach: Reach::Global },
    Rule { role: Role::Admin, resource: Resource::Classroom, actions: CRUD, reach: Reach::OwnSchool },
    Rule { role: Role::Admin, resource: Resource::Student, actions: CRUD, reach: Reach::OwnSchool },
    Rule { role: Role::Admin, resource: Resource::Administrator, actions: &[Action::Create], reach: Reach::OwnSchool },
    Rule { role: Role::Superadmin, resource: Resource::Profile, actions: &[Action::Update], reach: Reach::OwnRecord },
    Rule { role: Role::Admin, resource: Resource::Profile, actions: &[Action::Update], reach: Reach::OwnRecord },
    Rule { role: Role::User, resource: Resource::Profile, actions: &[Action::Update], reach: Reach::OwnRecord },
    Rule { role: Role::Superadmin, resource: Resource::Session, actions: &[Action::Read, Action::Delete], reach: Reach::OwnRecord },
    Rule { role: Role::Admin, resource: Resource::Session, actions: &[Action::Read, Action::Delete], reach: Reach::OwnRecord },
    Rule { role: Role::User, resource: Resource::Session, actions: &[Action::Read, Action::Delete], reach: Reach::OwnRecord },
];

fn lookup(role: Role, resource: Resource, action: Action) -> Option<Reach> {
    RULES
        .iter()
        .find(|rule| {
            rule.role == role && rule.resource == resource && rule.actions.contains(&action)
        })
        .map(|rule| rule.reach)
}

/// Decide whether `principal` may perform `action` on `resource`.
///
/// Returns None on denial; an admin without a school is denied anything
/// school-scoped.
pub fn authorize(principal: &Principal, resource: Resource, action: Action) -> Option<Scope> {
    match lookup(principal.role, resource, action)? {
        Reach::Global => Some(Scope::All),
        Reach::OwnSchool => principal.school.map(Scope::School),
        Reach::OwnRecord => Some(Scope::Own(principal.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(role: Role, school: Option<Uuid>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "someone@school.edu".to_string(),
            role,
            school,
        }
    }

    #[test]
    fn only_superadmin_manages_schools() {
        let school = Some(Uuid::new_v4());
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            let root = who(Role::Superadmin, None);
            assert_eq!(authorize(&root, Resource::School, action), Some(Scope::All));
            assert_eq!(authorize(&who(Role::Admin, school), Resource::School, action), None);
            assert_eq!(authorize(&who(Role::User, school), Resource::School, action), None);
        }
    }

    #[test]
    fn admins_are_scoped_to_their_school() {
        let school = Uuid::new_v4();
        let admin = who(Role::Admin, Some(school));
        for resource in [Resource::Classroom, Resource::Student] {
            for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
                assert_eq!(authorize(&admin, resource, action), Some(Scope::School(school)));
            }
        }
    }

    #[test]
    fn superadmin_cannot_create_classrooms_or_students() {
        let root = who(Role::Superadmin, None);
        assert_eq!(authorize(&root, Resource::Classroom, Action::Create), None);
        assert_eq!(authorize(&root, Resource::Student, Action::Create), None);
        assert_eq!(authorize(&root, Resource::Student, Action::Read), Some(Scope::All));
        assert_eq!(authorize(&root, Resource::Classroom, Action::Delete), Some(Scope::All));
    }

    #[test]
    fn admin_without_school_is_denied() {
        let orphan = who(Role::Admin, None);
        assert_eq!(authorize(&orphan, Resource::Classroom, Action::Read), None);
        assert_eq!(authorize(&orphan, Resource::Administrator, Action::Create), None);
    }

    #[test]
    fn plain_users_only_touch_their_own_records() {
        let user = who(Role::User, Some(Uuid::new_v4()));
        assert_eq!(authorize(&user, Resource::Profile, Action::Update), Some(Scope::Own(user.id)));
        assert_eq!(authorize(&user, Resource::Session, Action::Read), Some(Scope::Own(user.id)));
        assert_eq!(authorize(&user, Resource::Student, Action::Read), None);
        assert_eq!(authorize(&user, Resource::Administrator, Action::Create), None);
    }

    #[test]
    fn scope_visibility() {
        let school = Uuid::new_v4();
        assert!(Scope::All.covers_school(school));
        assert!(Scope::School(school).covers_school(school));
        assert!(!Scope::School(Uuid::new_v4()).covers_school(school));
        assert_eq!(Scope::School(school).school_bound(), Some(Some(school)));
        assert_eq!(Scope::All.school_bound(), Some(None));
        assert_eq!(Scope::Own(school).school_bound(), None);
    }
}
