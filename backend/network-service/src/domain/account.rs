use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "private" => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "faculty" => Role::Faculty,
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }
}

/// One side of a pair relation, as seen from the owning account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Connected,
    /// Owner sent a pending request to the other account
    Sent,
    /// Owner received a pending request from the other account
    Received,
}

impl Relation {
    /// The relation the other account must hold for the pair to be consistent
    pub fn mirror(self) -> Relation {
        match self {
            Relation::Connected => Relation::Connected,
            Relation::Sent => Relation::Received,
            Relation::Received => Relation::Sent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Connected => "connected",
            Relation::Sent => "sent",
            Relation::Received => "received",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connected" => Some(Relation::Connected),
            "sent" => Some(Relation::Sent),
            "received" => Some(Relation::Received),
            _ => None,
        }
    }
}

/// Relation sets of one account. An id lives in at most one set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    pub connections: HashSet<Uuid>,
    pub sent_requests: HashSet<Uuid>,
    pub received_requests: HashSet<Uuid>,
}

impl Relations {
    pub fn relation_to(&self, other: Uuid) -> Option<Relation> {
        if self.connections.contains(&other) {
            Some(Relation::Connected)
        } else if self.sent_requests.contains(&other) {
            Some(Relation::Sent)
        } else if self.received_requests.contains(&other) {
            Some(Relation::Received)
        } else {
            None
        }
    }

    /// Replace whatever relation is held towards `other`
    pub fn set(&mut self, other: Uuid, relation: Option<Relation>) {
        self.connections.remove(&other);
        self.sent_requests.remove(&other);
        self.received_requests.remove(&other);

        match relation {
            Some(Relation::Connected) => {
                self.connections.insert(other);
            }
            Some(Relation::Sent) => {
                self.sent_requests.insert(other);
            }
            Some(Relation::Received) => {
                self.received_requests.insert(other);
            }
            None => {}
        }
    }

    pub fn ids(&self, relation: Relation) -> &HashSet<Uuid> {
        match relation {
            Relation::Connected => &self.connections,
            Relation::Sent => &self.sent_requests,
            Relation::Received => &self.received_requests,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_photo: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub faculty_department: Option<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub relations: Relations,
}

impl Account {
    pub fn new(name: impl Into<String>, email: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            profile_photo: None,
            role: Role::Student,
            department: None,
            faculty_department: None,
            visibility,
            created_at: Utc::now(),
            relations: Relations::default(),
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            profile_photo: self.profile_photo.clone(),
        }
    }

    pub fn author_summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            name: self.name.clone(),
            profile_photo: self.profile_photo.clone(),
            role: self.role.as_str().to_string(),
            department: display_department(
                self.department.clone(),
                self.faculty_department.clone(),
            ),
            is_private: self.visibility == Visibility::Private,
        }
    }
}

/// Faculty accounts often carry only the faculty department
pub fn display_department(
    department: Option<String>,
    faculty_department: Option<String>,
) -> Option<String> {
    department.filter(|d| !d.is_empty()).or(faculty_department)
}

/// Account fields returned by the connection list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_photo: Option<String>,
}

/// Author fields embedded next to each post in feed responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: Option<String>,
    pub role: String,
    pub department: Option<String>,
    pub is_private: bool,
}

impl AuthorSummary {
    /// Stand-in for posts whose author record no longer exists
    pub fn unknown(author_id: Uuid) -> Self {
        Self {
            id: author_id,
            name: "Unknown User".to_string(),
            profile_photo: None,
            role: "user".to_string(),
            department: Some(String::new()),
            is_private: true,
        }
    }

    pub fn visibility(&self) -> Visibility {
        if self.is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_stay_disjoint() {
        let other = Uuid::new_v4();
        let mut relations = Relations::default();

        relations.set(other, Some(Relation::Sent));
        relations.set(other, Some(Relation::Connected));

        assert_eq!(relations.relation_to(other), Some(Relation::Connected));
        assert!(relations.sent_requests.is_empty());
        assert!(relations.received_requests.is_empty());

        relations.set(other, None);
        assert_eq!(relations.relation_to(other), None);
    }

    #[test]
    fn test_mirror_relation() {
        assert_eq!(Relation::Sent.mirror(), Relation::Received);
        assert_eq!(Relation::Received.mirror(), Relation::Sent);
        assert_eq!(Relation::Connected.mirror(), Relation::Connected);
    }

    #[test]
    fn test_author_summary_falls_back_to_faculty_department() {
        let mut account = Account::new("Dr. Ada", "ada@campus.edu", Visibility::Public);
        account.role = Role::Faculty;
        account.faculty_department = Some("Mathematics".to_string());

        let author = account.author_summary();
        assert_eq!(author.department.as_deref(), Some("Mathematics"));
        assert_eq!(author.role, "faculty");

        account.department = Some("Physics".to_string());
        assert_eq!(account.author_summary().department.as_deref(), Some("Physics"));
    }

    #[test]
    fn test_unknown_author_sentinel() {
        let author = AuthorSummary::unknown(Uuid::new_v4());
        assert_eq!(author.name, "Unknown User");
        assert_eq!(author.role, "user");
        assert_eq!(author.department.as_deref(), Some(""));
        assert_eq!(author.visibility(), Visibility::Private);
    }
}
