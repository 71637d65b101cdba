use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Patient,
    Doctor,
    Admin,
}

/// The identity returned by a successful login or session lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub user_type: UserType,
    pub email: Option<String>,
    pub name: String,
}

impl AuthenticatedUser {
    pub fn is_patient(&self) -> bool {
        self.user_type == UserType::Patient
    }

    /// Email and display name are both needed before a payment can be attempted.
    pub fn contact(&self) -> Option<(&str, &str)> {
        match self.email.as_deref() {
            Some(email) if !email.is_empty() && !self.name.trim().is_empty() => {
                Some((email, self.name.as_str()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "snake_case")]
pub enum Credentials {
    Patient {
        email: String,
        password: String,
    },
    Doctor {
        professional_number: String,
        password: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_requires_email_and_name() {
        let mut user = AuthenticatedUser {
            user_id: 3,
            user_type: UserType::Patient,
            email: Some("amina@example.com".to_string()),
            name: "Amina Benali".to_string(),
        };
        assert_eq!(user.contact(), Some(("amina@example.com", "Amina Benali")));

        user.name = "  ".to_string();
        assert_eq!(user.contact(), None);

        user.name = "Amina".to_string();
        user.email = None;
        assert_eq!(user.contact(), None);
    }
}
