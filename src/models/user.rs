use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::display_name;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    /// Either an embedded profile or a bare reference id, depending on the
    /// endpoint that produced the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_profile: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn full_name(&self) -> String {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }

    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    pub fn has_driver_profile(&self) -> bool {
        matches!(&self.driver_profile, Some(value) if !value.is_null())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Session {
    /// A record without a role gets the least privileged one.
    pub fn role(&self) -> Role {
        self.user.role.unwrap_or(Role::User)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_round_trips_unknown_fields() {
        let raw = json!({
            "_id": "u1",
            "firstName": "Ada",
            "lastName": "Obi",
            "email": "ada@example.com",
            "role": "driver",
            "isVerified": true
        });

        let user: User = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.role, Some(Role::Driver));
        assert_eq!(user.full_name(), "Ada Obi");
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }

    #[test]
    fn driver_profile_reference_counts_as_present() {
        let user: User = serde_json::from_value(json!({
            "_id": "u2",
            "email": "b@example.com",
            "role": "driver",
            "driverProfile": "p-77"
        }))
        .unwrap();
        assert!(user.has_driver_profile());
        assert_eq!(user.full_name(), "");
    }

    #[test]
    fn session_without_role_is_treated_as_plain_user() {
        let session: Session = serde_json::from_value(json!({
            "user": { "_id": "u3", "firstName": "Ife" }
        }))
        .unwrap();
        assert_eq!(session.role(), Role::User);
        assert_eq!(session.user.email(), "");
        assert_eq!(session.user.full_name(), "Ife");
        assert_eq!(
            serde_json::to_value(&session.user).unwrap(),
            json!({ "_id": "u3", "firstName": "Ife" })
        );
    }
}
