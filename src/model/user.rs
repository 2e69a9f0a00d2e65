use serde::{Deserialize, Serialize};

/// The signed-in account as reported by `/auth/users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name, self.surname);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Registration body. The backend names the plain password `password_hash`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    #[serde(rename = "password_hash")]
    pub password: String,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub phone_number: Option<String>,
}

/// Profile update body; the backend requires every field
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub surname: String,
    pub username: String,
    pub phone_number: String,
    pub email: String,
}

impl ProfileUpdate {
    pub fn from_user(user: &User) -> Self {
        ProfileUpdate {
            name: user.name.clone(),
            surname: user.surname.clone(),
            username: user.username.clone(),
            phone_number: user.phone_number.clone().unwrap_or_default(),
            email: user.email.clone(),
        }
    }
}

/// Token pair returned by the login endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email() {
        let user: User = serde_json::from_str(r#"{"id":1,"email":"a@b.c"}"#).unwrap();
        assert_eq!(user.display_name(), "a@b.c");

        let user: User =
            serde_json::from_str(r#"{"id":1,"email":"a@b.c","name":"Ada","surname":"Lovelace"}"#)
                .unwrap();
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn registration_renames_password_field() {
        let reg = Registration {
            email: "a@b.c".into(),
            password: "secret1".into(),
            name: "Ada".into(),
            surname: "Lovelace".into(),
            username: "adalove".into(),
            phone_number: None,
        };
        let body = serde_json::to_value(&reg).unwrap();
        assert_eq!(body["password_hash"], "secret1");
        assert!(body.get("password").is_none());
        assert!(body["phone_number"].is_null());
    }
}
