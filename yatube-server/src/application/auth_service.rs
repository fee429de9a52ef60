use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::validation::{FormErrors, REQUIRED};
use crate::domain::{error::DomainError, user::User};
use crate::infrastructure::security::{JwtKeys, hash_password, verify_password};

const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

/// Sign-up input, already trimmed by the form layer.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepository>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))
    }

    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<User, DomainError> {
        self.create_user(registration, false).await
    }

    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn create_superuser(&self, registration: Registration) -> Result<User, DomainError> {
        self.create_user(registration, true).await
    }

    /// Checks credentials and issues a session token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String), DomainError> {
        let user = self
            .repo
            .find_by_username(username.trim())
            .await?
            .ok_or(DomainError::Unauthorized)?;

        let valid = verify_password(password, &user.password_hash)
            .map_err(|_| DomainError::Unauthorized)?;
        if !valid {
            return Err(DomainError::Unauthorized);
        }

        let token = self.issue_token(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    pub fn issue_token(&self, user: &User) -> Result<String, DomainError> {
        self.keys
            .generate_token(user.id)
            .map_err(|err| DomainError::Internal(err.to_string()))
    }

    async fn create_user(&self, registration: Registration, is_staff: bool) -> Result<User, DomainError> {
        validate_registration(&registration).map_err(DomainError::Validation)?;

        let hash = hash_password(&registration.password)
            .map_err(|err| DomainError::Internal(err.to_string()))?;
        let mut user = User::new(
            registration.username,
            registration.email.to_lowercase(),
            hash,
        );
        user.first_name = registration.first_name;
        user.last_name = registration.last_name;
        user.is_staff = is_staff;

        self.repo.create(user).await.map_err(|err| match err {
            DomainError::UserAlreadyExists(_) => DomainError::Validation(FormErrors::single(
                "username",
                "A user with that username already exists.",
            )),
            other => other,
        })
    }
}

fn validate_registration(registration: &Registration) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();

    let username = registration.username.as_str();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if username.chars().count() > USERNAME_MAX_LEN {
        errors.add(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_LEN} characters."),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = registration.email.as_str();
    if !email.is_empty() && !is_plausible_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    let password = registration.password.as_str();
    if password.is_empty() {
        errors.add("password", REQUIRED);
    } else {
        if password.chars().count() < PASSWORD_MIN_LEN {
            errors.add(
                "password",
                format!("This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."),
            );
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password", "This password is entirely numeric.");
        }
        if password.eq_ignore_ascii_case(username) {
            errors.add("password", "The password is too similar to the username.");
        }
    }
    if registration.password != registration.password_confirmation {
        errors.add("password_confirmation", "The two password fields didn't match.");
    }

    errors.into_result()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
