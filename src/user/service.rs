use std::sync::Arc;

use validator::Validate;

use crate::error::{Result, ServerError};
use crate::user::{NewUser, User, UserRepository};

/// Registration orchestration over a [`UserRepository`].
#[derive(Clone)]
pub struct RegistrationService {
    repo: Arc<dyn UserRepository>,
}

impl RegistrationService {
    /// Create a new [`RegistrationService`].
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Register a new user unless the email is already taken.
    ///
    /// The lookup answers the common case without a write. Registrations
    /// racing past it are still settled by the repository's atomic insert.
    pub async fn register(&self, user: NewUser) -> Result<User> {
        user.validate()?;

        if self.repo.find_by_email(&user.email).await?.is_some() {
            tracing::debug!(email = %user.email, "email already registered");
            return Err(ServerError::DuplicateEmail);
        }

        let user = self.repo.create(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");
        metrics::counter!("users_registered_total").increment(1);

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::MemoryUserRepository;

    fn service() -> (RegistrationService, MemoryUserRepository) {
        let repo = MemoryUserRepository::new();
        (RegistrationService::new(Arc::new(repo.clone())), repo)
    }

    #[tokio::test]
    async fn test_register_fresh_email() {
        let (service, repo) = service();

        let user = service
            .register(NewUser::new("Ann", "a@x.com", "p"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.name, "Ann");

        let all = repo.find_all().await.unwrap();
        assert_eq!(all, vec![user]);
    }

    #[tokio::test]
    async fn test_register_taken_email() {
        let (service, repo) = service();
        service
            .register(NewUser::new("Ann", "a@x.com", "p"))
            .await
            .unwrap();

        let err = service
            .register(NewUser::new("Ann bis", "a@x.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateEmail));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_missing_field() {
        let (service, repo) = service();

        let err = service
            .register(NewUser::new("", "a@x.com", "p"))
            .await
            .unwrap_err();
        match err {
            ServerError::Validation(errors) => {
                assert!(errors.field_errors().contains_key("name"))
            },
            err => panic!("unexpected error: {err}"),
        }
        assert!(repo.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_store_one_user() {
        let (service, repo) = service();

        let attempts: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .register(NewUser::new(format!("Ann {i}"), "a@x.com", "p"))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(ServerError::DuplicateEmail) => (),
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len().await, 1);
    }
}
