//! Credential verification.
//!
//! Resolves an identifier to a user and checks the password. Unknown identifiers, missing
//! password hashes, wrong passwords and internal failures all come back as `None`, and an
//! unknown identifier still pays for one hash verification.

use std::sync::Arc;

use crate::{
    Error, LoginCredentials, User, UserId,
    crypto::PasswordVerifier,
    repositories::{PasswordRepository, UserRepository},
};

pub struct Authenticator<U: UserRepository, P: PasswordRepository> {
    users: Arc<U>,
    passwords: Arc<P>,
    verifier: Arc<dyn PasswordVerifier>,
}

impl<U: UserRepository, P: PasswordRepository> Authenticator<U, P> {
    pub fn new(users: Arc<U>, passwords: Arc<P>, verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            users,
            passwords,
            verifier,
        }
    }

    pub fn verifier(&self) -> &Arc<dyn PasswordVerifier> {
        &self.verifier
    }

    /// The user these credentials prove, or `None`.
    pub async fn authenticate(&self, credentials: &LoginCredentials) -> Option<User> {
        match self.try_authenticate(credentials).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, "Credential verification failed");
                None
            }
        }
    }

    /// The user an identifier names, without checking the password.
    ///
    /// Used to attach a user id to failed attempts so a lock covers every identifier of the
    /// account. Errors are logged and read as "no user".
    pub async fn resolve(&self, credentials: &LoginCredentials) -> Option<UserId> {
        match self.find_user(credentials).await {
            Ok(user) => user.map(|user| user.id),
            Err(e) => {
                tracing::error!(error = %e, "User lookup failed");
                None
            }
        }
    }

    async fn find_user(&self, credentials: &LoginCredentials) -> Result<Option<User>, Error> {
        if credentials.is_email_login() {
            self.users.find_by_email(credentials.identifier()).await
        } else {
            self.users.find_by_username(credentials.identifier()).await
        }
    }

    async fn try_authenticate(&self, credentials: &LoginCredentials) -> Result<Option<User>, Error> {
        let user = self.find_user(credentials).await?;

        let stored_hash = match &user {
            Some(user) => self.passwords.get_password_hash(&user.id).await?,
            None => None,
        };

        match (user, stored_hash) {
            (Some(user), Some(hash)) => {
                if self.verifier.verify(credentials.password(), &hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            _ => {
                self.verifier
                    .verify(credentials.password(), self.verifier.dummy_hash())?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{MockPasswordRepository, MockUserRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plain-text "hashes" so tests stay fast; counts every verification.
    #[derive(Default)]
    struct PlainVerifier {
        verifications: AtomicUsize,
    }

    impl PasswordVerifier for PlainVerifier {
        fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            Ok(hash == format!("plain:{password}"))
        }

        fn hash(&self, password: &str) -> Result<String, Error> {
            Ok(format!("plain:{password}"))
        }

        fn dummy_hash(&self) -> &str {
            "dummy"
        }
    }

    struct Harness {
        authenticator: Authenticator<MockUserRepository, MockPasswordRepository>,
        users: Arc<MockUserRepository>,
        verifier: Arc<PlainVerifier>,
    }

    async fn harness() -> Harness {
        let users = Arc::new(
            MockUserRepository::default().with_user("usr_carol", "carol", "carol@example.test"),
        );
        let passwords = Arc::new(MockPasswordRepository::default());
        passwords
            .set_password_hash(&crate::UserId::new("usr_carol"), "plain:correct horse")
            .await
            .unwrap();
        let verifier = Arc::new(PlainVerifier::default());
        Harness {
            authenticator: Authenticator::new(users.clone(), passwords, verifier.clone()),
            users,
            verifier,
        }
    }

    fn creds(identifier: &str, password: &str) -> LoginCredentials {
        LoginCredentials::create(identifier, password).unwrap()
    }

    #[tokio::test]
    async fn test_username_and_email_both_resolve() {
        let h = harness().await;

        let by_name = h.authenticator.authenticate(&creds("carol", "correct horse")).await;
        let by_email = h
            .authenticator
            .authenticate(&creds("carol@example.test", "correct horse"))
            .await;

        assert_eq!(by_name.unwrap().username, "carol");
        assert_eq!(by_email.unwrap().username, "carol");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let h = harness().await;

        let wrong = h.authenticator.authenticate(&creds("carol", "wrong password")).await;
        let unknown = h.authenticator.authenticate(&creds("bob", "wrong password")).await;

        assert!(wrong.is_none());
        assert!(unknown.is_none());
        // both paths pay for exactly one verification
        assert_eq!(h.verifier.verifications.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_storage_errors_are_swallowed() {
        let h = harness().await;
        *h.users.fail.lock().unwrap() = true;

        let result = h.authenticator.authenticate(&creds("carol", "correct horse")).await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_user_without_password_is_rejected() {
        let h = harness().await;
        h.users
            .create(
                crate::NewUser::builder()
                    .username("dave")
                    .email("dave@example.test")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(h.authenticator.authenticate(&creds("dave", "anything1")).await.is_none());
        assert_eq!(h.verifier.verifications.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_skips_password_check() {
        let h = harness().await;

        let carol = h.authenticator.resolve(&creds("carol@example.test", "wrong password")).await;
        let bob = h.authenticator.resolve(&creds("bob", "wrong password")).await;

        assert!(carol.is_some());
        assert!(bob.is_none());
        assert_eq!(h.verifier.verifications.load(Ordering::SeqCst), 0);
    }
}
