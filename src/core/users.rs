//! Accounts: signup, login, profiles and password changes

use crate::core::models::{NewUser, ProfilePatch, User};
use crate::core::password::{hash_password_blocking, verify_password_blocking, MIN_PASSWORD_LENGTH};
use crate::core::service::{FieldError, ServiceError};
use crate::storage::media::{profile_picture_folder, MediaStorage, UploadedImage, PROFILE_PICTURE_RULES};
use crate::storage::Store;
use chrono::{Duration, SubsecRound, Utc};
use tracing::{info, warn};
use uuid::Uuid;

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password.";

pub struct UserService<'a> {
    store: &'a Store,
    media: &'a dyn MediaStorage,
}

impl<'a> UserService<'a> {
    pub fn new(store: &'a Store, media: &'a dyn MediaStorage) -> Self {
        Self { store, media }
    }

    /// Create an account. Name is trimmed and email trimmed and lower-cased.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User, ServiceError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::InvalidFields(vec![password_too_short()]));
        }
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let user = self
            .store
            .insert_user(&NewUser {
                name: name.trim().to_string(),
                email: normalize_email(email),
                password_hash,
            })
            .await?;
        info!("New user {} signed up", user.id);
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INCORRECT_CREDENTIALS.to_string()))?;

        if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await {
            return Err(ServiceError::Unauthorized(INCORRECT_CREDENTIALS.to_string()));
        }
        Ok(user)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_user(id).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ServiceError> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No user found with that ID.".to_string()))
    }

    /// Apply whitelisted profile changes and optionally replace the profile picture.
    ///
    /// A new picture is uploaded before the row is updated and removed again if the
    /// update fails. The previous picture is deleted afterwards; failures there are
    /// only logged.
    pub async fn update_profile(
        &self,
        user: &User,
        mut patch: ProfilePatch,
        picture: Option<UploadedImage>,
    ) -> Result<User, ServiceError> {
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
        }

        let uploaded = match picture {
            Some(image) => {
                PROFILE_PICTURE_RULES.check(&image)?;
                let photo = self
                    .media
                    .upload(
                        &profile_picture_folder(user.id),
                        &image,
                        PROFILE_PICTURE_RULES.transform,
                    )
                    .await?;
                patch.profile_picture = Some(photo.clone());
                Some(photo)
            }
            None => None,
        };

        if patch.is_empty() {
            return self.get(user.id).await;
        }

        let updated = match self.store.update_user_profile(user.id, &patch).await {
            Ok(Some(updated)) => updated,
            result => {
                if let Some(photo) = &uploaded {
                    if let Err(e) = self.media.delete(&photo.public_id).await {
                        warn!("Failed to remove orphaned upload {}: {}", photo.public_id, e);
                    }
                }
                return match result {
                    Err(e) => Err(e.into()),
                    _ => Err(ServiceError::NotFound("No user found with that ID.".to_string())),
                };
            }
        };

        if uploaded.is_some() {
            if let Some(previous) = &user.profile_picture_public_id {
                if let Err(e) = self.media.delete(previous).await {
                    warn!("Failed to delete previous profile picture {}: {}", previous, e);
                }
            }
        }
        Ok(updated)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        new_password: &str,
    ) -> Result<User, ServiceError> {
        if !verify_password_blocking(current.to_string(), user.password_hash.clone()).await {
            return Err(ServiceError::Unauthorized(
                "Your current password is wrong.".to_string(),
            ));
        }
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::InvalidFields(vec![password_too_short()]));
        }

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        // one second back so a token issued right after this call stays valid
        let changed_at = Utc::now().trunc_subsecs(3) - Duration::seconds(1);
        let updated = self
            .store
            .update_user_password(user.id, &password_hash, changed_at)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No user found with that ID.".to_string()))?;
        info!("User {} changed their password", user.id);
        Ok(updated)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_too_short() -> FieldError {
    FieldError::new(
        "password",
        format!("Password must be at least {} characters long.", MIN_PASSWORD_LENGTH),
    )
}
