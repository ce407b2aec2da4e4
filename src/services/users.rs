use crate::{database::Repository, errors::Result, models::User};

/// Creates the user on first sight. An existing row is returned untouched,
/// so a changed nickname or avatar at the identity provider is not copied.
pub async fn save_user(db: &dyn Repository, user: &User) -> Result<User> {
    if let Some(existing) = db.find_user_by_email(&user.email).await? {
        return Ok(existing);
    }

    let created = db.insert_user(user).await?;
    tracing::info!(email = %created.email, "Created user");
    Ok(created)
}
