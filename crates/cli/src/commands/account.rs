//! Account and profile commands.

use secrecy::SecretString;

use pocket_store_storefront::error::{AppError, clear_sentry_user, set_sentry_user};

use super::Context;

/// Create an account.
///
/// # Errors
///
/// Returns error if the input is rejected or the account cannot be created.
pub async fn sign_up(
    ctx: &Context,
    name: &str,
    email: &str,
    password: String,
) -> Result<(), AppError> {
    let password = SecretString::from(password);
    let identity = ctx.accounts().sign_up(name, email, &password).await?;

    set_sentry_user(&identity.owner_id, Some(email));
    tracing::info!("User registered successfully");
    Ok(())
}

/// Sign in.
///
/// # Errors
///
/// Returns error if the input is rejected or the credentials are wrong.
pub async fn log_in(ctx: &Context, email: &str, password: String) -> Result<(), AppError> {
    let password = SecretString::from(password);
    let identity = ctx.accounts().log_in(email, &password).await?;

    set_sentry_user(&identity.owner_id, Some(email));
    tracing::info!("Logged in as {email}");
    Ok(())
}

/// Sign out and clear the profile.
///
/// # Errors
///
/// Returns error if device storage cannot be written.
pub async fn log_out(ctx: &Context) -> Result<(), AppError> {
    ctx.accounts().log_out().await?;
    clear_sentry_user();
    tracing::info!("Logged out");
    Ok(())
}

/// Print the stored profile.
pub async fn show_profile(ctx: &Context) -> Result<(), AppError> {
    let profile = ctx.accounts().profile().await;
    let or_unset = |value: Option<String>| value.unwrap_or_else(|| "(not set)".to_owned());

    tracing::info!("Name:  {}", or_unset(profile.name));
    tracing::info!("Email: {}", or_unset(profile.email));
    tracing::info!("Photo: {}", or_unset(profile.image_uri));
    Ok(())
}

/// Change the display name.
///
/// # Errors
///
/// Returns error if the name is blank or cannot be saved.
pub async fn rename(ctx: &Context, name: &str) -> Result<(), AppError> {
    ctx.accounts().rename(name).await?;
    tracing::info!("Name updated");
    Ok(())
}

/// Set the profile photo.
///
/// # Errors
///
/// Returns error if the URI cannot be saved.
pub async fn set_photo(ctx: &Context, uri: &str) -> Result<(), AppError> {
    ctx.accounts().set_profile_image(uri).await?;
    tracing::info!("Photo updated");
    Ok(())
}
