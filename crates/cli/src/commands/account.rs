//! Sign-in and profile commands.

use std::io::{BufRead, Write};

use emporium_core::Email;
use emporium_storefront::Storefront;
use emporium_storefront::api::account::GetProfile;
use emporium_storefront::api::auth::LoginCredentials;
use secrecy::SecretString;

use super::CommandError;

/// `emporium login -e <email>`
///
/// The password comes from `EMPORIUM_PASSWORD`, else the first line of stdin.
pub async fn login(
    storefront: &Storefront,
    email: &str,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidInput(e.to_string()))?;
    let password = match std::env::var("EMPORIUM_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(CommandError::InvalidInput("password is empty".to_string()));
    }

    let user = storefront
        .login(LoginCredentials {
            email,
            password: SecretString::from(password),
        })
        .await?;

    writeln!(out, "Signed in as {} <{}>", user.name, user.email)?;
    Ok(())
}

/// `emporium whoami`
pub async fn whoami(storefront: &Storefront, out: &mut impl Write) -> Result<(), CommandError> {
    if !storefront.session().is_authenticated() {
        writeln!(out, "Not signed in")?;
        return Ok(());
    }

    let user = storefront.gateway().fetch::<GetProfile>(()).await?;
    writeln!(out, "{} <{}> ({})", user.name, user.email, user.role)?;
    if let Some(phone) = &user.phone {
        writeln!(out, "phone: {phone}")?;
    }
    Ok(())
}
