//! Signs in against an account API and fetches the current user.
//!
//! This example shows how to:
//! - Configure the client from `TESSERA_BASE_URL`
//! - Sign in and persist the returned tokens
//! - Report per-field validation errors from a rejected login
//! - Make an authorized call and refresh the session on 401
//!
//! Run with:
//! `TESSERA_BASE_URL=http://localhost:8000 cargo run --example sign_in -- <email> <password>`

use std::sync::Arc;
use tessera::cookie::MemoryCookieJar;
use tessera::{
    AccountClient, ClientBuilder, Envelope, Error, Refresh, RequestOptions, SignIn, TokenStore,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("tessera=debug,sign_in=info")
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(email), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: sign_in <email> <password>");
        std::process::exit(2);
    };

    let api = ClientBuilder::from_env()?.build()?;
    let account = AccountClient::new(api, TokenStore::new(Arc::new(MemoryCookieJar::new())));

    println!("=== Sign In ===");
    match account.sign_in(&email, &password).await? {
        SignIn::Authenticated(user) => {
            println!("Signed in as {} <{}>", user.username, user.email);
        }
        SignIn::Rejected(rejection) => {
            println!("Login refused ({}): {}", rejection.status, rejection.message);
            for (field, message) in &rejection.field_errors {
                println!("  {}: {}", field, message);
            }
            return Ok(());
        }
    }

    println!();
    println!("=== Authorized Call ===");
    let options = account.authorize(RequestOptions::new())?;
    let envelope = account
        .api()
        .get::<serde_json::Value>("/account/me", options)
        .await?;

    match envelope {
        Envelope::Success { result, status } => {
            println!("{}: {:?}", status, result.data);
        }
        Envelope::Failure { status, .. } if status.as_u16() == 401 => {
            println!("Access token rejected, refreshing");
            match account.refresh_session().await? {
                Refresh::Refreshed(token) => {
                    println!("New access token expires at {} ms", token.access_expires_at);
                }
                Refresh::Rejected { result, .. } => {
                    println!("Refresh refused: {}", result.error.message);
                    account.logout();
                }
            }
        }
        Envelope::Failure { result, status } => {
            println!("{}: {}", status, result.error.message);
        }
    }

    Ok(())
}
