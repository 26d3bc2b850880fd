//! Sign-in helpers and the current user.

use tokio::runtime::Runtime;

use crate::auth;
use crate::catalog::SpotifyClient;
use crate::config;

/// Show the signed-in account
pub fn cmd_whoami(rt: &Runtime, token: Option<&str>) -> anyhow::Result<()> {
    let stored = config::load().credentials.spotify_token;
    let Some(token) = token
        .map(str::to_string)
        .or(stored)
        .filter(|t| !t.trim().is_empty())
    else {
        anyhow::bail!("Not signed in. Run `beatstop login-url` first.");
    };

    rt.block_on(async {
        let client = SpotifyClient::new();
        let user = client.current_user(token.trim()).await?;

        println!("Signed in as {} ({})", user.display_name, user.id);
        if let Some(image) = &user.image_url {
            println!("Avatar: {}", image);
        }
        match user.has_premium() {
            Some(true) => println!("Premium: yes - full tracks on a playback device"),
            Some(false) => println!("Premium: no - rounds will use preview clips"),
            None => println!("Premium: unknown"),
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Print the link that starts the sign-in
pub fn cmd_login_url(client_id: Option<&str>, redirect_uri: &str) -> anyhow::Result<()> {
    let stored = config::load().credentials.client_id;
    let Some(client_id) = client_id.map(str::to_string).or(stored) else {
        anyhow::bail!("No client id. Pass --client-id or set credentials.client_id in the config.");
    };

    println!("Open this link to sign in:\n");
    println!("{}", auth::authorize_url(&client_id, redirect_uri));
    println!("\nThen run `beatstop token-from-callback <URL>` with the page you end up on.");
    Ok(())
}

/// Extract the token from the URL the browser landed on
pub fn cmd_token_from_callback(rt: &Runtime, url: &str, save: bool) -> anyhow::Result<()> {
    let token = auth::credential_from_callback(url)?;

    if save {
        let mut config = config::load();
        config.credentials.spotify_token = Some(token);
        let path = rt.block_on(config::save_async(config))?;
        println!("Token saved to {}", path.display());
    } else {
        println!("{}", token);
    }
    Ok(())
}
