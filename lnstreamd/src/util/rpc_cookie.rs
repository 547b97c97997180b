use anyhow::Result;
use std::path::PathBuf;

/// Get the rpc username and password, from the pair or from a `user:password` cookie file.
pub fn get_rpc_credentials(
    rpc_user: Option<String>,
    rpc_pass: Option<String>,
    rpc_cookie: Option<PathBuf>,
) -> Result<(String, String)> {
    match (rpc_user, rpc_pass, rpc_cookie) {
        (Some(user), Some(pass), None) => Ok((user, pass)),
        (_, _, Some(cookie)) => {
            let contents = std::fs::read_to_string(&cookie).map_err(|e| {
                anyhow::anyhow!("cannot read rpc cookie {}: {}", cookie.display(), e)
            })?;
            let (user, pass) = contents.trim().split_once(':').ok_or_else(|| {
                anyhow::anyhow!("rpc cookie file must contain a username and password")
            })?;
            Ok((user.to_string(), pass.to_string()))
        }
        _ => anyhow::bail!("rpc-user and rpc-pass must be set, or rpc-cookie must be set"),
    }
}
