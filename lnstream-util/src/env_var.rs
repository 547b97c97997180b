use std::env;

pub fn deployment_environment() -> String {
    env::var("DEPLOYMENT_ENV").unwrap_or("DEVELOPMENT".to_string())
}

/// Wallet password fallback when no password file is configured
pub fn wallet_password() -> Option<String> {
    env::var("LNSTREAM_WALLET_PASSWORD").ok().filter(|p| !p.is_empty())
}
