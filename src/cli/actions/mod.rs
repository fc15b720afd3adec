pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        ldap_url: String,
        ldap_base_dn: String,
        ldap_timeout_seconds: u64,
        signing_key: SecretString,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_seconds: i64,
        internal_token: SecretString,
        allowed_origin: String,
        session_reaper_interval_seconds: u64,
    },
}
