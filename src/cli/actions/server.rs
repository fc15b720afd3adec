use crate::{
    api,
    auth::TokenConfig,
    cli::actions::Action,
    directory::DirectoryConfig,
};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            ldap_url,
            ldap_base_dn,
            ldap_timeout_seconds,
            signing_key,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            internal_token,
            allowed_origin,
            session_reaper_interval_seconds,
        } => {
            let token_config = TokenConfig::new(signing_key)
                .with_access_ttl_seconds(access_token_ttl_seconds)
                .with_refresh_ttl_seconds(refresh_token_ttl_seconds);

            let directory_config = DirectoryConfig::new(ldap_url, ldap_base_dn)
                .with_op_timeout_seconds(ldap_timeout_seconds);

            api::new(
                port,
                dsn,
                token_config,
                directory_config,
                internal_token,
                allowed_origin,
                session_reaper_interval_seconds,
            )
            .await?;
        }
    }

    Ok(())
}
