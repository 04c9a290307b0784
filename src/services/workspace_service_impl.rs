//! `SeaORM` implementation of the `WorkspaceService` trait.

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use crate::db::{
    IdentityProviderUpdate, NewIdentityProvider, Store, User, WorkspaceGeneralSetting,
};
use crate::domain::{IdentityProviderType, Role, RowStatus, UserId};
use crate::idp::{IdpError, OAuth2Config};
use crate::services::auth_service::{AuthError, UserProfile};
use crate::services::workspace_service::{
    CreateIdentityProvider, IdentityProviderView, UpdateIdentityProvider, WorkspaceService,
};

pub struct SeaOrmWorkspaceService {
    store: Store,
}

impl SeaOrmWorkspaceService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn check_identifier_filter(filter: &str) -> Result<(), AuthError> {
    if !filter.is_empty() {
        Regex::new(filter).map_err(|e| AuthError::InvalidIdentifierFilter(e.to_string()))?;
    }
    Ok(())
}

/// Validate a provider config and store it in canonical form.
fn normalize_config(
    kind: IdentityProviderType,
    config: &serde_json::Value,
) -> Result<serde_json::Value, AuthError> {
    match kind {
        IdentityProviderType::OAuth2 => {
            let parsed = OAuth2Config::from_value(config)?;
            serde_json::to_value(parsed).map_err(|e| AuthError::Internal(e.to_string()))
        }
    }
}

fn require_host(actor: &User) -> Result<(), AuthError> {
    if actor.role == Role::Host {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

#[async_trait]
impl WorkspaceService for SeaOrmWorkspaceService {
    async fn list_identity_providers(&self) -> Result<Vec<IdentityProviderView>, AuthError> {
        let records = self.store.list_identity_providers().await?;
        Ok(records.into_iter().map(IdentityProviderView::from).collect())
    }

    async fn create_identity_provider(
        &self,
        actor: &User,
        input: CreateIdentityProvider,
    ) -> Result<IdentityProviderView, AuthError> {
        require_host(actor)?;

        if input.name.trim().is_empty() {
            return Err(IdpError::InvalidConfig("name is required".to_string()).into());
        }
        check_identifier_filter(&input.identifier_filter)?;
        let config = normalize_config(input.provider_type, &input.config)?;

        let record = self
            .store
            .create_identity_provider(NewIdentityProvider {
                name: input.name.trim().to_string(),
                provider_type: input.provider_type,
                identifier_filter: input.identifier_filter,
                config,
            })
            .await?;

        info!(idp_id = record.id, name = %record.name, "Identity provider created");
        Ok(IdentityProviderView::from(record))
    }

    async fn update_identity_provider(
        &self,
        actor: &User,
        id: i32,
        input: UpdateIdentityProvider,
    ) -> Result<IdentityProviderView, AuthError> {
        require_host(actor)?;

        let existing = self
            .store
            .get_identity_provider(id)
            .await?
            .ok_or(AuthError::ProviderNotFound)?;

        let name = match input.name {
            Some(name) if name.trim().is_empty() => {
                return Err(IdpError::InvalidConfig("name is required".to_string()).into());
            }
            other => other.map(|name| name.trim().to_string()),
        };

        if let Some(filter) = &input.identifier_filter {
            check_identifier_filter(filter)?;
        }

        let config = match input.config {
            Some(mut config) => {
                let kind = existing
                    .kind()
                    .map_err(|_| IdpError::Unsupported(existing.provider_type.clone()))?;
                if let (Some(obj), Some(secret)) =
                    (config.as_object_mut(), existing.config.get("client_secret"))
                {
                    let omitted = obj
                        .get("client_secret")
                        .and_then(serde_json::Value::as_str)
                        .is_none_or(str::is_empty);
                    if omitted {
                        obj.insert("client_secret".to_string(), secret.clone());
                    }
                }
                Some(normalize_config(kind, &config)?)
            }
            None => None,
        };

        let record = self
            .store
            .update_identity_provider(
                id,
                IdentityProviderUpdate {
                    name,
                    identifier_filter: input.identifier_filter,
                    config,
                },
            )
            .await?
            .ok_or(AuthError::ProviderNotFound)?;

        info!(idp_id = record.id, name = %record.name, "Identity provider updated");
        Ok(IdentityProviderView::from(record))
    }

    async fn delete_identity_provider(&self, actor: &User, id: i32) -> Result<(), AuthError> {
        require_host(actor)?;

        if self.store.delete_identity_provider(id).await? {
            info!(idp_id = id, "Identity provider deleted");
            Ok(())
        } else {
            Err(AuthError::ProviderNotFound)
        }
    }

    async fn authorization_url(
        &self,
        id: i32,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, AuthError> {
        let record = self
            .store
            .get_identity_provider(id)
            .await?
            .ok_or(AuthError::ProviderNotFound)?;

        match record
            .kind()
            .map_err(|_| IdpError::Unsupported(record.provider_type.clone()))?
        {
            IdentityProviderType::OAuth2 => {
                let config = OAuth2Config::from_value(&record.config)?;
                Ok(config.authorization_url(redirect_uri, state)?)
            }
        }
    }

    async fn general_setting(&self, actor: &User) -> Result<WorkspaceGeneralSetting, AuthError> {
        require_host(actor)?;
        Ok(self.store.get_general_setting().await?)
    }

    async fn update_general_setting(
        &self,
        actor: &User,
        setting: WorkspaceGeneralSetting,
    ) -> Result<WorkspaceGeneralSetting, AuthError> {
        require_host(actor)?;
        self.store.set_general_setting(&setting).await?;
        info!(
            disallow_signup = setting.disallow_signup,
            disallow_password_login = setting.disallow_password_login,
            "Workspace general setting updated"
        );
        Ok(setting)
    }

    async fn set_user_row_status(
        &self,
        actor: &User,
        user_id: UserId,
        status: RowStatus,
    ) -> Result<UserProfile, AuthError> {
        if !actor.role.is_privileged() {
            return Err(AuthError::PermissionDenied);
        }

        let target = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Only the host may change the host account, and never to lock itself out.
        if target.role == Role::Host && (actor.role != Role::Host || actor.id == target.id) {
            return Err(AuthError::PermissionDenied);
        }

        let updated = self
            .store
            .set_user_row_status(user_id, status)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user_id, status = %status, actor = %actor.id, "User row status changed");
        Ok(UserProfile::from(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    async fn setup() -> (SeaOrmWorkspaceService, Store, User, User) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let mk = |name: &str, role| NewUser {
            username: name.to_string(),
            role,
            email: String::new(),
            nickname: name.to_string(),
            password_hash: "x".to_string(),
        };
        let host = store.create_user(mk("host", Role::Host)).await.unwrap().unwrap();
        let user = store.create_user(mk("bob", Role::User)).await.unwrap().unwrap();
        (SeaOrmWorkspaceService::new(store.clone()), store, host, user)
    }

    fn oauth2_input(filter: &str) -> CreateIdentityProvider {
        CreateIdentityProvider {
            name: "Corp SSO".to_string(),
            provider_type: IdentityProviderType::OAuth2,
            identifier_filter: filter.to_string(),
            config: serde_json::json!({
                "client_id": "abc",
                "client_secret": "shh",
                "auth_url": "https://idp.corp.com/authorize",
                "token_url": "https://idp.corp.com/token",
                "user_info_url": "https://idp.corp.com/userinfo",
                "scopes": ["openid"],
                "field_mapping": { "identifier": "email" }
            }),
        }
    }

    #[tokio::test]
    async fn host_manages_identity_providers() {
        let (service, _store, host, user) = setup().await;

        let err = service
            .create_identity_provider(&user, oauth2_input(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionDenied));

        let created = service
            .create_identity_provider(&host, oauth2_input(r"@corp\.com$"))
            .await
            .unwrap();
        assert_eq!(created.provider_type, "OAUTH2");
        assert!(created.config.get("client_secret").is_none());

        let listed = service.list_identity_providers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].config.get("client_secret").is_none());

        let url = service
            .authorization_url(created.id, "https://app/cb", "s1")
            .await
            .unwrap();
        assert!(url.starts_with("https://idp.corp.com/authorize?client_id=abc"));

        service
            .delete_identity_provider(&host, created.id)
            .await
            .unwrap();
        let err = service
            .delete_identity_provider(&host, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderNotFound));
    }

    #[tokio::test]
    async fn update_keeps_provider_id_and_secret() {
        let (service, store, host, user) = setup().await;
        let created = service
            .create_identity_provider(&host, oauth2_input(""))
            .await
            .unwrap();

        let err = service
            .update_identity_provider(&user, created.id, UpdateIdentityProvider::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionDenied));

        let updated = service
            .update_identity_provider(
                &host,
                created.id,
                UpdateIdentityProvider {
                    identifier_filter: Some(r"@corp\.com$".to_string()),
                    ..UpdateIdentityProvider::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.identifier_filter, r"@corp\.com$");
        assert_eq!(updated.name, "Corp SSO");

        // Clients edit the redacted view and send it back without the secret.
        let mut config = updated.config.clone();
        config["client_id"] = serde_json::json!("xyz");
        service
            .update_identity_provider(
                &host,
                created.id,
                UpdateIdentityProvider {
                    config: Some(config),
                    ..UpdateIdentityProvider::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_identity_provider(created.id).await.unwrap().unwrap();
        assert_eq!(stored.config["client_id"], "xyz");
        assert_eq!(stored.config["client_secret"], "shh");
        assert_eq!(stored.identifier_filter, r"@corp\.com$");
    }

    #[tokio::test]
    async fn update_rejects_bad_input() {
        let (service, _store, host, _user) = setup().await;
        let created = service
            .create_identity_provider(&host, oauth2_input(""))
            .await
            .unwrap();

        let err = service
            .update_identity_provider(
                &host,
                created.id,
                UpdateIdentityProvider {
                    identifier_filter: Some("(".to_string()),
                    ..UpdateIdentityProvider::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidIdentifierFilter(_)));

        let err = service
            .update_identity_provider(
                &host,
                created.id,
                UpdateIdentityProvider {
                    name: Some("  ".to_string()),
                    ..UpdateIdentityProvider::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider(IdpError::InvalidConfig(_))));

        let err = service
            .update_identity_provider(&host, created.id + 1, UpdateIdentityProvider::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderNotFound));
    }

    #[tokio::test]
    async fn rejects_bad_provider_input() {
        let (service, _store, host, _user) = setup().await;

        let err = service
            .create_identity_provider(&host, oauth2_input("("))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidIdentifierFilter(_)));

        let mut input = oauth2_input("");
        input.config = serde_json::json!({ "client_id": "abc" });
        let err = service
            .create_identity_provider(&host, input)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider(IdpError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn general_setting_is_host_only() {
        let (service, _store, host, user) = setup().await;

        assert!(matches!(
            service.general_setting(&user).await.unwrap_err(),
            AuthError::PermissionDenied
        ));

        let setting = WorkspaceGeneralSetting {
            disallow_signup: true,
            disallow_password_login: false,
        };
        service
            .update_general_setting(&host, setting)
            .await
            .unwrap();
        assert_eq!(service.general_setting(&host).await.unwrap(), setting);
    }

    #[tokio::test]
    async fn archive_and_restore() {
        let (service, _store, host, user) = setup().await;

        let archived = service
            .set_user_row_status(&host, user.id, RowStatus::Archived)
            .await
            .unwrap();
        assert_eq!(archived.row_status, RowStatus::Archived);

        let restored = service
            .set_user_row_status(&host, user.id, RowStatus::Normal)
            .await
            .unwrap();
        assert_eq!(restored.row_status, RowStatus::Normal);

        assert!(matches!(
            service
                .set_user_row_status(&user, host.id, RowStatus::Archived)
                .await
                .unwrap_err(),
            AuthError::PermissionDenied
        ));
        assert!(matches!(
            service
                .set_user_row_status(&host, host.id, RowStatus::Archived)
                .await
                .unwrap_err(),
            AuthError::PermissionDenied
        ));
        assert!(matches!(
            service
                .set_user_row_status(&host, UserId::new(404), RowStatus::Archived)
                .await
                .unwrap_err(),
            AuthError::UserNotFound
        ));
    }
}
