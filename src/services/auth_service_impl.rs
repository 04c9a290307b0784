//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    CookieError, CredentialHasher, TokenMinter, build_cookie, clear_cookie,
    generate_random_password,
};
use crate::config::Config;
use crate::db::{NewUser, Store, User};
use crate::domain::{Role, UserId, normalize_username};
use crate::idp::{IdentityProviderUserInfo, ProviderFactory};
use crate::services::auth_service::{
    AccessTokenInfo, AuthError, AuthService, RequestContext, Session, UserProfile,
};

/// Registry description attached to interactively issued tokens.
const LOGIN_TOKEN_DESCRIPTION: &str = "user login";

pub struct SeaOrmAuthService {
    store: Store,
    minter: TokenMinter,
    hasher: CredentialHasher,
    providers: Arc<dyn ProviderFactory>,
    access_token_lifetime: Duration,
    never_expire_lifetime: Duration,
    provisioned_password_length: usize,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        minter: TokenMinter,
        hasher: CredentialHasher,
        providers: Arc<dyn ProviderFactory>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            minter,
            hasher,
            providers,
            access_token_lifetime: config.token.access_token_duration(),
            never_expire_lifetime: config.token.never_expire_duration(),
            provisioned_password_length: config.security.provisioned_password_length,
        }
    }

    /// Mint, record, then bind. Nothing is recorded when the request carries
    /// no origin to build a cookie for.
    async fn issue_session(
        &self,
        ctx: &RequestContext,
        user: User,
        lifetime: Duration,
    ) -> Result<Session, AuthError> {
        if user.row_status.is_archived() {
            return Err(AuthError::UserArchived);
        }
        let origin = ctx.origin.as_deref().ok_or(CookieError::MissingOrigin)?;

        let expires_at = Utc::now()
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".to_string()))?;
        let access_token = self.minter.mint(&user.email, user.id, expires_at)?;

        self.store
            .upsert_access_token(user.id, &access_token, LOGIN_TOKEN_DESCRIPTION, expires_at)
            .await?;

        let cookie = build_cookie(&access_token, Some(expires_at), Some(origin))?;

        Ok(Session {
            user: UserProfile::from(user),
            access_token,
            expires_at,
            cookie,
        })
    }

    async fn password_sign_in(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        never_expire: bool,
    ) -> Result<Session, AuthError> {
        let username = username.trim().to_lowercase();
        let (user, password_hash) = self
            .store
            .get_user_by_username_with_password(&username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.row_status.is_archived() {
            return Err(AuthError::UserArchived);
        }

        let matches =
            CredentialHasher::verify_blocking(password_hash, password.to_string()).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let lifetime = if never_expire {
            self.never_expire_lifetime
        } else {
            self.access_token_lifetime
        };

        self.issue_session(ctx, user, lifetime).await
    }

    async fn register(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let general = self.store.get_general_setting().await?;
        if general.disallow_signup || general.disallow_password_login {
            return Err(AuthError::SignupDisabled);
        }

        let username = normalize_username(username)
            .ok_or_else(|| AuthError::InvalidUsernameFormat(username.to_string()))?;
        if password.is_empty() {
            return Err(AuthError::InvalidPassword(
                "password must not be empty".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;

        let role = if self.store.list_users_by_role(Role::Host).await?.is_empty() {
            Role::Host
        } else {
            Role::User
        };

        let user = self
            .store
            .create_user(NewUser {
                nickname: username.clone(),
                username: username.clone(),
                role,
                email: String::new(),
                password_hash,
            })
            .await?
            .ok_or(AuthError::UserAlreadyExists(username))?;

        info!(user_id = %user.id, role = %user.role, "User registered");

        self.issue_session(ctx, user, self.access_token_lifetime)
            .await
    }

    async fn sso_sign_in(
        &self,
        ctx: &RequestContext,
        idp_id: i32,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session, AuthError> {
        let record = self
            .store
            .get_identity_provider(idp_id)
            .await?
            .ok_or(AuthError::ProviderNotFound)?;

        let provider = self.providers.build(&record)?;
        let provider_token = provider.exchange_token(redirect_uri, code).await?;
        let profile = provider.user_info(&provider_token).await?;

        check_identifier_filter(&record.identifier_filter, &profile.identifier)?;

        let username = profile.identifier.to_lowercase();
        let user = match self.store.get_user_by_username(&username).await? {
            Some(user) => user,
            None => self.provision_sso_user(&username, &profile).await?,
        };

        self.issue_session(ctx, user, self.access_token_lifetime)
            .await
    }

    async fn provision_sso_user(
        &self,
        username: &str,
        profile: &IdentityProviderUserInfo,
    ) -> Result<User, AuthError> {
        let password = generate_random_password(self.provisioned_password_length);
        let password_hash = self.hasher.hash_blocking(password).await?;

        let created = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                role: Role::User,
                email: profile.email.clone(),
                nickname: profile.display_name.clone(),
                password_hash,
            })
            .await?;

        if let Some(user) = created {
            info!(user_id = %user.id, "Provisioned user from identity provider");
            return Ok(user);
        }

        // Lost a race with a concurrent first login for the same identifier.
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("user {username} vanished after conflict")))
    }
}

/// An empty filter admits everyone. The pattern is unanchored.
fn check_identifier_filter(filter: &str, identifier: &str) -> Result<(), AuthError> {
    if filter.is_empty() {
        return Ok(());
    }

    let re = Regex::new(filter).map_err(|e| AuthError::InvalidIdentifierFilter(e.to_string()))?;
    if re.is_match(identifier) {
        Ok(())
    } else {
        Err(AuthError::IdentifierRejected(identifier.to_string()))
    }
}

fn record_outcome(method: &'static str, result: &Result<Session, AuthError>) {
    let outcome = match result {
        Ok(session) => {
            info!(method, user_id = %session.user.id, "Sign-in succeeded");
            "success"
        }
        Err(e) if e.is_infrastructure() => {
            warn!(method, error = %e, "Sign-in failed");
            e.code()
        }
        Err(e) => {
            info!(method, reason = e.code(), "Sign-in rejected");
            e.code()
        }
    };

    metrics::counter!("auth_sign_in_total", "method" => method, "outcome" => outcome)
        .increment(1);
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn sign_in(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        never_expire: bool,
    ) -> Result<Session, AuthError> {
        let result = self
            .password_sign_in(ctx, username, password, never_expire)
            .await;
        record_outcome("password", &result);
        result
    }

    async fn sign_up(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let result = self.register(ctx, username, password).await;
        record_outcome("signup", &result);
        result
    }

    async fn sign_in_with_sso(
        &self,
        ctx: &RequestContext,
        idp_id: i32,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session, AuthError> {
        let result = self.sso_sign_in(ctx, idp_id, redirect_uri, code).await;
        record_outcome("sso", &result);
        result
    }

    async fn sign_out(&self, ctx: &RequestContext) -> Result<String, AuthError> {
        Ok(clear_cookie(ctx.origin.as_deref())?)
    }

    async fn auth_status(&self, ctx: &RequestContext) -> Result<UserProfile, AuthError> {
        let resolved = match ctx.access_token.as_deref() {
            Some(token) => self.authenticate(token).await,
            None => Err(AuthError::Unauthenticated(None)),
        };

        match resolved {
            Ok(user) => Ok(UserProfile::from(user)),
            Err(e) if e.is_infrastructure() => Err(e),
            Err(_) => Err(AuthError::Unauthenticated(
                clear_cookie(ctx.origin.as_deref()).ok(),
            )),
        }
    }

    async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.minter.verify(access_token)?;
        let user_id = claims.user_id()?;

        if !self
            .store
            .access_token_exists(user_id, access_token)
            .await?
        {
            return Err(AuthError::Unauthenticated(None));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated(None))?;

        if user.row_status.is_archived() {
            return Err(AuthError::UserArchived);
        }

        Ok(user)
    }

    async fn list_access_tokens(&self, user_id: UserId) -> Result<Vec<AccessTokenInfo>, AuthError> {
        let tokens = self.store.list_access_tokens(user_id).await?;
        Ok(tokens.into_iter().map(AccessTokenInfo::from).collect())
    }

    async fn revoke_access_token(&self, user_id: UserId, token_id: i32) -> Result<(), AuthError> {
        if self.store.delete_access_token(user_id, token_id).await? {
            info!(user_id = %user_id, token_id, "Access token revoked");
            Ok(())
        } else {
            Err(AuthError::Unauthenticated(None))
        }
    }
}
