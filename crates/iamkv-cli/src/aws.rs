//! AWS IAM backing: users are primary holders, roles are secondary holders
//! and each carries its chunk in an inline policy.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::config::Region;
use aws_sdk_iam::error::{DisplayErrorContext, SdkError};
use aws_sdk_iam::types::SummaryKeyType;
use aws_sdk_iam::Client;
use iamkv_store::{
    AccountSummary, AttributeBackend, BackingError, BackingResult, HolderKind, HolderRef,
};

use crate::config::AwsConfig;

pub struct IamBacking {
    client: Client,
}

impl IamBacking {
    pub async fn connect(config: &AwsConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_iam::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

/// Map an SDK error, letting `classify` pick out the service errors the
/// store branches on. Everything else becomes `BackingError::Service`.
fn map_sdk_error<E, R>(
    err: SdkError<E, R>,
    classify: impl FnOnce(&E) -> Option<BackingError>,
) -> BackingError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    if let Some(mapped) = err.as_service_error().and_then(classify) {
        return mapped;
    }
    BackingError::Service(DisplayErrorContext(&err).to_string())
}

fn summary_value(map: &std::collections::HashMap<SummaryKeyType, i32>, key: SummaryKeyType) -> u64 {
    map.get(&key).copied().unwrap_or(0).max(0) as u64
}

#[async_trait]
impl AttributeBackend for IamBacking {
    async fn get_document(&self, holder: &HolderRef) -> BackingResult<String> {
        let not_found = || BackingError::NoSuchEntity(holder.to_string());
        match holder.kind {
            HolderKind::Primary => self
                .client
                .get_user_policy()
                .user_name(&holder.name)
                .policy_name(&holder.document)
                .send()
                .await
                .map(|out| out.policy_document().to_string())
                .map_err(|e| {
                    map_sdk_error(e, |se| se.is_no_such_entity_exception().then(not_found))
                }),
            HolderKind::Secondary => self
                .client
                .get_role_policy()
                .role_name(&holder.name)
                .policy_name(&holder.document)
                .send()
                .await
                .map(|out| out.policy_document().to_string())
                .map_err(|e| {
                    map_sdk_error(e, |se| se.is_no_such_entity_exception().then(not_found))
                }),
        }
    }

    async fn put_document(&self, holder: &HolderRef, document: &str) -> BackingResult<()> {
        match holder.kind {
            HolderKind::Primary => self
                .client
                .put_user_policy()
                .user_name(&holder.name)
                .policy_name(&holder.document)
                .policy_document(document)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| {
                        if se.is_no_such_entity_exception() {
                            Some(BackingError::NoSuchEntity(holder.name.clone()))
                        } else if se.is_limit_exceeded_exception() {
                            Some(BackingError::LimitExceeded(se.to_string()))
                        } else if se.is_malformed_policy_document_exception() {
                            Some(BackingError::InvalidInput(se.to_string()))
                        } else {
                            None
                        }
                    })
                }),
            HolderKind::Secondary => self
                .client
                .put_role_policy()
                .role_name(&holder.name)
                .policy_name(&holder.document)
                .policy_document(document)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| {
                        if se.is_no_such_entity_exception() {
                            Some(BackingError::NoSuchEntity(holder.name.clone()))
                        } else if se.is_limit_exceeded_exception() {
                            Some(BackingError::LimitExceeded(se.to_string()))
                        } else if se.is_malformed_policy_document_exception() {
                            Some(BackingError::InvalidInput(se.to_string()))
                        } else {
                            None
                        }
                    })
                }),
        }
    }

    async fn create_holder(
        &self,
        holder: &HolderRef,
        trust_document: Option<&str>,
    ) -> BackingResult<()> {
        match holder.kind {
            HolderKind::Primary => self
                .client
                .create_user()
                .user_name(&holder.name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| {
                        if se.is_entity_already_exists_exception() {
                            Some(BackingError::EntityAlreadyExists(holder.name.clone()))
                        } else if se.is_limit_exceeded_exception() {
                            Some(BackingError::LimitExceeded(se.to_string()))
                        } else {
                            None
                        }
                    })
                }),
            HolderKind::Secondary => {
                let trust = trust_document.ok_or_else(|| {
                    BackingError::InvalidInput(format!("{holder} requires a trust document"))
                })?;
                self.client
                    .create_role()
                    .role_name(&holder.name)
                    .assume_role_policy_document(trust)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| {
                        map_sdk_error(e, |se| {
                            if se.is_entity_already_exists_exception() {
                                Some(BackingError::EntityAlreadyExists(holder.name.clone()))
                            } else if se.is_limit_exceeded_exception() {
                                Some(BackingError::LimitExceeded(se.to_string()))
                            } else if se.is_malformed_policy_document_exception() {
                                Some(BackingError::InvalidInput(se.to_string()))
                            } else {
                                None
                            }
                        })
                    })
            }
        }
    }

    async fn delete_document(&self, holder: &HolderRef) -> BackingResult<()> {
        let not_found = || BackingError::NoSuchEntity(holder.to_string());
        match holder.kind {
            HolderKind::Primary => self
                .client
                .delete_user_policy()
                .user_name(&holder.name)
                .policy_name(&holder.document)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| se.is_no_such_entity_exception().then(not_found))
                }),
            HolderKind::Secondary => self
                .client
                .delete_role_policy()
                .role_name(&holder.name)
                .policy_name(&holder.document)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| se.is_no_such_entity_exception().then(not_found))
                }),
        }
    }

    async fn delete_holder(&self, holder: &HolderRef) -> BackingResult<()> {
        match holder.kind {
            HolderKind::Primary => self
                .client
                .delete_user()
                .user_name(&holder.name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| {
                        if se.is_no_such_entity_exception() {
                            Some(BackingError::NoSuchEntity(holder.name.clone()))
                        } else if se.is_delete_conflict_exception() {
                            Some(BackingError::DeleteConflict(holder.name.clone()))
                        } else {
                            None
                        }
                    })
                }),
            HolderKind::Secondary => self
                .client
                .delete_role()
                .role_name(&holder.name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    map_sdk_error(e, |se| {
                        if se.is_no_such_entity_exception() {
                            Some(BackingError::NoSuchEntity(holder.name.clone()))
                        } else if se.is_delete_conflict_exception() {
                            Some(BackingError::DeleteConflict(holder.name.clone()))
                        } else {
                            None
                        }
                    })
                }),
        }
    }

    async fn account_summary(&self) -> BackingResult<AccountSummary> {
        let out = self
            .client
            .get_account_summary()
            .send()
            .await
            .map_err(|e| map_sdk_error(e, |_| None))?;
        let Some(map) = out.summary_map() else {
            return Ok(AccountSummary::default());
        };
        Ok(AccountSummary {
            primary_holders: summary_value(map, SummaryKeyType::Users),
            primary_holder_quota: summary_value(map, SummaryKeyType::UsersQuota),
            secondary_holders: summary_value(map, SummaryKeyType::Roles),
            secondary_holder_quota: summary_value(map, SummaryKeyType::RolesQuota),
        })
    }
}
