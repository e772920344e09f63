//! Table lifecycle
//!
//! Create, read, update, delete and import for a single table. Every
//! function takes the remote API and the caller's [`OperationContext`]
//! explicitly and runs to completion, including waiting on long-running
//! operations, before returning.
//!
//! Only two not-found cases are tolerated: a table missing on read (the
//! caller drops it from state) and a table missing on delete (already
//! gone). Everything else surfaces with the table id and the failed action
//! attached.

use super::api::{Lookup, TableApi, TableCreateUpdateParameters};
use super::error::{ResourceError, ValidationError};
use super::id::{AccountId, TableId};
use super::model::{DesiredState, ObservedState};
use super::schema;
use super::throughput::{self, CapacityMode, ThroughputSetting};
use crate::azure::error::ApiError;
use crate::azure::operation::{LongRunningOperation, OperationContext};

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Present(ObservedState),
    /// The table no longer exists; the caller should remove it from state
    Absent,
}

impl ReadOutcome {
    pub fn present(self) -> Option<ObservedState> {
        match self {
            ReadOutcome::Present(observed) => Some(observed),
            ReadOutcome::Absent => None,
        }
    }
}

/// Create a table that must not exist yet
pub async fn create<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    desired: &DesiredState,
) -> Result<ObservedState, ResourceError> {
    let id = preflight_create(api, desired).await?;
    let throughput = throughput::desired_setting(desired)?;

    let parameters = TableCreateUpdateParameters::new(&id.name).with_throughput(throughput);
    let operation = api
        .create_update_table(&id, &parameters)
        .await
        .map_err(|err| ResourceError::remote("issuing create request for", &id, err))?;
    operation
        .wait_for_completion(ctx)
        .await
        .map_err(|err| ResourceError::wait("waiting on create of", &id, err))?;

    tracing::info!("Created table {}", id);

    read_existing(api, ctx, &id).await
}

/// Checks a create must pass before anything is changed remotely
///
/// Validates the configuration, refuses a table that already exists and
/// refuses explicit throughput on a serverless account. Returns the id the
/// table will be created under.
pub async fn preflight_create<A: TableApi>(
    api: &A,
    desired: &DesiredState,
) -> Result<TableId, ResourceError> {
    schema::validate(desired)?;

    let id = TableId::new(
        api.subscription_id(),
        &desired.resource_group_name,
        &desired.account_name,
        &desired.name,
    )
    .map_err(ValidationError::from)?;

    match api.get_table(&id).await {
        Ok(Lookup::Found(existing)) => {
            let existing_id = existing
                .id
                .filter(|existing_id| !existing_id.is_empty())
                .unwrap_or_else(|| id.to_string());
            return Err(ResourceError::AlreadyExists { id: existing_id });
        },
        Ok(Lookup::Absent) => {},
        Err(err) => return Err(ResourceError::remote("checking for presence of", &id, err)),
    }

    if throughput::desired_setting(desired)?.is_set() {
        let mode = capacity_mode(api, &id.account_id()).await?;
        if !throughput::is_queryable(mode) {
            return Err(ValidationError::ServerlessThroughput {
                account: id.account_name.clone(),
            }
            .into());
        }
    }

    Ok(id)
}

/// Refresh a table from the remote API
pub async fn read<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    id: &TableId,
) -> Result<ReadOutcome, ResourceError> {
    ctx.guard(read_unguarded(api, id))
        .await
        .map_err(|interrupted| ResourceError::wait("reading", id, interrupted.into()))?
}

async fn read_unguarded<A: TableApi>(api: &A, id: &TableId) -> Result<ReadOutcome, ResourceError> {
    let table = match api.get_table(id).await {
        Ok(Lookup::Found(table)) => table,
        Ok(Lookup::Absent) => {
            tracing::info!("Table {} no longer exists - removing from state", id);
            return Ok(ReadOutcome::Absent);
        },
        Err(err) => return Err(ResourceError::remote("reading", id, err)),
    };

    let name = table.resource_id.unwrap_or_else(|| id.name.clone());

    let mode = capacity_mode(api, &id.account_id()).await?;
    let throughput = if throughput::is_queryable(mode) {
        match api.get_throughput(id).await {
            Ok(Lookup::Found(settings)) => throughput::observed_setting(&settings),
            Ok(Lookup::Absent) => ThroughputSetting::Unset,
            Err(err) => return Err(ResourceError::remote("reading throughput of", id, err)),
        }
    } else {
        tracing::debug!("Account of {} is serverless, skipping throughput", id);
        ThroughputSetting::Unset
    };

    Ok(ReadOutcome::Present(ObservedState {
        id: id.clone(),
        name,
        resource_group_name: id.resource_group.clone(),
        account_name: id.account_name.clone(),
        throughput,
    }))
}

/// Bring an existing table in line with its configuration
///
/// The base create/update call is an upsert and is always issued. The
/// throughput sub-resource is only touched when it actually changed. A
/// failed throughput update leaves the base update in place; running the
/// update again is safe.
pub async fn update<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    prior: &ObservedState,
    desired: &DesiredState,
) -> Result<ObservedState, ResourceError> {
    schema::validate(desired)?;
    throughput::check_mode_switch(&prior.throughput, desired)?;

    let replaced = schema::replacement_attributes(prior, desired);
    if !replaced.is_empty() {
        return Err(ValidationError::RequiresReplacement {
            attributes: replaced,
        }
        .into());
    }

    let id = &prior.id;

    let operation = api
        .create_update_table(id, &TableCreateUpdateParameters::new(&id.name))
        .await
        .map_err(|err| ResourceError::remote("issuing update request for", id, err))?;
    operation
        .wait_for_completion(ctx)
        .await
        .map_err(|err| ResourceError::wait("waiting on update of", id, err))?;

    if throughput::has_changed(&prior.throughput, desired) {
        let setting = throughput::build_update_payload(desired)?;
        let operation = match api.update_throughput(id, &setting).await {
            Ok(Lookup::Found(operation)) => operation,
            Ok(Lookup::Absent) => {
                return Err(ResourceError::ThroughputNotConfigurable { id: id.to_string() })
            },
            Err(err) => return Err(ResourceError::remote("setting throughput for", id, err)),
        };
        operation
            .wait_for_completion(ctx)
            .await
            .map_err(|err| ResourceError::wait("waiting on throughput update of", id, err))?;
    }

    tracing::info!("Updated table {}", id);

    read_existing(api, ctx, id).await
}

/// Delete a table; a table that is already gone counts as deleted
pub async fn delete<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    id: &TableId,
) -> Result<(), ResourceError> {
    let operation = match api.delete_table(id).await {
        Ok(Lookup::Found(operation)) => operation,
        Ok(Lookup::Absent) => {
            tracing::info!("Table {} was already deleted", id);
            return Ok(());
        },
        Err(err) => return Err(ResourceError::remote("deleting", id, err)),
    };

    operation
        .wait_for_completion(ctx)
        .await
        .map_err(|err| ResourceError::wait("waiting on delete of", id, err))?;

    tracing::info!("Deleted table {}", id);
    Ok(())
}

/// Validate an id supplied for import, before any state exists
pub fn import(text: &str) -> Result<TableId, ResourceError> {
    Ok(text.parse::<TableId>().map_err(ValidationError::from)?)
}

/// Import an id and read the table it names
pub async fn import_existing<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    text: &str,
) -> Result<ObservedState, ResourceError> {
    let id = import(text)?;
    read_existing(api, ctx, &id).await
}

async fn read_existing<A: TableApi>(
    api: &A,
    ctx: &OperationContext,
    id: &TableId,
) -> Result<ObservedState, ResourceError> {
    read(api, ctx, id)
        .await?
        .present()
        .ok_or_else(|| ResourceError::NotFound { id: id.to_string() })
}

async fn capacity_mode<A: TableApi>(
    api: &A,
    account: &AccountId,
) -> Result<CapacityMode, ResourceError> {
    match api.get_account(account).await {
        Ok(Lookup::Found(found)) => {
            if found.id.as_deref().map_or(true, str::is_empty) {
                return Err(ResourceError::remote(
                    "reading",
                    account,
                    ApiError::InvalidResponse("database account id is empty".to_string()),
                ));
            }
            Ok(found.capacity_mode())
        },
        Ok(Lookup::Absent) => Err(ResourceError::NotFound {
            id: account.to_string(),
        }),
        Err(err) => Err(ResourceError::remote("reading", account, err)),
    }
}
