//! Reconciliation of a single Workload.
//!
//! Every pass is level-triggered: the Workload is read fresh from the cluster, the desired
//! ServiceAccount is rebuilt from its spec and applied unconditionally, and the outcome is
//! recorded in the `Available` condition. Nothing is carried over between passes.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::runtime::{controller::Action, reflector::ObjectRef};
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

use crate::api::v1::workload::Workload;
use crate::controllers::service_account::build_service_account;
use crate::controllers::workload_controller::Context;
use crate::util::errors::{Error, Result, StdError};
use crate::util::status::{
    is_status_condition_true, set_status_condition, ConditionStatus, AVAILABLE_CONDITION, RECONCILING_REASON,
};

/// Drive the ServiceAccount owned by the Workload at `key` towards its desired state.
///
/// A Workload that no longer exists is not an error. Failures to apply the ServiceAccount
/// are recorded on the Workload status before being returned; failures to write status are
/// always returned.
pub async fn reconcile_workload(key: &ObjectRef<Workload>, ctx: &Context) -> Result<Action> {
    info!("reconciling Workload");

    let Some(mut workload) = fetch(key, ctx).await? else {
        info!("workload resource not found, ignoring since object must be deleted");
        return Ok(Action::await_change());
    };

    if workload.conditions().is_empty() {
        set_available(&mut workload, ConditionStatus::Unknown, "Starting reconciliation".to_string());
        write_status(&workload, ctx).await?;

        // The status write bumped the resourceVersion, continue from the stored copy
        workload = match fetch(key, ctx).await? {
            Some(workload) => workload,
            None => {
                info!("workload deleted while initializing status");
                return Ok(Action::await_change());
            }
        };
    }

    info!("reconciling ServiceAccount object");
    let desired = build_service_account(&workload, &ctx.kinds).map_err(Error::BuildError)?;
    let sa_name = desired.name_any();

    info!(service_account = %sa_name, "applying changes for ServiceAccount");
    let applied = match ctx.client.apply_service_account(&desired).await {
        Ok(applied) => applied,
        Err(apply_error) => {
            error!(service_account = %sa_name, "failed to apply ServiceAccount: {apply_error}");
            set_available(
                &mut workload,
                ConditionStatus::False,
                format!("Failed to create/update the Service Account ({sa_name}): ({apply_error})"),
            );
            write_status(&workload, ctx).await?;
            return Err(Error::ApplyError(apply_error));
        }
    };

    let mut changed = false;
    match ctx.kinds.resolve(&applied) {
        Ok(reference) => {
            let status = workload.status.get_or_insert_with(Default::default);
            if status.service_account_ref.as_ref() != Some(&reference) {
                status.service_account_ref = Some(reference);
                changed = true;
            }
        }
        Err(e) => warn!(service_account = %sa_name, "unable to make reference to ServiceAccount: {e}"),
    }

    let was_available = is_status_condition_true(workload.conditions(), AVAILABLE_CONDITION);
    let message = format!(
        "ServiceAccount for custom resource ({}) created successfully",
        workload.name_any()
    );
    changed |= set_available(&mut workload, ConditionStatus::True, message);
    if !was_available {
        info!(service_account = %sa_name, "workload is now available");
    }

    if changed {
        write_status(&workload, ctx).await?;
    } else {
        debug!("status already up to date");
    }

    info!("reconciled Workload");
    Ok(Action::await_change())
}

async fn fetch(key: &ObjectRef<Workload>, ctx: &Context) -> Result<Option<Workload>> {
    let namespace = key
        .namespace
        .as_deref()
        .ok_or_else(|| Error::StdError(StdError::MetadataMissing(format!("namespace of {}", key.name))))?;

    ctx.client.get_workload(namespace, &key.name).await.map_err(|e| {
        error!("failed to get workload: {e}");
        Error::StdError(e)
    })
}

async fn write_status(workload: &Workload, ctx: &Context) -> Result<()> {
    ctx.client.replace_workload_status(workload).await.map_err(|e| {
        error!("failed to update Workload status: {e}");
        Error::StatusWriteError(e)
    })?;
    Ok(())
}

/// Upsert the `Available` condition, returns whether the status changed
fn set_available(workload: &mut Workload, status: ConditionStatus, message: String) -> bool {
    let condition = Condition {
        type_: AVAILABLE_CONDITION.to_string(),
        status: status.to_string(),
        reason: RECONCILING_REASON.to_string(),
        message,
        last_transition_time: Time(Utc::now()),
        observed_generation: workload.metadata.generation,
    };
    let status = workload.status.get_or_insert_with(Default::default);
    set_status_condition(&mut status.conditions, condition)
}
