//! Failure domains of the region a cluster lives in.
//!
//! Multi AD regions spread machines across availability domains, single AD regions across the
//! fault domains of their only availability domain.

use std::collections::BTreeMap;

use capoci_core::resources::crd::v1beta1::{FailureDomainSpec, FailureDomains, OciAvailabilityDomain};
use log::{error, info};

use crate::{error::ReconcilerError, scope::ClusterScope};

pub const AVAILABILITY_DOMAIN_ATTRIBUTE: &str = "AvailabilityDomain";
pub const FAULT_DOMAIN_ATTRIBUTE: &str = "FaultDomain";

/// Fills in `availabilityDomains` and `failureDomains` unless they were already discovered.
pub async fn reconcile_failure_domains(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    if scope
        .accessor
        .status()
        .is_some_and(|status| status.failure_domains.is_some())
    {
        return Ok(());
    }

    let identity = scope.clients.identity.clone();
    let compartment_id = scope.compartment_id().to_owned();
    let availability_domains = identity
        .list_availability_domains(&compartment_id)
        .await
        .map_err(ReconcilerError::cloud("list availability domains"))?;

    let count = availability_domains.len();
    if count != 1 && count != 3 {
        let message = format!(
            "invalid number of Availability Domains, should be either 1 or 3, but got {count}"
        );
        error!("{message}");

        return Err(ReconcilerError::Configuration(message));
    }

    let mut domains = BTreeMap::new();
    for availability_domain in &availability_domains {
        let fault_domains = identity
            .list_fault_domains(&compartment_id, &availability_domain.name)
            .await
            .map_err(ReconcilerError::cloud("list fault domains"))?;

        domains.insert(
            availability_domain.name.clone(),
            OciAvailabilityDomain {
                name: availability_domain.name.clone(),
                fault_domains: fault_domains.into_iter().map(|fd| fd.name).collect(),
            },
        );
    }

    let failure_domains = if count == 3 {
        availability_domains
            .iter()
            .enumerate()
            .map(|(index, ad)| {
                (
                    (index + 1).to_string(),
                    failure_domain([(AVAILABILITY_DOMAIN_ATTRIBUTE, ad.name.as_str())]),
                )
            })
            .collect::<FailureDomains>()
    } else {
        let name = &availability_domains[0].name;

        domains
            .get(name)
            .map(|ad| ad.fault_domains.as_slice())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(index, fd)| {
                (
                    (index + 1).to_string(),
                    failure_domain([
                        (AVAILABILITY_DOMAIN_ATTRIBUTE, name.as_str()),
                        (FAULT_DOMAIN_ATTRIBUTE, fd.as_str()),
                    ]),
                )
            })
            .collect()
    };

    info!(
        "Discovered {} failure domain(s) for cluster {}/{}",
        failure_domains.len(),
        scope.namespace(),
        scope.name()
    );

    let status = scope.accessor.status_mut();
    status.availability_domains = Some(domains);
    status.failure_domains = Some(failure_domains);

    Ok(())
}

fn failure_domain<const N: usize>(attributes: [(&str, &str); N]) -> FailureDomainSpec {
    FailureDomainSpec {
        control_plane: true,
        attributes: Some(
            attributes
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect(),
        ),
    }
}
