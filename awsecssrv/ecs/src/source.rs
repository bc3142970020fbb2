use crate::api::{EcsApi, Task};
use awsecssrv_core::{AddressSet, Endpoint, EndpointSource, Error, ServiceIdentity};
use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Discovers a service's endpoints from its running ECS tasks.
///
/// The identity's authority names the ECS cluster. Each running task whose
/// first container publishes a host port contributes one endpoint: the
/// private IP of the EC2 instance hosting the task, with that host port.
#[derive(Clone, Debug)]
pub struct EcsSource<A> {
    api: A,
}

#[derive(Clone, Debug, Error)]
#[error("{0} has no usable endpoints")]
pub struct NoEndpoints(ServiceIdentity);

#[derive(Debug, Error)]
#[error("{op} failed for {scope} {name}")]
pub struct ApiFailure {
    op: &'static str,
    scope: &'static str,
    name: String,
    #[source]
    source: Error,
}

// === impl EcsSource ===

impl<A: EcsApi> EcsSource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait::async_trait]
impl<A: EcsApi> EndpointSource for EcsSource<A> {
    async fn list(&self, id: &ServiceIdentity) -> Result<AddressSet, Error> {
        let cluster = id.authority();
        let no_endpoints = || Error::from(NoEndpoints::new(id));
        let failed = |op: &'static str| ApiFailure::on(op, "cluster", cluster);

        let task_arns = self
            .api
            .list_tasks(cluster, id.service_name())
            .await
            .map_err(failed("ListTasks"))?;
        if task_arns.is_empty() {
            return Err(no_endpoints());
        }

        let tasks = self
            .api
            .describe_tasks(cluster, &task_arns)
            .await
            .map_err(failed("DescribeTasks"))?;
        let bound = tasks.iter().filter_map(bound_task).collect::<Vec<_>>();
        if bound.is_empty() {
            return Err(no_endpoints());
        }

        let instance_arns = unique(bound.iter().map(|(arn, _)| *arn));
        let instances = self
            .api
            .describe_container_instances(cluster, &instance_arns)
            .await
            .map_err(failed("DescribeContainerInstances"))?;
        let ec2_ids = instances
            .iter()
            .filter_map(|ci| Some((ci.arn.as_str(), ci.ec2_instance_id.as_deref()?)))
            .collect::<HashMap<_, _>>();

        let ips = self
            .api
            .instance_private_ips(&unique(ec2_ids.values().copied()))
            .await
            .map_err(failed("DescribeInstances"))?;

        let addrs = bound
            .into_iter()
            .filter_map(|(instance_arn, port)| {
                let ip = ec2_ids.get(instance_arn).and_then(|id| ips.get(*id));
                if ip.is_none() {
                    debug!(%instance_arn, "No private IP for container instance");
                }
                ip.map(|ip| Endpoint::from(SocketAddr::new(*ip, port)))
            })
            .collect::<AddressSet>();
        if addrs.is_empty() {
            return Err(no_endpoints());
        }

        debug!(svc = %id, %addrs, "Listed endpoints");
        Ok(addrs)
    }
}

/// Returns the container instance and host port of a task that can serve
/// traffic.
fn bound_task(task: &Task) -> Option<(&str, u16)> {
    if !task.is_running() {
        trace!(task = %task.arn, status = %task.desired_status, "Skipping task");
        return None;
    }
    let Some(port) = task.host_port() else {
        trace!(task = %task.arn, "Skipping task without a host port");
        return None;
    };
    let instance = task.container_instance_arn.as_deref()?;
    Some((instance, port))
}

pub(crate) fn unique<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

// === impl ApiFailure ===

impl ApiFailure {
    pub(crate) fn on<'a>(
        op: &'static str,
        scope: &'static str,
        name: &'a str,
    ) -> impl FnOnce(Error) -> Self + 'a {
        move |source| Self {
            op,
            scope,
            name: name.to_string(),
            source,
        }
    }
}

// === impl NoEndpoints ===

impl NoEndpoints {
    pub(crate) fn new(id: &ServiceIdentity) -> Self {
        Self(id.clone())
    }
}
