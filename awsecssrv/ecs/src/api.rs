//! The subset of the ECS, ELB and EC2 APIs needed to discover service
//! endpoints.

use awsecssrv_core::Error;
use std::{collections::HashMap, net::IpAddr, sync::Arc};

pub const RUNNING: &str = "RUNNING";

/// The target health state of a target that receives traffic.
pub const HEALTHY: &str = "healthy";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Task {
    pub arn: String,
    pub desired_status: String,
    pub container_instance_arn: Option<String>,
    pub containers: Vec<Container>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    pub network_bindings: Vec<NetworkBinding>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkBinding {
    pub container_port: Option<u16>,
    pub host_port: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerInstance {
    pub arn: String,
    pub ec2_instance_id: Option<String>,
}

/// One registered target of a load balancer target group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetHealth {
    pub instance_id: String,
    pub port: Option<u16>,
    pub state: String,
}

/// A client bound to one set of AWS credentials and one region.
#[async_trait::async_trait]
pub trait EcsApi: Send + Sync {
    /// Lists the ARNs of the tasks that belong to `service` in `cluster`.
    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>, Error>;

    async fn describe_tasks(&self, cluster: &str, task_arns: &[String])
        -> Result<Vec<Task>, Error>;

    async fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> Result<Vec<ContainerInstance>, Error>;

    /// Maps EC2 instance IDs to their private IP addresses. Unknown instances
    /// are omitted.
    async fn instance_private_ips(
        &self,
        instance_ids: &[String],
    ) -> Result<HashMap<String, IpAddr>, Error>;
}

#[async_trait::async_trait]
impl<A: EcsApi + ?Sized> EcsApi for Arc<A> {
    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>, Error> {
        (**self).list_tasks(cluster, service).await
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<Task>, Error> {
        (**self).describe_tasks(cluster, task_arns).await
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> Result<Vec<ContainerInstance>, Error> {
        (**self).describe_container_instances(cluster, arns).await
    }

    async fn instance_private_ips(
        &self,
        instance_ids: &[String],
    ) -> Result<HashMap<String, IpAddr>, Error> {
        (**self).instance_private_ips(instance_ids).await
    }
}

/// Load balancer target health, for clients that can reach ELBv2.
#[async_trait::async_trait]
pub trait ElbApi: Send + Sync {
    /// Describes every target registered with the named target group, in
    /// any health state.
    async fn describe_target_health(&self, target_group: &str)
        -> Result<Vec<TargetHealth>, Error>;
}

#[async_trait::async_trait]
impl<A: ElbApi + ?Sized> ElbApi for Arc<A> {
    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> Result<Vec<TargetHealth>, Error> {
        (**self).describe_target_health(target_group).await
    }
}

impl Task {
    /// Returns the host port of the task's first container's first binding.
    pub fn host_port(&self) -> Option<u16> {
        self.containers.first()?.network_bindings.first()?.host_port
    }

    pub fn is_running(&self) -> bool {
        self.desired_status == RUNNING
    }
}

impl TargetHealth {
    pub fn is_healthy(&self) -> bool {
        self.state == HEALTHY
    }
}
