use crate::{
    api::{EcsApi, ElbApi, TargetHealth},
    source::{unique, ApiFailure, NoEndpoints},
};
use awsecssrv_core::{AddressSet, Endpoint, EndpointSource, Error, ServiceIdentity};
use std::net::SocketAddr;
use tracing::{debug, trace};

/// Discovers a service's endpoints from the healthy targets of a load
/// balancer target group.
///
/// The identity's service name names the target group; the authority only
/// labels the target. Each healthy instance target contributes its private IP
/// with the target's registered port.
#[derive(Clone, Debug)]
pub struct TargetGroupSource<A> {
    api: A,
}

// === impl TargetGroupSource ===

impl<A: ElbApi + EcsApi> TargetGroupSource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait::async_trait]
impl<A: ElbApi + EcsApi> EndpointSource for TargetGroupSource<A> {
    async fn list(&self, id: &ServiceIdentity) -> Result<AddressSet, Error> {
        let target_group = id.service_name();
        let failed = |op: &'static str| ApiFailure::on(op, "target group", target_group);

        let targets = self
            .api
            .describe_target_health(target_group)
            .await
            .map_err(failed("DescribeTargetHealth"))?;
        let healthy = targets.iter().filter_map(healthy_target).collect::<Vec<_>>();
        if healthy.is_empty() {
            return Err(NoEndpoints::new(id).into());
        }

        let ips = self
            .api
            .instance_private_ips(&unique(healthy.iter().map(|(id, _)| *id)))
            .await
            .map_err(failed("DescribeInstances"))?;

        let addrs = healthy
            .into_iter()
            .filter_map(|(instance, port)| match ips.get(instance) {
                Some(ip) => Some(Endpoint::from(SocketAddr::new(*ip, port))),
                None => {
                    debug!(%instance, "No private IP for target");
                    None
                }
            })
            .collect::<AddressSet>();
        if addrs.is_empty() {
            return Err(NoEndpoints::new(id).into());
        }

        debug!(svc = %id, %addrs, "Listed healthy targets");
        Ok(addrs)
    }
}

fn healthy_target(target: &TargetHealth) -> Option<(&str, u16)> {
    if !target.is_healthy() {
        trace!(instance = %target.instance_id, state = %target.state, "Skipping target");
        return None;
    }
    let port = target.port?;
    Some((target.instance_id.as_str(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ContainerInstance, Task};
    use std::{collections::HashMap, net::IpAddr};

    #[derive(Default)]
    struct MockApi {
        targets: Vec<TargetHealth>,
        ips: HashMap<String, IpAddr>,
        fail_health: bool,
        looked_up: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ElbApi for MockApi {
        async fn describe_target_health(
            &self,
            target_group: &str,
        ) -> Result<Vec<TargetHealth>, Error> {
            assert_eq!(target_group, "hello-tg");
            if self.fail_health {
                return Err("access denied".into());
            }
            Ok(self.targets.clone())
        }
    }

    #[async_trait::async_trait]
    impl EcsApi for MockApi {
        async fn list_tasks(&self, _: &str, _: &str) -> Result<Vec<String>, Error> {
            unreachable!("target groups are not listed through ECS")
        }

        async fn describe_tasks(&self, _: &str, _: &[String]) -> Result<Vec<Task>, Error> {
            unreachable!("target groups are not listed through ECS")
        }

        async fn describe_container_instances(
            &self,
            _: &str,
            _: &[String],
        ) -> Result<Vec<ContainerInstance>, Error> {
            unreachable!("target groups are not listed through ECS")
        }

        async fn instance_private_ips(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, IpAddr>, Error> {
            self.looked_up.lock().extend(ids.iter().cloned());
            Ok(self
                .ips
                .iter()
                .filter(|(id, _)| ids.contains(*id))
                .map(|(id, ip)| (id.clone(), *ip))
                .collect())
        }
    }

    fn target(instance: &str, port: u16, state: &str) -> TargetHealth {
        TargetHealth {
            instance_id: instance.to_string(),
            port: Some(port),
            state: state.to_string(),
        }
    }

    fn hello() -> ServiceIdentity {
        ServiceIdentity::new("internal-alb", "hello-tg")
    }

    fn ips() -> HashMap<String, IpAddr> {
        vec![
            ("i-1".to_string(), IpAddr::from([10, 0, 0, 1])),
            ("i-2".to_string(), IpAddr::from([10, 0, 0, 2])),
            ("i-3".to_string(), IpAddr::from([10, 0, 0, 3])),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lists_healthy_targets() {
        let _trace = awsecssrv_tracing::test::trace_init();
        let api = MockApi {
            targets: vec![
                target("i-1", 32768, "healthy"),
                target("i-1", 32769, "healthy"),
                target("i-2", 32768, "unhealthy"),
                target("i-3", 32770, "draining"),
                TargetHealth {
                    port: None,
                    ..target("i-3", 0, "healthy")
                },
            ],
            ips: ips(),
            ..MockApi::default()
        };
        let source = TargetGroupSource::new(api);

        let addrs = source.list(&hello()).await.unwrap();
        let expected = ["10.0.0.1:32768", "10.0.0.1:32769"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect::<AddressSet>();
        assert_eq!(addrs, expected);
        assert_eq!(
            *source.api().looked_up.lock(),
            vec!["i-1".to_string()],
            "only healthy instances are looked up, once each"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn no_healthy_targets_is_an_error() {
        let api = MockApi {
            targets: vec![target("i-1", 32768, "unhealthy")],
            ips: ips(),
            ..MockApi::default()
        };
        let source = TargetGroupSource::new(api);
        let err = source.list(&hello()).await.unwrap_err();
        assert!(awsecssrv_core::is_caused_by::<NoEndpoints>(&*err));
        assert!(source.api().looked_up.lock().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn targets_without_an_ip_are_skipped() {
        let api = MockApi {
            targets: vec![
                target("i-1", 32768, "healthy"),
                target("i-gone", 32768, "healthy"),
            ],
            ips: ips(),
            ..MockApi::default()
        };
        let addrs = TargetGroupSource::new(api).list(&hello()).await.unwrap();
        assert_eq!(addrs, AddressSet::new(vec!["10.0.0.1:32768".parse().unwrap()]));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn health_failures_are_errors() {
        let api = MockApi {
            fail_health: true,
            ..MockApi::default()
        };
        let err = TargetGroupSource::new(api).list(&hello()).await.unwrap_err();
        let failure =
            awsecssrv_core::cause_ref::<ApiFailure>(&*err).expect("must be an API failure");
        assert_eq!(
            failure.to_string(),
            "DescribeTargetHealth failed for target group hello-tg"
        );
    }
}
