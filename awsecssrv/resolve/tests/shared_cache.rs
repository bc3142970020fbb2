#![deny(rust_2018_idioms)]

use awsecssrv_cache::{KeyFormat, MemoryCache};
use awsecssrv_core::{AddressSet, Error, SharedCache, Ttl};
use awsecssrv_ecs::{
    Container, ContainerInstance, EcsApi, EcsSource, NetworkBinding, Task, RUNNING,
};
use awsecssrv_resolve::{Config, Discover, ResolverBuilder, ResolverRegistry};
use futures::StreamExt;
use parking_lot::Mutex;
use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, time};
use tower::discover::Change;

/// An ECS inventory whose task ports can be changed between cycles.
#[derive(Default)]
struct Inventory {
    ports: Mutex<Vec<u16>>,
    list_calls: Mutex<usize>,
}

#[async_trait::async_trait]
impl EcsApi for Inventory {
    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<String>, Error> {
        assert_eq!((cluster, service), ("clusterA", "serviceB"));
        *self.list_calls.lock() += 1;
        Ok((0..self.ports.lock().len()).map(|i| format!("task-{i}")).collect())
    }

    async fn describe_tasks(&self, _: &str, arns: &[String]) -> Result<Vec<Task>, Error> {
        let ports = self.ports.lock();
        Ok(arns
            .iter()
            .zip(ports.iter())
            .map(|(arn, port)| Task {
                arn: arn.clone(),
                desired_status: RUNNING.to_string(),
                container_instance_arn: Some("ci-1".to_string()),
                containers: vec![Container {
                    network_bindings: vec![NetworkBinding {
                        container_port: Some(8080),
                        host_port: Some(*port),
                    }],
                }],
            })
            .collect())
    }

    async fn describe_container_instances(
        &self,
        _: &str,
        _: &[String],
    ) -> Result<Vec<ContainerInstance>, Error> {
        Ok(vec![ContainerInstance {
            arn: "ci-1".to_string(),
            ec2_instance_id: Some("i-1".to_string()),
        }])
    }

    async fn instance_private_ips(&self, _: &[String]) -> Result<HashMap<String, IpAddr>, Error> {
        Ok(Some(("i-1".to_string(), IpAddr::from([10, 0, 0, 1])))
            .into_iter()
            .collect())
    }
}

fn registry(api: Arc<Inventory>, cache: Arc<MemoryCache>) -> ResolverRegistry {
    let config = Config {
        ttl: Ttl::DEFAULT,
        keys: KeyFormat::new("TEST"),
    };
    ResolverRegistry::default().with_builder(ResolverBuilder::new(
        Arc::new(EcsSource::new(api)),
        cache,
        config,
    ))
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn resolvers_share_cached_endpoints() {
    let _trace = awsecssrv_tracing::test::trace_init();
    let api = Arc::new(Inventory::default());
    *api.ports.lock() = vec![32768];
    let cache = Arc::new(MemoryCache::default());
    let registry = registry(api.clone(), cache.clone());

    let (tx0, rx0) = watch::channel(AddressSet::default());
    let _r0 = registry
        .build("awsecssrv://clusterA/serviceB", Arc::new(tx0))
        .unwrap();
    let (tx1, rx1) = watch::channel(AddressSet::default());
    let _r1 = registry
        .build("awsecssrv://clusterA/serviceB", Arc::new(tx1))
        .unwrap();

    time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*api.list_calls.lock(), 1, "second resolver must hit the cache");
    let expected = AddressSet::new(vec!["10.0.0.1:32768".parse().unwrap()]);
    assert_eq!(*rx0.borrow(), expected);
    assert_eq!(*rx1.borrow(), expected);
    assert!(cache
        .get("TEST:AwsEcsServiceEndpoint:serviceB")
        .await
        .unwrap()
        .is_some());

    // Entries written at t=0 expire at t=5s, so the t=2.5s cycle still hits.
    time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(*api.list_calls.lock(), 1);

    time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(*api.list_calls.lock(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn inventory_changes_reach_the_balancer() {
    let _trace = awsecssrv_tracing::test::trace_init();
    let api = Arc::new(Inventory::default());
    *api.ports.lock() = vec![32768];
    let registry = registry(api.clone(), Arc::new(MemoryCache::default()));

    let (tx, rx) = watch::channel(AddressSet::default());
    let mut handle = registry
        .build("awsecssrv://clusterA/serviceB", Arc::new(tx))
        .unwrap();
    let mut discover = Discover::from_watch(rx);

    match discover.next().await {
        Some(Ok(Change::Insert(ep, ()))) => assert_eq!(ep.as_str(), "10.0.0.1:32768"),
        _ => panic!("expected an insertion"),
    }

    *api.ports.lock() = vec![32769];
    match discover.next().await {
        Some(Ok(Change::Remove(ep))) => assert_eq!(ep.as_str(), "10.0.0.1:32768"),
        _ => panic!("expected a removal"),
    }
    match discover.next().await {
        Some(Ok(Change::Insert(ep, ()))) => assert_eq!(ep.as_str(), "10.0.0.1:32769"),
        _ => panic!("expected an insertion"),
    }

    handle.close();
    handle.closed().await;
    assert!(discover.next().await.is_none(), "the sink is dropped on close");
}
