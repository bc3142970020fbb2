use awsecssrv_core::ServiceIdentity;

/// The entity kind segment of ECS service endpoint cache keys.
pub const ENTITY_KIND: &str = "AwsEcsServiceEndpoint";

/// The entity kind segment of target group endpoint cache keys.
pub const TARGET_GROUP_ENTITY_KIND: &str = "AwsElbTargetGroupEndpoint";

pub const DEFAULT_NAMESPACE: &str = "ZA";

/// Builds cache keys of the form `<namespace>:<EntityKind>:<serviceName>`.
///
/// The entity kind keeps names from different sources apart within one
/// namespace.
///
/// The authority is not part of the key: resolvers for the same service name
/// share one entry regardless of the cluster they were built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFormat {
    namespace: String,
    entity_kind: &'static str,
}

impl KeyFormat {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entity_kind: ENTITY_KIND,
        }
    }

    pub fn with_entity_kind(self, entity_kind: &'static str) -> Self {
        Self {
            entity_kind,
            ..self
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity_kind(&self) -> &str {
        self.entity_kind
    }

    pub fn key(&self, id: &ServiceIdentity) -> String {
        format!("{}:{}:{}", self.namespace, self.entity_kind, id.service_name())
    }
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
