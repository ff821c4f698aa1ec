use cloudgate_address::{AddressEngine, EngineSettings, LegacyAddressApi, NoLegacyPool};
use cloudgate_cloud::FileStore;
use cloudgate_cloud_openstack::{Ec2Cli, OpenStackCli};
use cloudgate_config::GatewayConfig;
use std::sync::Arc;

/// Wire the engine to the OpenStack CLI, the file store and the legacy pool
pub fn build_engine(config: &GatewayConfig) -> AddressEngine {
    let mut backend = OpenStackCli::new();
    if let Some(cloud) = &config.openstack_cloud {
        backend = backend.with_cloud(cloud);
    }
    if let Some(region) = &config.region {
        backend = backend.with_region(region);
    }

    let legacy: Arc<dyn LegacyAddressApi> = match &config.legacy_endpoint {
        Some(endpoint) => {
            tracing::debug!("Proxying standard-domain requests to {}", endpoint);
            let mut ec2 = Ec2Cli::new(endpoint);
            if let Some(region) = &config.region {
                ec2 = ec2.with_region(region);
            }
            Arc::new(ec2)
        }
        None => Arc::new(NoLegacyPool),
    };

    AddressEngine::new(
        Arc::new(backend),
        Arc::new(FileStore::new(&config.state_dir)),
        legacy,
        EngineSettings::new(&config.external_network, &config.project_id),
    )
}
