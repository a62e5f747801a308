use std::sync::Arc;
use vmware_exporter::bootstrap::init_service;
use vmware_exporter::config::{
    Configuration, get_config_base_path, print_config, should_print_config_and_exit,
};
use vmware_exporter::datasource::VsphereClient;
use vmware_exporter::logging::setup_logging;
use vmware_exporter::server::start_server;
use vmware_exporter::server::state::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let configuration = Configuration::load(get_config_base_path(std::env::args())?)?;
    if should_print_config_and_exit(std::env::args()) {
        print_config(&configuration)?;
        return Ok(());
    }

    configuration.validate()?;

    let _guard = setup_logging(&configuration.log)?;
    tracing::info!("Starting VMware exporter");

    let client = Arc::new(VsphereClient::login(&configuration.vsphere).await?);
    let service =
        match init_service(&configuration, client.clone(), prometheus::Registry::new()).await {
            Ok(service) => Arc::new(service),
            Err(error) => {
                sign_out(&client).await;
                return Err(error.into());
            }
        };

    let state = AppState {
        configuration: Arc::new(configuration),
        service: service.clone(),
    };

    let served = start_server(state).await;

    if let Err(error) = service.stop().await {
        tracing::error!(%error, "Collection service did not stop cleanly");
    }

    sign_out(&client).await;

    served?;
    tracing::info!("Bye!");

    Ok(())
}

async fn sign_out(client: &VsphereClient) {
    if let Err(error) = client.logout().await {
        tracing::warn!(%error, "Failed to sign out of vSphere");
    }
}
