//! ecoNET boiler service (`boilersrv`)

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use boilersrv::bootstrap::{self, Args, Command};
use boilersrv::{runtime, AppConfig, Coordinator};
use common::service_bootstrap::ServiceInfo;
use econet_protocol::{DeviceClient, EconetDevice, ParamValue, ParameterMap};
use errors::{EconetError, EconetResult};

#[tokio::main]
async fn main() -> EconetResult<()> {
    let result = dispatch(Args::parse()).await;
    if let Err(e) = &result {
        error!("{} [{}]", e, e.error_code());
    }
    result
}

async fn dispatch(args: Args) -> EconetResult<()> {
    let service = bootstrap::service_info();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            // console logging so the failure is visible
            bootstrap::initialize_logging(&args, None, &service)?;
            return Err(e);
        },
    };
    bootstrap::initialize_logging(&args, Some(&config), &service)?;

    // Validation mode: validate and exit
    if args.validate {
        bootstrap::validate_configuration(&config)?;
        info!("Validation completed successfully");
        return Ok(());
    }

    let params = bootstrap::load_parameter_map(&config)?;
    let device = bootstrap::build_device(&config, Arc::clone(&params))?;

    match args.command() {
        Command::Run => run(&args, &config, &service, device).await,
        Command::Get { slug, retries } => match device.get_value(&slug, retries).await? {
            Some(value) => {
                println!("{} = {}", slug, value);
                Ok(())
            },
            None => Err(EconetError::Unavailable(slug)),
        },
        Command::Set { slug, value } => set_once(&device, &params, &slug, &value).await,
        Command::List => {
            list(&params);
            Ok(())
        },
    }
}

async fn run(
    args: &Args,
    config: &AppConfig,
    service: &ServiceInfo,
    device: EconetDevice,
) -> EconetResult<()> {
    if !args.no_color {
        common::service_bootstrap::print_startup_banner(service);
    }

    let coordinator = Arc::new(Coordinator::new(
        Arc::new(device),
        config.slugs.iter().cloned(),
        config.coordinator_config(),
    ));
    let (poll_handle, poll_token) = runtime::start_poll_loop(
        Arc::clone(&coordinator),
        config.coordinator.update_interval(),
    );
    info!(
        "Polling {} slugs every {}s",
        config.slugs.len(),
        config.coordinator.update_interval_secs
    );

    common::shutdown::wait_for_shutdown().await;
    info!("Shutdown signal received");

    poll_token.cancel();
    if let Err(e) = poll_handle.await {
        error!("Poll loop ended abnormally: {}", e);
    }
    coordinator.shutdown().await;

    info!("Service shutdown complete");
    Ok(())
}

async fn set_once(
    device: &EconetDevice,
    params: &ParameterMap,
    slug: &str,
    input: &str,
) -> EconetResult<()> {
    let def = params
        .get(slug)
        .ok_or_else(|| EconetError::UnknownParameter(slug.to_string()))?;
    let value = ParamValue::parse_for(input, def.data_type)?;

    if device.set_value(slug, &value, None).await? {
        println!("{} <- {}", slug, value);
        Ok(())
    } else {
        Err(EconetError::Timeout(format!("{} <- {}", slug, value)))
    }
}

fn list(params: &ParameterMap) {
    for slug in params.slugs() {
        if let Some(def) = params.get(slug) {
            println!(
                "{:<32} id={:<6} {:<10} exp={}",
                slug, def.id, def.data_type, def.exponent
            );
        }
    }
}
