// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use appservice_controller::appservice_controller::exec::reconciler::AppServiceReconciler;
use appservice_controller::appservice_controller::trusted::spec_types::AppService;
use appservice_controller::config::ControllerConfig;
use appservice_controller::external_shim_layer::BackoffShimLayer;
use appservice_controller::shim_layer::controller_runtime::run_controller;
use appservice_controller::shim_layer::fault_injection::CrashPlan;
use clap::{Parser, Subcommand};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{api::Api, Client, CustomResourceExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "appservice-controller", about = "Runs the AppService controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the AppService CustomResourceDefinition as YAML
    Export,
    /// Run the controller
    Run(ControllerConfig),
    /// Run the controller and crash right after the given write, to test crash recovery
    Crash {
        #[command(flatten)]
        config: ControllerConfig,
        #[arg(long, default_value_t = 1)]
        crash_after_writes: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Export => {
            println!("{}", serde_yaml::to_string(&AppService::crd())?);
        }
        Command::Run(config) => {
            info!("running appservice-controller");
            run(config, None).await?;
        }
        Command::Crash {
            config,
            crash_after_writes,
        } => {
            info!(crash_after_writes, "running appservice-controller in crash-testing mode");
            run(config, Some(CrashPlan::new(crash_after_writes))).await?;
        }
    }
    Ok(())
}

async fn run(config: ControllerConfig, fault_injection: Option<CrashPlan>) -> Result<()> {
    let client = Client::try_default().await?;
    let reconciler = AppServiceReconciler::new(config.retry_policy());
    let external = BackoffShimLayer::new(config.conflict_jitter);
    let deployments = Api::<Deployment>::all(client.clone());
    let services = Api::<Service>::all(client.clone());
    let ingresses = Api::<Ingress>::all(client.clone());
    run_controller::<AppService, _, _, _>(client, reconciler, external, config, fault_injection, |controller| {
        controller
            .owns(deployments, Default::default())
            .owns(services, Default::default())
            .owns(ingresses, Default::default())
    })
    .await
}
