//! Relayer binary (spec.md §4.6, §4.7, §6.3).
//!
//! Loads a [`RelayerConfig`], wires up whichever destination submitters
//! have their environment variables configured, runs the Attestation
//! Fetcher against every configured attester base URL, and dispatches
//! each newly-seen [`ReadyAttestation`] to its destination.
//!
//! Exit codes follow spec.md §6.3: `0` on clean graceful shutdown, `1` on
//! a configuration error (nothing started), `2` on an unrecoverable
//! runtime error.

mod handlers;
mod shutdown;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use axum::http::Method;
use bridge_evm::{EvmSubmitter, submitter::GasPolicy};
use bridge_relayer::dispatcher::Destination;
use bridge_relayer::{AttestationFetcher, RelayDispatcher, RelayerConfig, RelayerMetrics};
use bridge_substrate::submitter::RelayerAccount;
use bridge_substrate::SubstrateSubmitter;
use bridge_types::domain::Domain;
use subxt::{OnlineClient, SubstrateConfig};
use tower_http::cors;
use tracing::{info, warn};

use crate::handlers::RelayerApp;
use crate::shutdown::SigDown;

/// EVM-family destination chains the relayer knows how to submit to,
/// keyed by the `<PREFIX>_RPC_URL` environment variable it reads
/// (spec.md §6.3), mirroring `attester`'s `EVM_CHAINS` list.
const EVM_DESTINATIONS: &[(&str, Domain)] = &[
    ("ETH", Domain::EVM_ETHEREUM),
    ("POLYGON", Domain::POLYGON),
    ("ARBITRUM", Domain::ARBITRUM),
    ("BNB", Domain::BNB),
    ("BASE", Domain::BASE),
];

fn build_evm_destinations(
    config: &RelayerConfig,
    destinations: &mut HashMap<Domain, Destination>,
) {
    let (Some(key_bytes), Some(address_raw)) = (&config.evm_private_key, &config.evm_address) else {
        return;
    };
    let key = B256::from_slice(key_bytes);
    let Ok(signer) = PrivateKeySigner::from_bytes(&key) else {
        warn!("RELAYER_PRIVATE_KEY did not parse as a valid secp256k1 key");
        return;
    };
    let Ok(destination_address) = Address::from_str(address_raw) else {
        warn!(address = %address_raw, "TOKEN_MESSENGER_ADDRESS did not parse");
        return;
    };

    for &(prefix, domain) in EVM_DESTINATIONS {
        let Ok(rpc_url) = std::env::var(format!("{prefix}_RPC_URL")) else {
            continue;
        };
        let Ok(rpc_url) = url::Url::parse(rpc_url.split(',').next().unwrap_or(&rpc_url)) else {
            continue;
        };
        let submitter = EvmSubmitter::new(rpc_url, signer.clone(), destination_address)
            .with_retry_policy(config.max_retries, config.retry_delay)
            .with_gas_policy(GasPolicy {
                max_fee_per_gas: config.max_fee_per_gas,
                max_priority_fee_per_gas: config.max_priority_fee_per_gas,
                gas_limit: config.gas_limit,
            });
        info!(chain = prefix, "configured EVM destination submitter");
        destinations.insert(domain, Destination::Evm(submitter));
    }
}

async fn build_substrate_destination(config: &RelayerConfig, destinations: &mut HashMap<Domain, Destination>) {
    let Some(seed) = config.substrate_sr25519_seed else {
        return;
    };
    let Ok(ws_url) = std::env::var("SUBSTRATE_WS_URL") else {
        warn!("RELAYER_SR25519_SEED set but SUBSTRATE_WS_URL is not; skipping Substrate destination");
        return;
    };
    let first_url = ws_url.split(',').next().unwrap_or(&ws_url);
    let client = match OnlineClient::<SubstrateConfig>::from_url(first_url).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to connect to Substrate destination");
            return;
        }
    };
    let account = RelayerAccount::from_seed(seed);
    let submitter = SubstrateSubmitter::new(client, account).with_retry_policy(config.max_retries, config.retry_delay);
    info!("configured Substrate destination submitter");
    destinations.insert(Domain::SUBSTRATE, Destination::Substrate(submitter));
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match RelayerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let mut destinations: HashMap<Domain, Destination> = HashMap::new();
    build_evm_destinations(&config, &mut destinations);
    build_substrate_destination(&config, &mut destinations).await;

    if destinations.is_empty() {
        tracing::error!("no destination submitters configured; this relayer would have nothing to submit to");
        std::process::exit(1);
    }

    let metrics = Arc::new(RelayerMetrics::new());
    let fetcher = Arc::new(AttestationFetcher::new(
        config.attester_urls.clone(),
        config.poll_interval,
        config.fetch_timeout,
        config.dedupe_capacity,
        Arc::clone(&metrics),
    ));
    let dispatcher = Arc::new(RelayDispatcher::new(
        destinations,
        config.attester_urls.clone(),
        Arc::clone(&metrics),
    ));

    let sig_down = match SigDown::try_new() {
        Ok(sig_down) => sig_down,
        Err(e) => {
            tracing::error!(error = %e, "failed to register signal handlers");
            std::process::exit(2);
        }
    };
    let cancellation = sig_down.cancellation_token();

    // Adapter -> canonicalizer -> store channels are bounded at 1024
    // (spec.md §5); the fetcher -> dispatcher hop uses the same default so
    // a slow destination chain applies the same backpressure to polling.
    let (tx, mut rx) = tokio::sync::mpsc::channel(1024);

    let fetcher_task = {
        let fetcher = Arc::clone(&fetcher);
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            fetcher.run(tx, cancellation).await;
        })
    };

    let dispatch_task = {
        let dispatcher = Arc::clone(&dispatcher);
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    ready = rx.recv() => {
                        match ready {
                            Some(ready) => {
                                let message_id = ready.message_id;
                                if let Err(e) = dispatcher.dispatch(ready).await {
                                    warn!(%message_id, error = %e, "dispatch did not complete");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        })
    };

    let app = Arc::new(RelayerApp {
        fetcher,
        metrics,
        started_at_ms: bridge_relayer::metrics::now_ms(),
    });
    let router = handlers::routes(app).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    info!(%addr, "starting relayer HTTP surface");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    let graceful_shutdown = {
        let cancellation = cancellation.clone();
        async move { cancellation.cancelled().await }
    };
    if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(graceful_shutdown).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(2);
    }

    cancellation.cancel();
    let _ = tokio::join!(fetcher_task, dispatch_task);
    info!("shut down cleanly");
}
