//! Attester Service binary (spec.md §4.5, §6.3).
//!
//! Loads an [`AttesterConfig`], connects whichever chain adapters have
//! their environment variables configured, wires them into one
//! [`AttesterService`], and serves the Attestation Store HTTP API.
//!
//! Exit codes follow spec.md §6.3: `0` on a clean graceful shutdown, `1`
//! on a configuration error (nothing started), `2` on an unrecoverable
//! runtime error (mirrored in `bridge_attester::service`'s signing-failure
//! path, which calls `std::process::exit(2)` directly from a spawned
//! task).

mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use bridge_attester::{AttesterConfig, AttestationStore, AttesterService, Metrics, Signer, erase_adapter};
use bridge_evm::{EcdsaSigner, Eip155AdapterConfig, EvmAdapter};
use bridge_solana::{SolanaAdapter, SolanaAdapterConfig};
use bridge_substrate::{Sr25519Signer, SubstrateAdapter, SubstrateAdapterConfig};
use bridge_types::attestation::AttesterIdentity;
use bridge_types::domain::Domain;
use bridge_utxo::{BitcoinAdapter, CardanoAdapter, LedgerAdapterConfig, StellarAdapter, TronAdapter, XrplAdapter};
use tower_http::cors;
use tracing::{info, warn};

use crate::shutdown::SigDown;

/// One EVM-family chain this binary knows how to wire up, keyed by the
/// `<PREFIX>_RPC_URL` environment variable it reads (spec.md §6.3).
const EVM_CHAINS: &[(&str, Domain)] = &[
    ("ETH", Domain::EVM_ETHEREUM),
    ("POLYGON", Domain::POLYGON),
    ("ARBITRUM", Domain::ARBITRUM),
    ("BNB", Domain::BNB),
    ("BASE", Domain::BASE),
];

/// The five polling-only ledger-family chains `bridge-utxo` covers.
const LEDGER_CHAINS: &[&str] = &["BITCOIN", "TRON", "XRPL", "CARDANO", "STELLAR"];

fn has_env(var: &str) -> bool {
    std::env::var(var).is_ok()
}

async fn connect_evm_adapters(adapters: &mut Vec<(String, Arc<dyn bridge_attester::DynAdapter>)>) {
    for &(prefix, domain) in EVM_CHAINS {
        if !has_env(&format!("{prefix}_RPC_URL")) {
            continue;
        }
        let config = match Eip155AdapterConfig::from_env(domain, prefix) {
            Ok(config) => config,
            Err(e) => {
                warn!(chain = prefix, error = %e, "skipping EVM adapter, configuration incomplete");
                continue;
            }
        };
        match EvmAdapter::connect(config).await {
            Ok(adapter) => {
                info!(chain = prefix, "connected EVM adapter");
                adapters.push((prefix.to_lowercase(), erase_adapter(adapter)));
            }
            Err(e) => warn!(chain = prefix, error = %e, "failed to connect EVM adapter"),
        }
    }
}

async fn connect_solana_adapter(adapters: &mut Vec<(String, Arc<dyn bridge_attester::DynAdapter>)>) {
    if !has_env("SOLANA_RPC_URL") {
        return;
    }
    let config = match SolanaAdapterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "skipping Solana adapter, configuration incomplete");
            return;
        }
    };
    match SolanaAdapter::connect(config) {
        Ok(adapter) => {
            info!("connected Solana adapter");
            adapters.push(("solana".to_string(), erase_adapter(adapter)));
        }
        Err(e) => warn!(error = %e, "failed to connect Solana adapter"),
    }
}

async fn connect_substrate_adapter(adapters: &mut Vec<(String, Arc<dyn bridge_attester::DynAdapter>)>) {
    if !has_env("SUBSTRATE_WS_URL") {
        return;
    }
    let config = match SubstrateAdapterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "skipping Substrate adapter, configuration incomplete");
            return;
        }
    };
    match SubstrateAdapter::connect(config).await {
        Ok(adapter) => {
            info!("connected Substrate adapter");
            adapters.push(("substrate".to_string(), erase_adapter(adapter)));
        }
        Err(e) => warn!(error = %e, "failed to connect Substrate adapter"),
    }
}

async fn connect_ledger_adapters(adapters: &mut Vec<(String, Arc<dyn bridge_attester::DynAdapter>)>) {
    for &prefix in LEDGER_CHAINS {
        if !has_env(&format!("{prefix}_RPC_URL")) {
            continue;
        }
        let domain = match prefix {
            "BITCOIN" => Domain::BITCOIN,
            "TRON" => Domain::TRON,
            "XRPL" => Domain::XRPL,
            "CARDANO" => Domain::CARDANO,
            "STELLAR" => Domain::STELLAR,
            _ => unreachable!("LEDGER_CHAINS is a fixed list"),
        };
        let config = match LedgerAdapterConfig::from_env(prefix, domain) {
            Ok(config) => config,
            Err(e) => {
                warn!(chain = prefix, error = %e, "skipping ledger adapter, configuration incomplete");
                continue;
            }
        };
        let name = prefix.to_lowercase();
        let connected = match domain {
            Domain::BITCOIN => BitcoinAdapter::connect(config).map(erase_adapter).map_err(|e| e.to_string()),
            Domain::TRON => TronAdapter::connect(config).map(erase_adapter).map_err(|e| e.to_string()),
            Domain::XRPL => XrplAdapter::connect(config).map(erase_adapter).map_err(|e| e.to_string()),
            Domain::CARDANO => CardanoAdapter::connect(config).map(erase_adapter).map_err(|e| e.to_string()),
            Domain::STELLAR => StellarAdapter::connect(config).map(erase_adapter).map_err(|e| e.to_string()),
            _ => unreachable!("domain is one of the five ledger chains above"),
        };
        match connected {
            Ok(adapter) => {
                info!(chain = prefix, "connected ledger adapter");
                adapters.push((name, adapter));
            }
            Err(e) => warn!(chain = prefix, error = %e, "failed to connect ledger adapter"),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match AttesterConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let ecdsa_signer = match (&config.ecdsa_key, config.ecdsa_address) {
        (Some(key), Some(address)) => match EcdsaSigner::new(key, address) {
            Ok(signer) => Some(signer),
            Err(e) => {
                tracing::error!(error = %e, "ECDSA key material did not validate");
                std::process::exit(1);
            }
        },
        _ => None,
    };
    let sr25519_signer = match (config.sr25519_seed, &config.sr25519_address) {
        (Some(seed), Some(address)) => match Sr25519Signer::from_seed(seed, address) {
            Ok(signer) => Some(signer),
            Err(e) => {
                tracing::error!(error = %e, "Sr25519 key material did not validate");
                std::process::exit(1);
            }
        },
        _ => None,
    };

    let identity = AttesterIdentity {
        id: config.attester_id,
        ecdsa_address: ecdsa_signer.as_ref().map(|s| s.address().into_array()).unwrap_or([0u8; 20]),
        sr25519_public: sr25519_signer.as_ref().map(|s| s.public_bytes()).unwrap_or([0u8; 32]),
    };
    let signer = Signer::new(ecdsa_signer, sr25519_signer, config.attester_id);

    let mut adapters: Vec<(String, Arc<dyn bridge_attester::DynAdapter>)> = Vec::new();
    connect_evm_adapters(&mut adapters).await;
    connect_solana_adapter(&mut adapters).await;
    connect_substrate_adapter(&mut adapters).await;
    connect_ledger_adapters(&mut adapters).await;

    if adapters.is_empty() {
        tracing::error!("no chain adapters configured; this attester would observe nothing");
        std::process::exit(1);
    }

    let store = Arc::new(AttestationStore::new(config.min_signatures));
    let metrics = Arc::new(Metrics::new());
    let service = AttesterService::new(identity, signer, store, metrics, adapters, config.sweep_interval_ms);

    if let Err(e) = service.run().await {
        tracing::error!(error = %e, "failed to start one or more adapters");
        std::process::exit(2);
    }

    let app = bridge_attester::handlers::routes(Arc::clone(&service)).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    info!(%addr, "starting attester HTTP API");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    let sig_down = match SigDown::try_new() {
        Ok(sig_down) => sig_down,
        Err(e) => {
            tracing::error!(error = %e, "failed to register signal handlers");
            std::process::exit(2);
        }
    };
    let cancellation = sig_down.cancellation_token();
    let graceful_shutdown = async move { cancellation.cancelled().await };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(graceful_shutdown).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(2);
    }

    service.stop().await;
    info!("shut down cleanly");
}
