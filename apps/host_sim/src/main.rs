use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use minikit::{BridgeKind, GlobalScope, HostEnvironment, InstallResult, MiniKit, Transport};
use serde_json::{json, Value};
use shared::{
    domain::{CommandId, EventName, SafeAreaInsets, TokenSymbol},
    protocol::{HostMarker, OutboundMessage, PayCommandInput},
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    app_id: Option<String>,
    #[arg(long, default_value_t = 5.0)]
    amount: f64,
    #[arg(long, default_value = "did:kilt:recipient")]
    to: String,
    #[arg(long, value_enum, ignore_case = true, default_value_t = TokenArg::Kilt)]
    token: TokenArg,
    #[arg(long, default_value = "host simulator payment")]
    description: String,
    /// Status the simulated host answers `init` with.
    #[arg(long, default_value = "success")]
    init_status: String,
    /// Launch without the host marker, as if opened in a plain browser.
    #[arg(long)]
    no_host: bool,
    /// Never answer `pay`, to exercise the command timeout.
    #[arg(long)]
    silent: bool,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TokenArg {
    Kilt,
    Usdc,
}

impl From<TokenArg> for TokenSymbol {
    fn from(token: TokenArg) -> Self {
        match token {
            TokenArg::Kilt => TokenSymbol::Kilt,
            TokenArg::Usdc => TokenSymbol::Usdc,
        }
    }
}

struct LoopbackBridge {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Transport for LoopbackBridge {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(bytes.to_vec())
            .context("simulated host stopped listening")
    }
}

struct HostBehaviour {
    init_status: String,
    silent: bool,
    latency: Duration,
}

fn init_reply(status: &str) -> Value {
    if status == "success" {
        json!({
            "status": status,
            "did": "did:kilt:4sim",
            "web3Name": "simulated",
            "email": "sim@example.org",
            "name": "Host Simulator"
        })
    } else {
        json!({ "status": status, "message": "init rejected by simulated host" })
    }
}

fn pay_reply(payload: &Value) -> Value {
    json!({
        "status": "success",
        "transaction_status": "submitted",
        "transaction_id": format!("0x{}", uuid::Uuid::new_v4().simple()),
        "reference": payload["description"],
        "from": "did:kilt:4sim",
        "chain": payload["network"],
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "version": 1
    })
}

fn spawn_host(kit: Arc<MiniKit>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>, behaviour: HostBehaviour) {
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            let command: OutboundMessage = match serde_json::from_slice(&bytes) {
                Ok(command) => command,
                Err(err) => {
                    warn!("host: undecodable command: {err}");
                    continue;
                }
            };
            info!(
                command = %command.command,
                correlation_id = ?command.correlation_id,
                "host: received command"
            );

            let mut payload = match command.command {
                CommandId::Init => init_reply(&behaviour.init_status),
                CommandId::Pay if behaviour.silent => continue,
                CommandId::Pay => pay_reply(&command.payload),
            };
            if let Some(correlation_id) = command.correlation_id {
                payload["correlation_id"] = json!(correlation_id);
            }
            let event: EventName = command.command.response_event();

            tokio::time::sleep(behaviour.latency).await;
            let message = json!({ "event": event, "payload": payload });
            kit.receive(message.to_string().as_bytes());
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = minikit::load_settings();
    if let Some(timeout_ms) = args.timeout_ms {
        settings.command_timeout = Duration::from_millis(timeout_ms);
    }
    let app_id = args
        .app_id
        .clone()
        .or_else(|| settings.app_id.clone())
        .unwrap_or_else(|| "unknown-app-id".to_string());

    let (tx, rx) = mpsc::unbounded_channel();
    let mut scope =
        GlobalScope::new().with_bridge(BridgeKind::NativeApp, Arc::new(LoopbackBridge { tx }));
    if !args.no_host {
        scope = scope.with_host(HostMarker {
            device_os: Some(std::env::consts::OS.to_string()),
            version: Some(1),
            is_optional_analytics: Some(false),
            supported_commands: Some(vec![CommandId::Pay.as_str().to_string()]),
            safe_area_insets: Some(SafeAreaInsets {
                top: 44.0,
                right: 0.0,
                bottom: 34.0,
                left: 0.0,
            }),
        });
    }

    let kit = MiniKit::new(HostEnvironment::new(scope), settings);
    spawn_host(
        Arc::clone(&kit),
        rx,
        HostBehaviour {
            init_status: args.init_status.clone(),
            silent: args.silent,
            latency: Duration::from_millis(args.latency_ms),
        },
    );

    match kit.install(&app_id).await {
        InstallResult::Installed { init } => {
            println!("installed: {}", serde_json::to_string_pretty(&init)?);
        }
        InstallResult::Failed(err) => {
            println!("install failed: {}", serde_json::to_string_pretty(&err)?);
            bail!("install failed: {err}");
        }
    }

    let input = PayCommandInput {
        amount: args.amount,
        to: args.to,
        tip: 0.0,
        fee: 0.0,
        network: None,
        token_symbol: args.token.into(),
        description: args.description,
    };
    let response = kit.pay_async(input).await?;
    println!(
        "sent: {}",
        serde_json::to_string_pretty(&response.command_payload)?
    );
    println!(
        "payment: {}",
        serde_json::to_string_pretty(&response.final_payload)?
    );

    Ok(())
}
