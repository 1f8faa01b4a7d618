// station-app -- demo wiring for the rigbridge control plane.
//
// Loads a station config, starts the discovery listeners and the
// digital-mode bridge, connects the saved manual devices, then prints
// every hub event to stdout.
//
// Usage:
//   station-app --config station.toml
//   station-app --config station.toml --verbose
//   RUST_LOG=rigbridge_control=trace station-app --config station.toml

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rigbridge::accessory::AccessoryAdapter;
use rigbridge::socket::SocketAdapter;
use rigbridge::{
    BridgeConfig, BridgeEvent, DeviceFamily, DeviceId, DeviceRegistry, DigitalModeBridge,
    DiscoveryListener, EventHub, ListenerConfig, ProtocolAdapter, StationConfig, Supervisor,
    SupervisorHandle,
};

/// Demo station for the rigbridge control plane.
#[derive(Parser)]
#[command(name = "station-app", version, about)]
struct Cli {
    /// Path to the station configuration file.
    #[arg(long, default_value = "station.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = if cli.config.exists() {
        StationConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, starting empty");
        StationConfig::default()
    };

    let hub = Arc::new(EventHub::new());
    let registry = Arc::new(DeviceRegistry::new());

    // Discovery listeners, one per announcement protocol.
    let mut listeners = Vec::new();
    for d in &config.discovery {
        let listener = DiscoveryListener::spawn(
            ListenerConfig {
                port: d.port,
                tag: d.tag.clone(),
                family: d.family,
            },
            Arc::clone(&registry),
            hub.sink(),
        )
        .await
        .with_context(|| format!("starting discovery listener on port {}", d.port))?;
        tracing::info!(port = listener.local_port(), tag = %d.tag, "discovery listener up");
        listeners.push(listener);
    }

    // Digital-mode bridge.
    let _bridge = match &config.digimode {
        Some(dm) => {
            let bridge = DigitalModeBridge::spawn(
                BridgeConfig {
                    port: dm.port,
                    multicast_group: dm
                        .multicast_group
                        .as_deref()
                        .map(|g| g.parse())
                        .transpose()
                        .context("parsing digimode multicast group")?,
                    relay: dm
                        .relay
                        .iter()
                        .map(|t| t.parse())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .context("parsing digimode relay targets")?,
                },
                hub.sink(),
            )
            .await
            .context("starting digital-mode bridge")?;
            tracing::info!(port = bridge.local_port(), "digital-mode bridge up");
            Some(bridge)
        }
        None => None,
    };

    // Saved manual connections. The map enforces one supervisor per id.
    let mut supervisors: HashMap<DeviceId, SupervisorHandle> = HashMap::new();
    for device in &config.devices {
        let descriptor = device.descriptor();
        if supervisors.contains_key(&descriptor.id) {
            tracing::warn!(id = %descriptor.id, "duplicate device id in config, skipping");
            continue;
        }
        registry.add_manual(descriptor.clone());
        hub.publish(BridgeEvent::DeviceDiscovered {
            descriptor: descriptor.clone(),
        });

        let adapter: Box<dyn ProtocolAdapter> = match descriptor.family {
            DeviceFamily::SocketTransceiver => Box::new(SocketAdapter::new(descriptor.clone())),
            DeviceFamily::LineProtocolAccessory => Box::new(AccessoryAdapter::with_credential(
                descriptor.clone(),
                device.credential.clone(),
            )),
            DeviceFamily::NativeLibraryRig => {
                // The native library binding is supplied by the embedding
                // application; the demo has none linked in.
                tracing::warn!(id = %descriptor.id, "no native rig library in this build, skipping");
                continue;
            }
        };

        let handle = Supervisor::spawn(adapter, Arc::clone(&hub));
        handle.connect().await?;
        supervisors.insert(handle.id().clone(), handle);
    }

    tracing::info!(
        devices = supervisors.len(),
        listeners = listeners.len(),
        "station up, printing hub events (ctrl-c to exit)"
    );

    let mut sub = hub.attach();
    loop {
        tokio::select! {
            event = sub.recv() => print_event(&event),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    for (id, handle) in &supervisors {
        tracing::debug!(id = %id, "disconnecting");
        let _ = handle.disconnect().await;
    }
    Ok(())
}

fn print_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::DeviceDiscovered { descriptor } => {
            println!(
                "+ {} [{}] {} at {}",
                descriptor.id, descriptor.family, descriptor.model, descriptor.address
            );
        }
        BridgeEvent::DeviceRemoved { id } => {
            println!("- {id} removed");
        }
        BridgeEvent::ConnectionStateChanged { id, state, error } => match error {
            Some(message) => println!("  {id}: {state} ({message})"),
            None => println!("  {id}: {state}"),
        },
        BridgeEvent::StateChanged { id, state } => {
            let band = state
                .band
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".into());
            let live = if state.stale { " [stale]" } else { "" };
            println!(
                "  {id}: {} Hz {} {} tx={}{}",
                state.frequency_hz, state.mode, band, state.transmitting, live
            );
        }
        BridgeEvent::Digital(message) => {
            println!("  digimode[{}]: {message:?}", message.sender_id());
        }
    }
}
