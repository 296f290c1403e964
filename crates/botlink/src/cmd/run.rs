use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use botlink_bridge::{Bridge, BridgeConfig};
use botlink_bus::UdpmBus;
use botlink_msg::TopicRegistry;
use tracing::info;

use crate::cmd::{parse_duration, parse_optional_duration, RunArgs};
use crate::exit::{bridge_error, bus_error, config_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = BridgeConfig::new(&args.link_path);
    config.baud = args.baud;
    config.timesync_period = parse_duration(&args.timesync_period)?;
    config.read_timeout = parse_duration(&args.read_timeout)?;
    config.link_timeout = parse_optional_duration(&args.link_timeout)?;
    config.reconnect_backoff = parse_duration(&args.reconnect_backoff)?;
    config.half_duplex = args.half_duplex;

    // The registry must validate before any I/O is attempted.
    let registry = TopicRegistry::mbot().map_err(|err| config_error("registry", err))?;
    let registry = Arc::new(registry);

    let bus = UdpmBus::open(&args.bus).map_err(|err| bus_error("bus open failed", err))?;
    let bridge = Bridge::new(Arc::clone(&registry), bus, config)
        .map_err(|err| bridge_error("bridge setup failed", err))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&shutdown))?;

    info!(
        link = ?args.link_path,
        bus = %args.bus,
        topics = registry.len(),
        "bridge starting"
    );

    let stats = bridge.stats();
    bridge
        .run(&shutdown)
        .map_err(|err| bridge_error("bridge failed", err))?;

    print_stats(&stats.snapshot(), format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
