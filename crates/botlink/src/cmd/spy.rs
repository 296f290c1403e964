use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use botlink_bus::{Bus, UdpmBus};
use botlink_msg::{Message, TopicRegistry};
use tracing::warn;

use crate::cmd::SpyArgs;
use crate::exit::{bus_error, config_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: SpyArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = TopicRegistry::mbot().map_err(|err| config_error("registry", err))?;

    let bus = UdpmBus::open(&args.bus).map_err(|err| bus_error("bus open failed", err))?;
    match &args.channels {
        Some(channels) => {
            for channel in channels {
                bus.subscribe(channel)
                    .map_err(|err| bus_error("subscribe failed", err))?;
            }
        }
        None => {
            bus.subscribe_all()
                .map_err(|err| bus_error("subscribe failed", err))?;
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let received = match bus.recv_timeout(POLL_INTERVAL) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => return Err(bus_error("bus receive failed", err)),
        };

        let decoded = match registry.lookup_by_name(&received.channel) {
            Some(topic) => match Message::decode(topic.kind, &received.payload) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(channel = %received.channel, %err, "undecodable payload");
                    continue;
                }
            },
            None => None,
        };

        print_message(
            &received.channel,
            decoded.as_ref(),
            received.payload.len(),
            format,
        );
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
