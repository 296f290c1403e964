use std::io::IsTerminal;

use botlink_bridge::StatsSnapshot;
use botlink_msg::{Message, Topic, TopicRegistry, WireSize};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    channel: &'a str,
    kind: &'a str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a Message>,
}

/// Print one bus message, decoded where the registry knows the channel.
pub fn print_message(channel: &str, decoded: Option<&Message>, size: usize, format: OutputFormat) {
    let kind = decoded.map_or("unknown", |message| message.kind().name());
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                channel,
                kind,
                size,
                message: decoded,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "KIND", "SIZE", "MESSAGE"])
                .add_row(vec![
                    channel.to_string(),
                    kind.to_string(),
                    size.to_string(),
                    message_preview(decoded),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={channel} kind={kind} size={size} {}",
                message_preview(decoded)
            );
        }
    }
}

/// Print the compiled-in topic table.
pub fn print_topics(registry: &TopicRegistry, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct TopicOutput<'a> {
                id: u16,
                channel: &'a str,
                kind: &'a str,
                direction: &'a str,
                wire_size: Option<usize>,
            }

            let topics: Vec<TopicOutput> = registry.iter().map(topic_output).collect();
            println!(
                "{}",
                serde_json::to_string(&topics).unwrap_or_else(|_| "[]".to_string())
            );

            fn topic_output(topic: &Topic) -> TopicOutput<'_> {
                TopicOutput {
                    id: topic.id,
                    channel: topic.channel,
                    kind: topic.kind.name(),
                    direction: topic.direction.as_str(),
                    wire_size: fixed_size(topic),
                }
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "CHANNEL", "KIND", "DIRECTION", "SIZE"]);
            for topic in registry.iter() {
                table.add_row(vec![
                    topic.id.to_string(),
                    topic.channel.to_string(),
                    topic.kind.name().to_string(),
                    topic.direction.as_str().to_string(),
                    fixed_size(topic)
                        .map_or_else(|| "variable".to_string(), |size| size.to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for topic in registry.iter() {
                println!(
                    "{:>3}  {:<24} {:<14} {:<10} {}",
                    topic.id,
                    topic.channel,
                    topic.kind.name(),
                    topic.direction.as_str(),
                    fixed_size(topic)
                        .map_or_else(|| "variable".to_string(), |size| size.to_string()),
                );
            }
        }
    }
}

/// Print the final bridge counters.
pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "frames in/out: {}/{}  bytes in/out: {}/{}  published: {}  timesyncs: {}",
                stats.frames_in,
                stats.frames_out,
                stats.bytes_in,
                stats.bytes_out,
                stats.published,
                stats.timesyncs_sent,
            );
            println!(
                "framing errors: {}  unknown topics/channels: {}/{}  schema mismatches: {}  bus errors: {}  reconnects: {}",
                stats.framing_errors,
                stats.unknown_topics,
                stats.unknown_channels,
                stats.schema_mismatches,
                stats.bus_errors,
                stats.reconnects,
            );
        }
    }
}

fn message_preview(decoded: Option<&Message>) -> String {
    match decoded {
        Some(message) => {
            serde_json::to_string(message).unwrap_or_else(|_| "<unprintable>".to_string())
        }
        None => "<unregistered channel>".to_string(),
    }
}

fn fixed_size(topic: &Topic) -> Option<usize> {
    match topic.kind.wire_size() {
        WireSize::Fixed(size) => Some(size),
        WireSize::Variable => None,
    }
}
