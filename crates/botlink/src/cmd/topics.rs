use botlink_msg::TopicRegistry;

use crate::cmd::TopicsArgs;
use crate::exit::{config_error, CliResult, SUCCESS};
use crate::output::{print_topics, OutputFormat};

pub fn run(_args: TopicsArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = TopicRegistry::mbot().map_err(|err| config_error("registry", err))?;
    print_topics(&registry, format);
    Ok(SUCCESS)
}
