use log::LevelFilter;
use slack_logger::{MessagePayload, SlackLogger};

/// Example of shaping the posted message with a formatter. Warnings become a `mrkdwn` message with
/// the module path attached, and anything mentioning "heartbeat" is dropped before it reaches the
/// channel. Store a webhook URL in `SLACK_WEBHOOK_URL` to run it.
///
/// ```
/// cargo run --example log_formatter
/// ```
fn main() {
    if let Ok(endpoint) = std::env::var("SLACK_WEBHOOK_URL") {
        let _ = SlackLogger::new(endpoint)
            .with_level(LevelFilter::Info)
            .with_mrkdwn(true)
            .format(|record| {
                let message = record.message().unwrap_or_default();
                if message.contains("heartbeat") {
                    return None;
                }
                let module_path = record
                    .get("module_path")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default();
                Some(MessagePayload::new().with_text(format!(
                    "*{}* `{}` {}",
                    record.level().unwrap_or("undefined"),
                    module_path,
                    message
                )))
            })
            .echo()
            .init();
        log::info!("heartbeat ok");
        log::warn!("disk usage above 90%");
    }
}
