use log::{error, info, Level, LevelFilter};
use multi_log::MultiLogger;
use slack_logger::SlackLogger;

/// Two loggers posting to the same webhook with different level filters, combined through
/// `multi_log`. Store a webhook URL in `SLACK_WEBHOOK_URL` to run it.
///
/// ```
/// cargo run --example log_filtering
/// ```
fn main() {
    if let Ok(endpoint) = std::env::var("SLACK_WEBHOOK_URL") {
        let l1 = SlackLogger::new(endpoint.clone())
            .with_level(LevelFilter::Info)
            .with_username("info-and-above");
        let l2 = SlackLogger::new(endpoint)
            .with_level(LevelFilter::Error)
            .with_username("errors-only");
        let _ = MultiLogger::init(vec![Box::new(l1), Box::new(l2)], Level::Trace);

        // Only one message will be posted from l1 because l2 is filtered for error
        info!("only one message at INFO level");
        // but both loggers
        error!("two messages at ERROR level");
    }
}
