use fern::Dispatch;
use log::{info, LevelFilter, Log};
use slack_logger::{MessagePayload, SlackLogger};

/// This is an example that shows how `slack_logger` can be chained with the [`fern`] logging
/// framework: fern renders the line, and the webhook posts whatever fern produced. Store a webhook
/// URL in `SLACK_WEBHOOK_URL` to run it.
///
/// ```
/// cargo run --example log_with_fern
/// ```
fn main() {
    let Ok(endpoint) = std::env::var("SLACK_WEBHOOK_URL") else {
        return;
    };
    let slack_logger: Box<dyn Log + 'static> = Box::new(
        SlackLogger::new(endpoint)
            .format(|record| {
                Some(MessagePayload::new().with_text(record.message().unwrap_or_default()))
            })
            .with_level(LevelFilter::Info)
            .echo(),
    );
    let _ = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}|{} {}",
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(slack_logger)
        .apply();

    info!("Hello fern");
}
