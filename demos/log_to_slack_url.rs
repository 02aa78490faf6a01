use log::LevelFilter;
use slack_logger::SlackLogger;

/// Example of posting log output to a Slack channel. To run this example you will need to set up an
/// incoming webhook (follow steps 1 through 3 at <https://api.slack.com/messaging/webhooks>) and store
/// the URL in an environment variable called `SLACK_WEBHOOK_URL` which is picked up by the example.
/// When you run this it writes a message in the channel that your webhook is linked to.
///
/// ```
/// cargo run --example log_to_slack_url
/// ```
fn main() {
    if let Ok(endpoint) = std::env::var("SLACK_WEBHOOK_URL") {
        let _ = SlackLogger::new(endpoint)
            .with_level(LevelFilter::Info)
            .with_username("slack_logger")
            .with_icon_emoji(":mega:")
            .init();
        log::info!("Hello slack");
    }
}
