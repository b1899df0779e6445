//! # Textcast Channels
//! Messaging gateway implementations.

pub mod twilio;

use textcast_core::config::Settings;
use textcast_core::error::Result;
use textcast_core::traits::Gateway;

pub use twilio::TwilioGateway;

/// Create the configured gateway. Fails when credentials cannot be resolved.
pub fn create_gateway(settings: &Settings) -> Result<Box<dyn Gateway>> {
    let credentials = settings.twilio_credentials()?;
    Ok(Box::new(TwilioGateway::new(
        credentials,
        &settings.twilio.base_url,
    )?))
}
