pub mod processor;
pub mod session;
pub mod signature;
pub mod stripe;
pub mod webhook;

pub use processor::PaymentProcessor;
pub use session::PaymentSessionInitiator;
pub use stripe::StripeClient;
pub use webhook::WebhookFinalizer;
