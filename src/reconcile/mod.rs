// Reconciliation between reviewer decisions in the record store and the
// side effects they trigger.
//
// The poller queries Approved/Denied bookings on a fixed interval, claims
// each one in the dispatch ledger, then opens a payment session or sends
// the denial notice. The ledger is in-memory unless DATABASE_URL is set.

pub mod denial;
pub mod ledger;
pub mod poller;

pub use denial::DenialNotifier;
pub use ledger::{DispatchLedger, IdempotencyGuard, InMemoryDispatchLedger, PgDispatchLedger};
pub use poller::StatusPoller;
