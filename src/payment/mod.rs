pub mod dispatcher;
pub mod intent_store;
pub mod state_machine;

pub use dispatcher::Dispatcher;
pub use intent_store::IntentStore;
pub use state_machine::{PaymentStateStore, StateError};
