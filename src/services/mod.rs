pub mod actions;
pub mod serde_id;
pub mod store;
pub mod transport;

pub use actions::{
    ActionReceipt, ActionsFactory, ClaimReceipt, EventActions, GameEventApi, HttpActionsFactory,
    UpgradeReceipt,
};
pub use store::{AccountRecord, AccountStore, JsonFileStore, MemoryStore, ScheduleRecord};
pub use transport::{Credentials, Endpoints, Envelope, HttpTransport, Transport};
