pub mod events;
pub mod services;

pub use events::{create_event_bus, Event, EventBus, EventMessage, EventSubscriber, SharedEventBus};
pub use services::{
    LedgerOptions, LedgerService, LiveBoard, LiveTicker, MutationOutcome, Quote,
    SharedVenueRegistry, VenueRegistry,
};
