pub mod lifecycle;
pub mod messages;
pub mod notifier;
pub mod redemption;
pub mod renderer;

pub use lifecycle::{InvalidationOutcome, RedemptionDecision, TicketLifecycle};
pub use notifier::{LogNotifier, NotificationDispatcher, Notifier, NotifyError, TelegramNotifier};
pub use redemption::{RedemptionCoordinator, RedemptionOutcome, RedemptionReport};
pub use renderer::{RenderError, SvgQrRenderer, TicketRenderer};
