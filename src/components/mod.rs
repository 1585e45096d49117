// ABOUTME: UI components for the lab terminal: tab bar, status panels, toasts, help and layout

pub mod help;
pub mod layout;
pub mod notifications;
pub mod session_status;
pub mod tab_bar;

pub use help::HelpComponent;
pub use layout::LayoutComponent;
pub use notifications::NotificationComponent;
pub use session_status::SessionStatusComponent;
pub use tab_bar::TabBarComponent;
