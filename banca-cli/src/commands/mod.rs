pub mod admin;
pub mod play;
pub mod pool;
pub mod report;
pub mod zone;

pub use admin::{handle_admin_command, AdminCommands};
pub use play::{handle_play_command, PlayCommands};
pub use pool::{handle_pool_command, PoolCommands};
pub use report::{handle_report_command, ReportCommands};
pub use zone::{handle_zone_command, ZoneCommands};
