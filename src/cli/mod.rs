pub mod app;
pub mod check;
pub mod commands;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod runtime;
pub mod session;
pub mod validate;

pub use app::{exit_code_for, Verdict, EXIT_ALLOWED, EXIT_CONFIG, EXIT_DENIED, EXIT_FAILURE};
pub use check::{cmd_check, cmd_check_route, cmd_explain, CheckArgs, CheckRouteArgs};
pub use validate::{cmd_validate, ValidateArgs};
