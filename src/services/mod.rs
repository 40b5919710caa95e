mod currency;
mod recovery;
mod user;
pub mod web_code;

pub use currency::CurrencyService;
pub use recovery::RecoveryService;
pub use user::UserService;
pub use web_code::{WebCodeError, WebCodeRequest, WebCodeResponse, WebCodeService};
