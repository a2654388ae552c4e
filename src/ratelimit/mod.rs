//! Rate limiting logic and state management.

mod backend;
mod clock;
mod counter;
mod key;
mod limiter;
mod sweeper;

pub use backend::RateLimitBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{Quota, RateLimitDecision, RateRecord};
pub use key::{client_key, first_hop, UNKNOWN_CLIENT};
pub use limiter::RateLimiter;
pub use sweeper::Sweeper;
