//! The work done when leaving each state.
//!
//! | leaving         | step                                   |
//! |-----------------|----------------------------------------|
//! | `uninitialized` | [`initialize::initialize`]             |
//! | `initialized`   | [`lags::LagMonitor`]                   |
//! | `lags_ok`       | [`fence::fence_gateway`]               |
//! | `fenced`        | [`promote::PromotionController`]       |
//! | `promoting`     | [`completion::PromotionCompletion`]    |
//! | `promoted`      | [`switchover::GatewaySwitchover`]      |

pub mod completion;
pub mod fence;
pub mod initialize;
pub mod lags;
pub mod promote;
pub mod switchover;

pub use completion::PromotionCompletion;
pub use fence::fence_gateway;
pub use initialize::{initialize, InitSnapshot};
pub use lags::LagMonitor;
pub use promote::PromotionController;
pub use switchover::GatewaySwitchover;

/// Tunables for the polling steps
#[derive(Clone, Debug, Default)]
pub struct Steps {
    /// Lag polling
    pub lag_monitor: LagMonitor,
    /// Promotion loop
    pub promotion: PromotionController,
    /// Promotion completion polling
    pub completion: PromotionCompletion,
    /// Gateway patch and pod wait
    pub switchover: GatewaySwitchover,
}
